//! Resolved build-configuration record, immutable for the duration of a
//! build run. Built through [`ConfigBuilder`], matching the fluent-setter
//! shape used elsewhere in this crate (see [`crate::project::Project`]).

use std::path::{Path, PathBuf};

/// Build configuration name, e.g. `debug`/`release`; kept as a plain
/// string rather than a closed enum since drivers and projects may define
/// additional configurations in their manifests.
pub type ConfigurationName = String;

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub configuration: ConfigurationName,
    pub architecture: String,
    pub symbols: bool,
    pub debug: bool,
    pub optimizations: bool,
    pub strict: bool,
    pub coverage: bool,
    pub static_lib: bool,
    pub sanitize_address: bool,
    pub sanitize_undefined: bool,
    pub sanitize_memory: bool,
    pub home: PathBuf,
    pub target: PathBuf,
    pub meta: PathBuf,
    pub bin: PathBuf,
    pub lib: PathBuf,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// A `debug` configuration rooted at `home`, matching the conventional
    /// `<home>/platform-config/{bin,lib,meta}` install layout.
    pub fn debug(home: impl AsRef<Path>) -> Self {
        Self::builder().configuration("debug").debug(true).symbols(true).home(home).build()
    }

    /// A `release` configuration rooted at `home`.
    pub fn release(home: impl AsRef<Path>) -> Self {
        Self::builder()
            .configuration("release")
            .debug(false)
            .optimizations(true)
            .home(home)
            .build()
    }
}

#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    environment: String,
    configuration: ConfigurationName,
    architecture: String,
    symbols: bool,
    debug: bool,
    optimizations: bool,
    strict: bool,
    coverage: bool,
    static_lib: bool,
    sanitize_address: bool,
    sanitize_undefined: bool,
    sanitize_memory: bool,
    home: PathBuf,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            environment: "default".into(),
            configuration: "debug".into(),
            architecture: std::env::consts::ARCH.to_string(),
            symbols: false,
            debug: true,
            optimizations: false,
            strict: false,
            coverage: false,
            static_lib: false,
            sanitize_address: false,
            sanitize_undefined: false,
            sanitize_memory: false,
            home: dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".drydock"),
        }
    }
}

macro_rules! bool_setter {
    ($name:ident) => {
        pub fn $name(mut self, value: bool) -> Self {
            self.$name = value;
            self
        }
    };
}

impl ConfigBuilder {
    pub fn environment(mut self, value: impl Into<String>) -> Self {
        self.environment = value.into();
        self
    }

    pub fn configuration(mut self, value: impl Into<String>) -> Self {
        self.configuration = value.into();
        self
    }

    pub fn architecture(mut self, value: impl Into<String>) -> Self {
        self.architecture = value.into();
        self
    }

    pub fn home(mut self, value: impl AsRef<Path>) -> Self {
        self.home = value.as_ref().to_path_buf();
        self
    }

    bool_setter!(symbols);
    bool_setter!(debug);
    bool_setter!(optimizations);
    bool_setter!(strict);
    bool_setter!(coverage);
    bool_setter!(static_lib);
    bool_setter!(sanitize_address);
    bool_setter!(sanitize_undefined);
    bool_setter!(sanitize_memory);

    pub fn build(self) -> Config {
        let root = self.home.join(format!("{}-{}", self.architecture, self.configuration));
        Config {
            environment: self.environment,
            configuration: self.configuration,
            architecture: self.architecture,
            symbols: self.symbols,
            debug: self.debug,
            optimizations: self.optimizations,
            strict: self.strict,
            coverage: self.coverage,
            static_lib: self.static_lib,
            sanitize_address: self.sanitize_address,
            sanitize_undefined: self.sanitize_undefined,
            sanitize_memory: self.sanitize_memory,
            target: root.clone(),
            meta: root.join("meta"),
            bin: root.join("bin"),
            lib: root.join("lib"),
            home: self.home,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_config_enables_optimizations_not_debug() {
        let cfg = Config::release("/tmp/drydock-home-test");
        assert!(cfg.optimizations);
        assert!(!cfg.debug);
        assert_eq!(cfg.configuration, "release");
    }

    #[test]
    fn roots_are_derived_from_home() {
        let cfg = Config::debug("/tmp/drydock-home-test");
        assert!(cfg.bin.starts_with(&cfg.target));
        assert!(cfg.lib.starts_with(&cfg.target));
    }
}
