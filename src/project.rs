//! The in-memory representation of a discovered project.

use std::path::{Path, PathBuf};

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::attribute::AttributeStore;

/// A project's logical identifier, e.g. `foo/bar`. Slash-separated; never
/// empty.
pub type ProjectId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectKind {
    Application,
    Package,
    Tool,
}

/// A discovered project and its runtime build state.
///
/// `id_underscore` and `id_short` are computed once at construction (see
/// [`Project::new`]) rather than re-derived on every access — they are
/// cheap to memoize and sit on hot paths (artefact naming, generated
/// header guards).
#[derive(Debug, Clone)]
pub struct Project {
    pub id: ProjectId,
    pub id_underscore: String,
    pub id_short: String,
    pub kind: ProjectKind,
    pub path: PathBuf,
    pub language: String,
    pub version: Option<Version>,

    pub use_public: Vec<ProjectId>,
    pub use_private: Vec<ProjectId>,
    pub use_build: Vec<ProjectId>,
    pub link: Vec<String>,

    pub attributes: AttributeStore,

    /// Back-reference set filled by the resolver. Derived and regenerable;
    /// never populated by manifest parsing itself.
    pub dependents: Vec<ProjectId>,
    pub unresolved_dependencies: usize,

    pub error: bool,
    pub freshly_baked: bool,
    pub changed: bool,
    pub artefact_outdated: bool,
    pub sources_outdated: bool,
    pub built: bool,
    pub recursive: bool,
}

impl Project {
    pub fn new(id: impl Into<String>, kind: ProjectKind, path: impl Into<PathBuf>) -> Self {
        let id = id.into();
        let id_underscore = id.replace('/', "_");
        let id_short = id.rsplit('/').next().unwrap_or(&id).to_string();
        Self {
            id,
            id_underscore,
            id_short,
            kind,
            path: path.into(),
            language: String::new(),
            version: None,
            use_public: Vec::new(),
            use_private: Vec::new(),
            use_build: Vec::new(),
            link: Vec::new(),
            attributes: AttributeStore::new(),
            dependents: Vec::new(),
            unresolved_dependencies: 0,
            error: false,
            freshly_baked: false,
            changed: false,
            artefact_outdated: false,
            sources_outdated: false,
            built: false,
            recursive: false,
        }
    }

    /// All dependency ids this project declares, in `use`, `use_private`,
    /// `use_build` order — the order the resolver adds DAG edges in.
    pub fn all_dependencies(&self) -> impl Iterator<Item = &ProjectId> {
        self.use_public.iter().chain(self.use_private.iter()).chain(self.use_build.iter())
    }

    /// Is this project ready to build per the resolver's readiness
    /// invariant.
    pub fn is_ready(&self) -> bool {
        self.unresolved_dependencies == 0
    }

    /// Mark this project fatally errored; the crawler and rule engine both
    /// call this on the first unrecoverable failure.
    pub fn mark_error(&mut self) {
        self.error = true;
    }

    pub fn artefact_name(&self, platform_is_windows: bool) -> String {
        match self.kind {
            ProjectKind::Application | ProjectKind::Tool => {
                if platform_is_windows {
                    format!("{}.exe", self.id_underscore)
                } else {
                    self.id_underscore.clone()
                }
            }
            ProjectKind::Package => {
                let static_artefact = self
                    .attributes
                    .get_any(crate::attribute::known::STATIC_ARTEFACT)
                    .and_then(|a| a.as_bool())
                    .unwrap_or(false);
                if static_artefact {
                    if platform_is_windows {
                        format!("{}.lib", self.id_underscore)
                    } else {
                        format!("lib{}.a", self.id_underscore)
                    }
                } else if platform_is_windows {
                    format!("{}.dll", self.id_underscore)
                } else if cfg!(target_os = "macos") {
                    format!("lib{}.dylib", self.id_underscore)
                } else {
                    format!("lib{}.so", self.id_underscore)
                }
            }
        }
    }

    /// Object-file layout: `<project>/<cache-dir>/<platform>-<config>/<source-with-.o>`.
    pub fn object_path(&self, cache_subdir: &str, source: &Path) -> PathBuf {
        self.path.join(cache_subdir).join(source).with_extension("o")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_derivations() {
        let p = Project::new("foo/bar", ProjectKind::Package, "/src/foo/bar");
        assert_eq!(p.id_underscore, "foo_bar");
        assert_eq!(p.id_short, "bar");
    }

    #[test]
    fn artefact_naming_application_posix() {
        let p = Project::new("hi", ProjectKind::Application, "/src/hi");
        assert_eq!(p.artefact_name(false), "hi");
        assert_eq!(p.artefact_name(true), "hi.exe");
    }

    #[test]
    fn artefact_naming_package_dynamic_posix() {
        let p = Project::new("foo", ProjectKind::Package, "/src/foo");
        assert_eq!(p.artefact_name(false), "libfoo.so");
    }

    #[test]
    fn ready_iff_no_unresolved_dependencies() {
        let mut p = Project::new("a", ProjectKind::Package, "/a");
        assert!(p.is_ready());
        p.unresolved_dependencies = 1;
        assert!(!p.is_ready());
    }
}
