//! Driver registry & phase callbacks.
//!
//! A driver is a pluggable, per-language build backend. Rather than the
//! symbolic-lookup-from-a-shared-object model of the system this crate's
//! design is grounded on, drivers here are ordinary trait objects
//! registered by logical id (`lang.c`, `lang.rust`, ...); the registry
//! dispatches phase calls to them and there is no "current driver" thread-
//! local — every callback receives the active [`DriverApi`] explicitly.

use std::collections::HashMap;
use std::fmt;

use tracing::instrument;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::project::Project;
use crate::rule::RuleGraph;

/// Build phases, in the order the orchestrator invokes them for each
/// project (stopping as soon as `project.error` becomes true).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Setup,
    Init,
    Generate,
    Prebuild,
    Postbuild,
    Test,
    Coverage,
    Clean,
}

impl Phase {
    /// The full lifecycle order. Rule evaluation itself runs between
    /// `Prebuild` and `Postbuild` and is not a driver callback — see
    /// [`crate::orchestrate::build_project`].
    pub const LIFECYCLE: &'static [Phase] =
        &[Phase::Setup, Phase::Init, Phase::Generate, Phase::Prebuild, Phase::Postbuild];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Setup => "setup",
            Phase::Init => "init",
            Phase::Generate => "generate",
            Phase::Prebuild => "prebuild",
            Phase::Postbuild => "postbuild",
            Phase::Test => "test",
            Phase::Coverage => "coverage",
            Phase::Clean => "clean",
        };
        f.write_str(s)
    }
}

/// The build context threaded explicitly through every driver callback.
/// Replaces the source system's per-thread "current driver" slot (see
/// design notes) — a driver that needs another driver's behavior is handed
/// that driver's id and looks it up through `registry`, rather than
/// swapping a global.
pub struct DriverApi<'a> {
    pub config: &'a Config,
    pub rules: &'a mut RuleGraph,
}

impl<'a> DriverApi<'a> {
    pub fn new(config: &'a Config, rules: &'a mut RuleGraph) -> Self {
        Self { config, rules }
    }
}

/// A pluggable per-language build backend.
///
/// Drivers register their rule graph once per project (in `init`/`generate`)
/// and implement the phases they care about; every method has a no-op
/// default so a minimal driver only overrides what it needs, the same
/// shape as `Compiler::with_base_path`/`with_allowed_paths` defaulting to
/// no-ops in the compiler-trait family this is grounded on.
pub trait Driver: Send + Sync {
    /// Logical id this driver is registered under, e.g. `lang.c`.
    fn id(&self) -> &str;

    fn setup(&self, _api: &mut DriverApi<'_>, _project: &mut Project) -> Result<()> {
        Ok(())
    }

    fn init(&self, _api: &mut DriverApi<'_>, _project: &mut Project) -> Result<()> {
        Ok(())
    }

    fn generate(&self, _api: &mut DriverApi<'_>, _project: &mut Project) -> Result<()> {
        Ok(())
    }

    fn prebuild(&self, _api: &mut DriverApi<'_>, _project: &mut Project) -> Result<()> {
        Ok(())
    }

    fn postbuild(&self, _api: &mut DriverApi<'_>, _project: &mut Project) -> Result<()> {
        Ok(())
    }

    fn test(&self, _api: &mut DriverApi<'_>, _project: &mut Project) -> Result<()> {
        Ok(())
    }

    fn coverage(&self, _api: &mut DriverApi<'_>, _project: &mut Project) -> Result<()> {
        Ok(())
    }

    fn clean(&self, _api: &mut DriverApi<'_>, _project: &mut Project) -> Result<()> {
        Ok(())
    }
}

/// Loads drivers by logical id and dispatches phase calls to them. Drivers
/// are registered once and live for the registry's lifetime (the process
/// lifetime, in practice), matching the "driver lives for the process
/// lifetime" ownership note.
#[derive(Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Box<dyn Driver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[instrument(skip(self, driver), fields(driver = driver.id()))]
    pub fn register(&mut self, driver: Box<dyn Driver>) {
        tracing::debug!("registering driver");
        self.drivers.insert(driver.id().to_string(), driver);
    }

    pub fn get(&self, id: &str) -> Result<&dyn Driver> {
        self.drivers.get(id).map(|b| b.as_ref()).ok_or_else(|| {
            Error::driver_load(id, "no driver is registered under this id")
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.drivers.contains_key(id)
    }
}
