//! Phase-lifecycle glue.
//!
//! Drives a single project through its driver's `init → generate →
//! prebuild → <rule evaluation> → postbuild → test → coverage` sequence,
//! stopping as soon as the project's `error` flag is set. This is the
//! `crate::orchestrate::build_project` referenced from [`crate::driver::
//! Phase::LIFECYCLE`]'s doc comment, and the function the crawler's
//! `walk` callback is expected to wrap.

use tracing::{instrument, warn};

use crate::config::Config;
use crate::driver::{Driver, DriverApi, DriverRegistry, Phase};
use crate::error::Result;
use crate::project::Project;
use crate::rule::{RuleEngine, RuleGraph};

/// Conventional name of a driver's terminal rule node.
pub const ARTEFACT: &str = "ARTEFACT";

/// Build one project through its full lifecycle. `setup` is not invoked
/// here — it only fires when instantiating a project from a template,
/// which is out of this crate's scope (see spec notes); the interface
/// exists on [`Driver`] but the orchestrator never calls it.
#[instrument(skip(registry, config, project), fields(project = %project.id))]
pub fn build_project(
    registry: &DriverRegistry,
    config: &Config,
    project: &mut Project,
) -> Result<()> {
    let driver_id = format!("lang.{}", project.language);
    let driver = registry.get(&driver_id)?;
    let mut rules = RuleGraph::new();

    for phase in [Phase::Init, Phase::Generate, Phase::Prebuild] {
        run_phase(driver, &mut rules, config, project, phase)?;
        if project.error {
            return Ok(());
        }
    }

    if rules.contains(ARTEFACT) {
        let mut engine = RuleEngine::new(&rules);
        engine.evaluate(project, ARTEFACT)?;
        if project.error {
            return Ok(());
        }
    } else {
        warn!(driver = %driver_id, "driver registered no `ARTEFACT` rule; skipping build");
    }

    run_phase(driver, &mut rules, config, project, Phase::Postbuild)?;
    if project.error {
        return Ok(());
    }

    run_phase(driver, &mut rules, config, project, Phase::Test)?;
    if project.error {
        return Ok(());
    }

    if config.coverage {
        run_phase(driver, &mut rules, config, project, Phase::Coverage)?;
    }
    Ok(())
}

/// Remove a project's declared intermediate files via its driver's `clean`
/// callback. Independent of [`build_project`] — invoked only when a clean
/// is explicitly requested, never as part of the normal build lifecycle.
#[instrument(skip(registry, config, project), fields(project = %project.id))]
pub fn clean_project(
    registry: &DriverRegistry,
    config: &Config,
    project: &mut Project,
) -> Result<()> {
    let driver_id = format!("lang.{}", project.language);
    let driver = registry.get(&driver_id)?;
    let mut rules = RuleGraph::new();
    run_phase(driver, &mut rules, config, project, Phase::Clean)
}

fn run_phase(
    driver: &dyn Driver,
    rules: &mut RuleGraph,
    config: &Config,
    project: &mut Project,
    phase: Phase,
) -> Result<()> {
    let mut api = DriverApi::new(config, rules);
    let result = match phase {
        Phase::Setup => driver.setup(&mut api, project),
        Phase::Init => driver.init(&mut api, project),
        Phase::Generate => driver.generate(&mut api, project),
        Phase::Prebuild => driver.prebuild(&mut api, project),
        Phase::Postbuild => driver.postbuild(&mut api, project),
        Phase::Test => driver.test(&mut api, project),
        Phase::Coverage => driver.coverage(&mut api, project),
        Phase::Clean => driver.clean(&mut api, project),
    };
    if let Err(e) = &result {
        warn!(phase = %phase, error = %e, "phase failed");
        project.mark_error();
    }
    result
}
