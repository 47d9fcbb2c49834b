//! A minimal C driver — the worked example proving [`Driver`] is
//! implementable end to end. Registers a `SOURCES` pattern, an `OBJECTS`
//! MAP rule (`src//*.c` -> `<cache>/*.o`) and an `ARTEFACT` rule, shelling
//! out to a `cc`-compatible compiler for both steps. Flags beyond
//! `cflags`/`ldflags` passthrough are out of scope; this exists to prove
//! the trait, not to be a production C toolchain driver.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{instrument, warn};

use crate::attribute::known;
use crate::driver::{Driver, DriverApi};
use crate::error::{Error, Result};
use crate::project::Project;
use crate::rule::TargetSpec;

/// Object files and generated headers are staged under this project-
/// relative directory, mirroring `Project::object_path`'s `cache_subdir`.
pub const CACHE_DIR: &str = ".drydock-cache";

pub struct CDriver;

impl Driver for CDriver {
    fn id(&self) -> &str {
        "lang.c"
    }

    #[instrument(skip(self, api, project), fields(project = %project.id))]
    fn init(&self, api: &mut DriverApi<'_>, project: &mut Project) -> Result<()> {
        api.rules.pattern("SOURCES", "src//*.c")?;

        let project_path = project.path.clone();
        api.rules.rule(
            "OBJECTS",
            "SOURCES",
            TargetSpec::Map(Box::new(move |src: &Path| {
                // Mirrors `Project::object_path(CACHE_DIR, src)`; inlined
                // here because a `Map` closure only ever sees the source
                // path, not the project it belongs to.
                project_path.join(CACHE_DIR).join(src).with_extension("o")
            })),
            Box::new(compile_object),
        );

        api.rules.rule("ARTEFACT", "OBJECTS", TargetSpec::None, Box::new(link_artefact));
        Ok(())
    }
}

fn cc_command() -> Command {
    Command::new(std::env::var("CC").unwrap_or_else(|_| "cc".to_string()))
}

fn flags(project: &Project, names: &[&str]) -> Vec<String> {
    project.attributes.get_any(names).map(|a| a.as_string_array()).unwrap_or_default()
}

fn run(mut cmd: Command, step: &str) -> Result<()> {
    let status = cmd
        .status()
        .map_err(|e| Error::internal(format!("failed to spawn `cc` for {step}: {e}")))?;
    if !status.success() {
        return Err(Error::internal(format!("`cc` {step} exited with {status}")));
    }
    Ok(())
}

fn compile_object(sources: &[PathBuf], target: &Path, project: &mut Project) -> Result<()> {
    let source = sources
        .first()
        .ok_or_else(|| Error::internal("OBJECTS rule invoked with no source"))?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::fs(parent, e))?;
    }

    let mut cmd = cc_command();
    cmd.arg("-c").arg(source).arg("-o").arg(target);
    cmd.args(flags(project, &[known::CFLAGS]));
    run(cmd, "compile")
}

fn link_artefact(sources: &[PathBuf], target: &Path, project: &mut Project) -> Result<()> {
    if sources.is_empty() {
        warn!(project = %project.id, "ARTEFACT rule has no object files to link");
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::fs(parent, e))?;
    }

    let mut cmd = cc_command();
    cmd.args(sources);
    cmd.arg("-o").arg(target);
    cmd.args(flags(project, &[known::LDFLAGS]));
    run(cmd, "link")
}
