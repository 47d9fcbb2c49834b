#![doc = include_str!("../README.md")]
#![warn(rustdoc::all)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod amalgamate;
pub mod attribute;
pub mod config;
pub mod crawler;
pub mod driver;
pub mod drivers;
pub mod error;
pub mod fsiter;
pub mod manifest;
pub mod matchexpr;
pub mod orchestrate;
pub mod path;
pub mod project;
pub mod rule;

/// Utilities for creating and tearing down temporary project trees in
/// tests — fixture helpers, not part of the crate's build logic proper.
#[cfg(feature = "project-util")]
pub mod project_util;

pub use attribute::{Attribute, AttributeStore};
pub use config::{Config, ConfigBuilder};
pub use crawler::{Crawler, ProjectCache, WalkReport};
pub use driver::{Driver, DriverApi, DriverRegistry, Phase};
pub use error::{Error, Result};
pub use manifest::{Manifest, MANIFEST_FILE_NAME};
pub use matchexpr::MatchProgram;
pub use project::{Project, ProjectId, ProjectKind};
pub use rule::{Action, Node, RuleEngine, RuleGraph, TargetSpec};

use std::collections::HashSet;
use std::path::Path;

use tracing::instrument;

/// Discover every project under `root`, resolve their dependency graph
/// against `external` (ids satisfied outside this tree — system libraries,
/// vendored packages), and drive each through [`orchestrate::build_project`]
/// in dependency order. This is the crate's single entry point for the
/// common case; callers needing finer control (custom scheduling, a
/// filtered rebuild) should drive [`Crawler`] and [`orchestrate`] directly.
#[instrument(skip(registry, config, external), fields(root = %root.as_ref().display()))]
pub fn build_tree(
    root: impl AsRef<Path>,
    registry: &DriverRegistry,
    config: &Config,
    external: &HashSet<ProjectId>,
) -> Result<(Crawler, WalkReport)> {
    let mut crawler = Crawler::new();
    crawler.search(root)?;
    crawler.resolve(external)?;
    let report = crawler.walk(|project| orchestrate::build_project(registry, config, project));
    Ok((crawler, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverApi;
    use std::fs;
    use std::sync::{Arc, Mutex};

    /// Records the order it's invoked in for each project; doesn't touch
    /// the filesystem, so this test exercises the crawler/orchestrator
    /// wiring in [`build_tree`] without depending on a real compiler.
    struct OrderDriver {
        language: &'static str,
        order: Arc<Mutex<Vec<ProjectId>>>,
    }

    impl Driver for OrderDriver {
        fn id(&self) -> &str {
            self.language
        }

        fn init(&self, _api: &mut DriverApi<'_>, project: &mut Project) -> Result<()> {
            self.order.lock().unwrap().push(project.id.clone());
            Ok(())
        }
    }

    #[test]
    fn build_tree_discovers_and_builds_a_two_project_chain() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("project.json"),
            r#"{"id": "libfoo", "type": "package", "language": "rec", "recursive": true}"#,
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("app")).unwrap();
        fs::write(
            dir.path().join("app/project.json"),
            r#"{"id": "app", "type": "application", "language": "rec", "use": ["libfoo"]}"#,
        )
        .unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut registry = DriverRegistry::new();
        registry.register(Box::new(OrderDriver { language: "lang.rec", order: order.clone() }));
        let config = Config::debug(dir.path().join("home"));

        let (crawler, report) =
            build_tree(dir.path(), &registry, &config, &HashSet::new()).unwrap();
        assert!(report.is_success(), "{report:?}");
        assert!(crawler.project("libfoo").unwrap().built);
        assert!(crawler.project("app").unwrap().built);
        assert_eq!(
            *order.lock().unwrap(),
            vec!["libfoo".to_string(), "app".to_string()],
            "a project's phases must not start before its dependencies finish",
        );
    }

    #[test]
    fn build_tree_reports_unresolved_external_dependency_as_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("project.json"),
            r#"{"id": "app", "type": "application", "language": "rec", "use": ["missing"]}"#,
        )
        .unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut registry = DriverRegistry::new();
        registry.register(Box::new(OrderDriver { language: "lang.rec", order }));
        let config = Config::debug(dir.path().join("home"));

        let result = build_tree(dir.path(), &registry, &config, &HashSet::new());
        assert!(result.is_err());
    }
}
