//! The rule graph and its evaluation engine.
//!
//! A driver declares **patterns** (named file sets), **files** (named
//! single paths) and **rules** (source → target edges with an action) and
//! asks the engine to walk from a root node — conventionally named
//! `ARTEFACT` — computing staleness and firing actions in dependency order.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, trace, warn};

use crate::error::{Error, Result, ResultExt};
use crate::fsiter;
use crate::matchexpr::MatchProgram;
use crate::project::Project;

pub type Action = Box<dyn Fn(&[PathBuf], &Path, &mut Project) -> Result<()> + Send + Sync>;
pub type MapFn = Box<dyn Fn(&Path) -> PathBuf + Send + Sync>;

/// The output half of a rule.
pub enum TargetSpec {
    /// A single literal target path, shared by all sources (n-to-1).
    File(PathBuf),
    /// A single target path instantiated from a (non-wildcard) pattern
    /// string, shared by all sources (n-to-1).
    Pattern(String),
    /// A pure per-source mapping function (n-to-n).
    Map(MapFn),
    /// Use the project's default artefact path.
    None,
}

pub enum Node {
    Pattern { name: String, glob: MatchProgram },
    File { name: String, path: PathBuf },
    Rule { name: String, source_ref: String, target: TargetSpec, action: Action },
    /// Reserved: dynamic per-target dependency computation. The evaluator
    /// resolves it identically to `Rule` with an empty pre-check; drivers
    /// in this crate do not yet populate one.
    DependencyRule { name: String, deps_ref: String, target: TargetSpec, action: Action },
}

impl Node {
    fn name(&self) -> &str {
        match self {
            Node::Pattern { name, .. }
            | Node::File { name, .. }
            | Node::Rule { name, .. }
            | Node::DependencyRule { name, .. } => name,
        }
    }
}

/// A driver's declarative rule graph.
#[derive(Default)]
pub struct RuleGraph {
    nodes: HashMap<String, Node>,
    /// Resolved when a rule's `TargetSpec::None` is evaluated.
    pub default_artefact: Option<PathBuf>,
}

impl RuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pattern(&mut self, name: impl Into<String>, glob: &str) -> Result<()> {
        let name = name.into();
        let glob = MatchProgram::compile(glob)?;
        self.nodes.insert(name.clone(), Node::Pattern { name, glob });
        Ok(())
    }

    pub fn file(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) {
        let name = name.into();
        self.nodes.insert(name.clone(), Node::File { name, path: path.into() });
    }

    pub fn rule(
        &mut self,
        name: impl Into<String>,
        source_ref: impl Into<String>,
        target: TargetSpec,
        action: Action,
    ) {
        let name = name.into();
        self.nodes.insert(
            name.clone(),
            Node::Rule { name, source_ref: source_ref.into(), target, action },
        );
    }

    pub fn dependency_rule(
        &mut self,
        name: impl Into<String>,
        deps_ref: impl Into<String>,
        target: TargetSpec,
        action: Action,
    ) {
        let name = name.into();
        self.nodes.insert(
            name.clone(),
            Node::DependencyRule { name, deps_ref: deps_ref.into(), target, action },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }
}

/// Walks a [`RuleGraph`], computing staleness and invoking actions.
pub struct RuleEngine<'g> {
    graph: &'g RuleGraph,
    cache: HashMap<String, Vec<PathBuf>>,
}

impl<'g> RuleEngine<'g> {
    pub fn new(graph: &'g RuleGraph) -> Self {
        Self { graph, cache: HashMap::new() }
    }

    /// Evaluate `root` (conventionally `ARTEFACT`) against `project`,
    /// returning the root node's resulting file list.
    #[instrument(skip(self, project), fields(project = %project.id, root))]
    pub fn evaluate(&mut self, project: &mut Project, root: &str) -> Result<Vec<PathBuf>> {
        self.resolve(project, root)
    }

    fn resolve(&mut self, project: &mut Project, name: &str) -> Result<Vec<PathBuf>> {
        if let Some(cached) = self.cache.get(name) {
            return Ok(cached.clone());
        }
        let node = self
            .graph
            .nodes
            .get(name)
            .ok_or_else(|| Error::internal(format!("rule graph has no node named `{name}`")))?;

        let result: Result<Vec<PathBuf>> = match node {
            Node::Pattern { glob, .. } => fsiter::iterate(&project.path, glob),
            Node::File { path, .. } => Ok(vec![path.clone()]),
            Node::Rule { name, source_ref, target, action } => {
                self.run_rule(project, name, source_ref, target, action)
            }
            Node::DependencyRule { name, deps_ref, target, action } => {
                self.run_rule(project, name, deps_ref, target, action)
            }
        };
        // Each level of recursion tacks on its own node name, so an error
        // raised deep in a dependency chain (e.g. ARTEFACT -> OBJECTS ->
        // SOURCES) surfaces with a frame per node it passed through.
        let result = result.with_context(|| format!("resolving node `{name}`"))?;

        self.cache.insert(name.to_string(), result.clone());
        Ok(result)
    }

    fn run_rule(
        &mut self,
        project: &mut Project,
        rule_name: &str,
        source_ref: &str,
        target: &TargetSpec,
        action: &Action,
    ) -> Result<Vec<PathBuf>> {
        let mut sources = self.resolve(project, source_ref)?;
        sources.sort();

        let pairs = self.expand_targets(project, target, &sources)?;
        let mut outputs = Vec::with_capacity(pairs.len());

        for (group_sources, target_path) in pairs {
            // `group_sources`/`target_path` may be project-relative (e.g. a
            // pattern match or a `Map` closure that only saw relative
            // sources) or already absolute (a driver that resolved its own
            // paths); `resolve_path` normalizes either case against the
            // project root before any filesystem operation runs, since
            // `fs::metadata` and a spawned action both resolve relative
            // paths against the process cwd, not the project root.
            let abs_sources: Vec<PathBuf> =
                group_sources.iter().map(|s| resolve_path(&project.path, s)).collect();
            let abs_target = resolve_path(&project.path, &target_path);

            if is_stale(&abs_sources, &abs_target)? {
                trace!(rule = rule_name, target = %abs_target.display(), "stale, running action");
                action(&abs_sources, &abs_target, project).map_err(|e| {
                    project.mark_error();
                    Error::rule_execution(project.id.clone(), rule_name, e.to_string())
                })?;
                project.changed = true;
                if !abs_target.exists() {
                    project.mark_error();
                    return Err(Error::rule_execution(
                        project.id.clone(),
                        rule_name,
                        format!("target `{}` still absent after action", abs_target.display()),
                    ));
                }
            } else {
                debug!(rule = rule_name, target = %abs_target.display(), "fresh, skipping");
            }
            outputs.push(target_path);
        }
        Ok(outputs)
    }

    fn expand_targets(
        &self,
        project: &Project,
        target: &TargetSpec,
        sources: &[PathBuf],
    ) -> Result<Vec<(Vec<PathBuf>, PathBuf)>> {
        match target {
            TargetSpec::Map(f) => {
                // MAP produces one target per source; when two sources
                // collide on the same target, the later source (by sort
                // order, i.e. later in `sources`) wins — a configuration
                // smell, not an error.
                let mut by_target: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();
                for src in sources {
                    let tgt = f(src);
                    if by_target.contains_key(&tgt) {
                        warn!(target = %tgt.display(), "two sources map to the same target");
                    }
                    by_target.insert(tgt, src.clone());
                }
                Ok(by_target.into_iter().map(|(tgt, src)| (vec![src], tgt)).collect())
            }
            TargetSpec::File(path) => Ok(vec![(sources.to_vec(), path.clone())]),
            TargetSpec::Pattern(literal) => {
                Ok(vec![(sources.to_vec(), project.path.join(literal))])
            }
            TargetSpec::None => {
                let default = project.path.join(
                    project
                        .attributes
                        .get("artefact_path")
                        .and_then(|a| a.as_str())
                        .map(str::to_owned)
                        .unwrap_or_else(|| project.artefact_name(cfg!(target_os = "windows"))),
                );
                Ok(vec![(sources.to_vec(), default)])
            }
        }
    }
}

/// Join `path` onto `base` unless `path` is already absolute — `PathBuf::
/// join` would otherwise silently discard `base` for an absolute `path`,
/// but here that case means a caller (a driver's `Map` closure, typically)
/// already resolved it and it should pass through unchanged.
fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn is_stale(sources: &[PathBuf], target: &Path) -> Result<bool> {
    if !target.exists() {
        return Ok(true);
    }
    let target_mtime = fs::metadata(target).and_then(|m| m.modified()).map_err(|e| Error::fs(target, e))?;
    for source in sources {
        let meta = fs::metadata(source).map_err(|e| Error::fs(source, e))?;
        let mtime = meta.modified().map_err(|e| Error::fs(source, e))?;
        if mtime > target_mtime {
            return Ok(true);
        }
    }
    Ok(false)
}
