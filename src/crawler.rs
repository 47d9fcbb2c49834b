//! Project discovery and dependency-ordered traversal.
//!
//! `Crawler::search` walks a directory tree looking for [`crate::manifest::
//! MANIFEST_FILE_NAME`] files, parses each into a [`Project`], and inserts it
//! into a global id-keyed map. `Crawler::resolve` then builds the inter-
//! project dependency DAG (detecting cycles) and `Crawler::walk` traverses it
//! in dependency order with partial-failure handling, mirroring `bake`'s
//! `bake_crawler_search`/`bake_crawler_walk` (see `include/crawler.h` in the
//! original source this crate's design is grounded on).

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use tracing::{debug, instrument, trace, warn};

use crate::error::{Error, Result, ResultExt};
use crate::manifest::{Manifest, MANIFEST_FILE_NAME};
use crate::project::{Project, ProjectId};

/// A lightweight per-run skip cache: records each project's last-built
/// source-content hash so a subsequent `walk` can skip projects whose
/// sources are unchanged. This is project-level "skip if unchanged", not
/// incremental per-header dependency tracking (an explicit non-goal) — the
/// same axis `SolFilesCache`/`CacheEntry` in the teacher operates on for
/// Solidity files, just without per-file granularity.
#[derive(Debug, Clone, Default)]
pub struct ProjectCache {
    content_hash: HashMap<ProjectId, u64>,
}

impl ProjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if `project`'s current content hash matches the recorded one
    /// from a prior successful build.
    pub fn is_unchanged(&self, project: &Project, hash: u64) -> bool {
        self.content_hash.get(&project.id) == Some(&hash)
    }

    pub fn record(&mut self, project: &Project, hash: u64) {
        self.content_hash.insert(project.id.clone(), hash);
    }
}

/// Hash every regular file's path and modification time under `root`. Cheap
/// proxy for "did anything in this project change" without reading file
/// contents.
pub fn content_hash(root: &Path) -> Result<u64> {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    let mut entries = Vec::new();
    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(meta) = entry.metadata() {
            if let Ok(modified) = meta.modified() {
                entries.push((entry.path().to_path_buf(), modified));
            }
        }
    }
    entries.sort();
    for (path, modified) in entries {
        path.hash(&mut hasher);
        modified.hash(&mut hasher);
    }
    Ok(hasher.finish())
}

/// Outcome of a full [`Crawler::walk`].
#[derive(Debug, Default)]
pub struct WalkReport {
    pub built: Vec<ProjectId>,
    /// Projects [`Crawler::walk_cached`] found unchanged against a prior
    /// successful build and built without invoking the callback.
    pub skipped: Vec<ProjectId>,
    pub blocked: Vec<ProjectId>,
    pub failed: Vec<ProjectId>,
    /// Ids involved in a dependency cycle, detected at `resolve` time.
    pub cycles: Vec<ProjectId>,
}

impl WalkReport {
    pub fn is_success(&self) -> bool {
        self.blocked.is_empty() && self.failed.is_empty() && self.cycles.is_empty()
    }
}

/// Discovers projects under a root, builds their dependency graph, and
/// drives dependency-ordered traversal.
#[derive(Default)]
pub struct Crawler {
    projects: HashMap<ProjectId, Project>,
    /// Project id -> node index, populated by `resolve`.
    nodes: HashMap<ProjectId, NodeIndex>,
    graph: DiGraph<ProjectId, ()>,
}

impl Crawler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn projects(&self) -> &HashMap<ProjectId, Project> {
        &self.projects
    }

    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.get(id)
    }

    /// Recursively search `path` for project manifests, inserting each
    /// discovered project into the global map. A duplicate id is a fatal
    /// error. A project marked `recursive` is itself also searched for
    /// nested child projects.
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn search(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.search_inner(path.as_ref())
    }

    fn search_inner(&mut self, path: &Path) -> Result<()> {
        let manifest_path = path.join(MANIFEST_FILE_NAME);
        if manifest_path.is_file() {
            let content = fs::read_to_string(&manifest_path)
                .map_err(|e| Error::fs(&manifest_path, e))
                .with_context(|| format!("reading manifest at `{}`", manifest_path.display()))?;
            let manifest = Manifest::parse(&manifest_path, &content)
                .with_context(|| format!("parsing manifest at `{}`", manifest_path.display()))?;
            let project = manifest
                .into_project(path)
                .with_context(|| format!("building project from manifest `{}`", manifest_path.display()))?;
            let recursive = project.recursive;

            trace!(id = %project.id, path = %path.display(), "discovered project");
            if self.projects.contains_key(&project.id) {
                return Err(Error::config(
                    &manifest_path,
                    format!("duplicate project id `{}`", project.id),
                ));
            }
            self.projects.insert(project.id.clone(), project);

            if !recursive {
                return Ok(());
            }
        }

        let entries = match fs::read_dir(path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::fs(path, e));
            }
            Err(e) => return Err(Error::fs(path, e)),
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(_) => continue,
            };
            let child_path = entry.path();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                self.search_inner(&child_path)?;
            }
        }
        Ok(())
    }

    /// Build the dependency DAG from every discovered project's `use`/
    /// `use_private`/`use_build` lists, resolving external ids against
    /// `external`. Returns an error for the first project whose dependency
    /// id resolves to neither a discovered project nor an external package.
    /// Cycles are not an error here — they surface as blocked projects from
    /// [`Self::walk`], matching the original's "enumerate and report" policy.
    #[instrument(skip(self, external))]
    pub fn resolve(&mut self, external: &HashSet<ProjectId>) -> Result<()> {
        self.nodes.clear();
        self.graph = DiGraph::new();

        for id in self.projects.keys() {
            let idx = self.graph.add_node(id.clone());
            self.nodes.insert(id.clone(), idx);
        }

        let ids: Vec<ProjectId> = self.projects.keys().cloned().collect();
        for id in &ids {
            let deps: Vec<ProjectId> =
                self.projects[id].all_dependencies().cloned().collect();
            for dep in &deps {
                if !self.projects.contains_key(dep) && !external.contains(dep) {
                    let project = self.projects.get_mut(id).unwrap();
                    project.mark_error();
                    return Err(Error::dependency(format!(
                        "project `{id}` depends on unresolved id `{dep}`"
                    )));
                }
                if let Some(&dep_idx) = self.nodes.get(dep) {
                    let this_idx = self.nodes[id];
                    self.graph.add_edge(dep_idx, this_idx, ());
                    self.projects.get_mut(id).unwrap().unresolved_dependencies += 1;
                    self.projects.get_mut(dep).unwrap().dependents.push(id.clone());
                }
            }
        }

        debug!(projects = self.projects.len(), edges = self.graph.edge_count(), "dependency graph built");
        Ok(())
    }

    /// Topological traversal: projects with zero unresolved dependencies are
    /// enqueued first; each is passed to `callback`, then marked `built` on
    /// success and its dependents' counters decremented. A project whose
    /// callback reports failure (`project.error`) does not release its
    /// dependents — they remain blocked. Independent subtrees still build.
    /// Any project with a non-zero counter once the queue drains is part of
    /// a cycle.
    ///
    /// Equivalent to [`Self::walk_cached`] with a fresh, empty cache — every
    /// project is built unconditionally.
    pub fn walk(&mut self, callback: impl FnMut(&mut Project) -> Result<()>) -> WalkReport {
        self.walk_cached(&mut ProjectCache::new(), callback)
    }

    /// As [`Self::walk`], but consults `cache` before building each ready
    /// project: if its on-disk content hash matches the hash recorded from a
    /// prior successful build, the callback is skipped entirely and the
    /// project is reported under [`WalkReport::skipped`] instead of
    /// [`WalkReport::built`]. Passing the same `cache` across repeated
    /// `search`/`resolve`/`walk_cached` cycles (e.g. successive builds of the
    /// same tree) is what makes unchanged projects cheap to re-walk.
    #[instrument(skip(self, cache, callback))]
    pub fn walk_cached(
        &mut self,
        cache: &mut ProjectCache,
        mut callback: impl FnMut(&mut Project) -> Result<()>,
    ) -> WalkReport {
        let mut report = WalkReport::default();
        let mut queue: VecDeque<ProjectId> = self
            .projects
            .values()
            .filter(|p| p.is_ready())
            .map(|p| p.id.clone())
            .collect();
        let mut visited: HashSet<ProjectId> = HashSet::new();

        while let Some(id) = queue.pop_front() {
            if visited.contains(&id) {
                continue;
            }
            visited.insert(id.clone());

            let dependents = self.projects[&id].dependents.clone();
            let hash = content_hash(&self.projects[&id].path).ok();

            let (ok, skipped) = {
                let project = self.projects.get_mut(&id).unwrap();
                if hash.map(|h| cache.is_unchanged(project, h)).unwrap_or(false) {
                    debug!(id = %id, "skipping unchanged project");
                    project.built = true;
                    (true, true)
                } else {
                    match callback(project) {
                        Ok(()) if !project.error => {
                            project.built = true;
                            (true, false)
                        }
                        Ok(()) => (false, false),
                        Err(e) => {
                            warn!(id = %id, error = %e, "project failed");
                            project.mark_error();
                            (false, false)
                        }
                    }
                }
            };

            if ok {
                if let Some(hash) = hash {
                    cache.record(&self.projects[&id], hash);
                }
                if skipped {
                    report.skipped.push(id.clone());
                } else {
                    report.built.push(id.clone());
                }
                for dep_id in dependents {
                    if let Some(dependent) = self.projects.get_mut(&dep_id) {
                        dependent.unresolved_dependencies =
                            dependent.unresolved_dependencies.saturating_sub(1);
                        if dependent.is_ready() && !visited.contains(&dep_id) {
                            queue.push_back(dep_id);
                        }
                    }
                }
            } else {
                report.failed.push(id.clone());
            }
        }

        for (id, project) in &self.projects {
            if !visited.contains(id) {
                report.blocked.push(id.clone());
                if project.unresolved_dependencies > 0 && !self.has_completed_predecessor(id) {
                    report.cycles.push(id.clone());
                }
            }
        }
        report.built.sort();
        report.skipped.sort();
        report.blocked.sort();
        report.failed.sort();
        report.cycles.sort();
        report
    }

    /// `true` if any of `id`'s direct dependencies finished building — used
    /// to distinguish "blocked by a cycle" from "blocked by a failed
    /// dependency" in [`Self::walk`]'s final sweep.
    fn has_completed_predecessor(&self, id: &str) -> bool {
        let Some(&idx) = self.nodes.get(id) else { return false };
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .any(|edge| {
                let dep_id = &self.graph[edge.source()];
                self.projects.get(dep_id).map(|p| p.built).unwrap_or(false)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::ProjectKind;
    use std::collections::HashSet;

    fn project(id: &str, kind: ProjectKind, uses: &[&str]) -> Project {
        let mut p = Project::new(id, kind, format!("/src/{id}"));
        p.use_public = uses.iter().map(|s| s.to_string()).collect();
        p
    }

    #[test]
    fn topological_order_respects_dependencies() {
        let mut crawler = Crawler::new();
        crawler.projects.insert("libfoo".into(), project("libfoo", ProjectKind::Package, &[]));
        crawler.projects.insert("app".into(), project("app", ProjectKind::Application, &["libfoo"]));
        crawler.resolve(&HashSet::new()).unwrap();

        let mut order = Vec::new();
        let report = crawler.walk(|p| {
            order.push(p.id.clone());
            Ok(())
        });
        assert!(report.is_success());
        assert_eq!(order, vec!["libfoo".to_string(), "app".to_string()]);
    }

    #[test]
    fn cycle_is_reported_and_blocks_both_projects() {
        let mut crawler = Crawler::new();
        crawler.projects.insert("a".into(), project("a", ProjectKind::Package, &["b"]));
        crawler.projects.insert("b".into(), project("b", ProjectKind::Package, &["a"]));
        crawler.resolve(&HashSet::new()).unwrap();

        let report = crawler.walk(|_p| Ok(()));
        assert!(!report.is_success());
        assert_eq!(report.cycles, vec!["a".to_string(), "b".to_string()]);
        assert!(report.built.is_empty());
    }

    #[test]
    fn partial_failure_does_not_block_independent_subtree() {
        let mut crawler = Crawler::new();
        crawler.projects.insert("a".into(), project("a", ProjectKind::Package, &[]));
        crawler.projects.insert("b".into(), project("b", ProjectKind::Package, &["a"]));
        crawler.projects.insert("c".into(), project("c", ProjectKind::Package, &[]));
        crawler.resolve(&HashSet::new()).unwrap();

        let report = crawler.walk(|p| {
            if p.id == "a" {
                p.mark_error();
            }
            Ok(())
        });

        assert!(report.built.contains(&"c".to_string()));
        assert!(report.failed.contains(&"a".to_string()));
        assert!(report.blocked.contains(&"b".to_string()));
        let b = &crawler.projects["b"];
        assert!(!b.built);
        assert!(!b.error);
    }

    #[test]
    fn unresolved_dependency_id_is_an_error() {
        let mut crawler = Crawler::new();
        crawler.projects.insert("app".into(), project("app", ProjectKind::Application, &["missing"]));
        assert!(crawler.resolve(&HashSet::new()).is_err());
    }

    #[test]
    fn external_dependency_resolves_without_an_edge() {
        let mut crawler = Crawler::new();
        crawler.projects.insert("app".into(), project("app", ProjectKind::Application, &["libext"]));
        let mut external = HashSet::new();
        external.insert("libext".to_string());
        crawler.resolve(&external).unwrap();
        let report = crawler.walk(|_p| Ok(()));
        assert!(report.is_success());
    }

    #[test]
    fn malformed_manifest_error_carries_a_context_frame() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("project.json"), "not json").unwrap();
        let mut crawler = Crawler::new();
        let err = crawler.search(dir.path()).unwrap_err();
        assert!(err.to_string().contains("in parsing manifest at"), "{err}");
    }

    #[test]
    fn search_discovers_a_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("project.json"), r#"{"id": "hi", "type": "application"}"#)
            .unwrap();
        let mut crawler = Crawler::new();
        crawler.search(dir.path()).unwrap();
        assert!(crawler.project("hi").is_some());
    }

    #[test]
    fn walk_cached_skips_unchanged_project_on_second_walk() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("project.json"), r#"{"id": "hi", "type": "application"}"#)
            .unwrap();
        let mut crawler = Crawler::new();
        crawler.search(dir.path()).unwrap();
        crawler.resolve(&HashSet::new()).unwrap();

        let mut cache = ProjectCache::new();
        let mut calls = 0;
        let report1 = crawler.walk_cached(&mut cache, |_p| {
            calls += 1;
            Ok(())
        });
        assert!(report1.built.contains(&"hi".to_string()));
        assert!(report1.skipped.is_empty());

        let report2 = crawler.walk_cached(&mut cache, |_p| {
            calls += 1;
            Ok(())
        });
        assert!(report2.skipped.contains(&"hi".to_string()));
        assert!(report2.built.is_empty());
        assert_eq!(calls, 1, "callback must not run again for an unchanged project");
    }

    #[test]
    fn search_rejects_duplicate_ids() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::create_dir(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("a/project.json"), r#"{"id": "dup", "type": "application"}"#)
            .unwrap();
        fs::write(dir.path().join("b/project.json"), r#"{"id": "dup", "type": "application"}"#)
            .unwrap();
        let mut crawler = Crawler::new();
        assert!(crawler.search(dir.path()).is_err());
    }
}
