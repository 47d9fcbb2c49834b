//! Filesystem iteration: `iterate(root, filter)` over the match engine.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::matchexpr::MatchProgram;

/// Iterate `root` for paths (relative to `root`) matching `filter`.
///
/// A purely literal filter (no wildcards) is resolved as a single-file
/// existence test. Otherwise every file under `root` is visited and
/// matched against the compiled program, which by construction only
/// accepts paths whose component count the pattern actually spans — a
/// single-level filter like `src/*.c` therefore never matches a file two
/// directories deep even though the walk itself visits it. The "descend
/// non-recursively unless tree-scoped" split in the match engine's design
/// is a scanning optimization this walk does not need to replicate for
/// correctness.
///
/// A missing `root` is fatal; `ENOENT` races on individual candidate
/// entries (removed between listing and stat) are silently skipped.
pub fn iterate(root: &Path, filter: &MatchProgram) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Err(Error::fs(
            root,
            std::io::Error::new(std::io::ErrorKind::NotFound, "root path does not exist"),
        ));
    }

    if filter.is_literal() {
        let candidate = root.join(filter.source());
        return Ok(if candidate.exists() { vec![PathBuf::from(filter.source())] } else { vec![] });
    }

    let mut out = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if entry.path() == root {
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = match entry.path().strip_prefix(root) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let rel_str = path_slash::PathExt::to_slash_lossy(rel);
        if filter.is_match(&rel_str) {
            out.push(rel.to_path_buf());
        }
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn literal_filter_is_existence_test() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.c"), "").unwrap();
        let prog = MatchProgram::compile("main.c").unwrap();
        let found = iterate(dir.path(), &prog).unwrap();
        assert_eq!(found, vec![PathBuf::from("main.c")]);

        let prog_missing = MatchProgram::compile("missing.c").unwrap();
        assert!(iterate(dir.path(), &prog_missing).unwrap().is_empty());
    }

    #[test]
    fn tree_glob_descends_recursively() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        fs::write(dir.path().join("src/a.c"), "").unwrap();
        fs::write(dir.path().join("src/nested/b.c"), "").unwrap();
        fs::write(dir.path().join("src/nested/b.h"), "").unwrap();

        let prog = MatchProgram::compile("src/**/*.c").unwrap();
        let found = iterate(dir.path(), &prog).unwrap();
        assert_eq!(found, vec![PathBuf::from("src/nested/b.c")]);
    }

    #[test]
    fn single_level_glob_does_not_descend() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        fs::write(dir.path().join("src/a.c"), "").unwrap();
        fs::write(dir.path().join("src/nested/b.c"), "").unwrap();

        let prog = MatchProgram::compile("src/*.c").unwrap();
        let found = iterate(dir.path(), &prog).unwrap();
        assert_eq!(found, vec![PathBuf::from("src/a.c")]);
    }

    #[test]
    fn missing_root_is_fatal() {
        let prog = MatchProgram::compile("*.c").unwrap();
        assert!(iterate(Path::new("/nonexistent/drydock-test-root"), &prog).is_err());
    }
}
