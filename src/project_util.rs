//! Fixture builders for integration tests: construct temporary project
//! trees without every test hand-rolling `tempfile`/`fs::write`
//! boilerplate. Gated behind the `project-util` feature, the way the
//! teacher ships a companion `project_util` crate for its own `tests/
//! project.rs`/`tests/mocked.rs` suites.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{Error, Result};
use crate::manifest::MANIFEST_FILE_NAME;

/// A directory tree rooted in a [`tempfile::TempDir`], torn down on drop.
pub struct TempTree {
    dir: TempDir,
}

impl TempTree {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().map_err(|e| Error::fs(std::env::temp_dir(), e))?;
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write `content` to `relative`, creating parent directories as needed.
    pub fn write(&self, relative: impl AsRef<Path>, content: impl AsRef<[u8]>) -> Result<PathBuf> {
        let path = self.dir.path().join(relative.as_ref());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::fs(parent, e))?;
        }
        fs::write(&path, content).map_err(|e| Error::fs(&path, e))?;
        Ok(path)
    }

    /// Write a `project.json` manifest under `relative` (conventionally a
    /// project's own directory, possibly the tree root itself).
    pub fn manifest(&self, relative: impl AsRef<Path>, json: &str) -> Result<PathBuf> {
        self.write(relative.as_ref().join(MANIFEST_FILE_NAME), json)
    }

    /// Recursively copy `src` (a directory on disk, e.g. a checked-in
    /// fixture) into `relative` inside this tree.
    pub fn copy_from(&self, relative: impl AsRef<Path>, src: impl AsRef<Path>) -> Result<PathBuf> {
        let dest = self.dir.path().join(relative.as_ref());
        fs::create_dir_all(&dest).map_err(|e| Error::fs(&dest, e))?;
        let options = fs_extra::dir::CopyOptions::new().content_only(true);
        fs_extra::dir::copy(src.as_ref(), &dest, &options)
            .map_err(|e| Error::internal(format!("failed to copy fixture into tree: {e}")))?;
        Ok(dest)
    }
}
