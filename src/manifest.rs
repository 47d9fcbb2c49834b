//! The project manifest: the JSON-shaped file the crawler looks for while
//! walking a directory tree, and its conversion into a [`Project`].

use std::collections::BTreeMap;
use std::path::Path;

use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attribute::{Attribute, AttributeStore};
use crate::error::{Error, Result};
use crate::project::{Project, ProjectId, ProjectKind};

/// Conventional manifest file name the crawler searches for.
pub const MANIFEST_FILE_NAME: &str = "project.json";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TestSuite {
    pub id: String,
    pub testcases: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Manifest {
    pub id: ProjectId,
    #[serde(rename = "type")]
    pub kind: ProjectKind,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default, rename = "use")]
    pub use_: Vec<ProjectId>,
    #[serde(default)]
    pub use_private: Vec<ProjectId>,
    #[serde(default)]
    pub use_build: Vec<ProjectId>,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub value: BTreeMap<String, Value>,
    #[serde(default)]
    pub testsuites: Vec<TestSuite>,
}

impl Manifest {
    /// Parse a manifest from its on-disk JSON form, using
    /// `serde_path_to_error`-style precision is unnecessary here (the
    /// manifest is small and flat); a plain `serde_json::from_str` failure
    /// is wrapped with the offending path.
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| Error::config(path, e.to_string()))
    }

    /// Validate and parse the optional semver `version` field. A patch
    /// component without a minor component is rejected, per the manifest
    /// contract.
    fn parsed_version(&self, path: &Path) -> Result<Option<Version>> {
        let Some(raw) = &self.version else { return Ok(None) };
        let parts: Vec<&str> = raw.split('.').collect();
        match parts.len() {
            1 => Version::parse(&format!("{raw}.0.0")),
            2 => Version::parse(&format!("{raw}.0")),
            _ => Version::parse(raw),
        }
        .map(Some)
        .map_err(|e| Error::config(path, format!("invalid version `{raw}`: {e}")))
    }

    fn attribute_store(&self) -> AttributeStore {
        let mut store = AttributeStore::new();
        for (name, value) in &self.value {
            store.set(name.clone(), json_to_attribute(value));
        }
        store
    }

    /// Convert this manifest, discovered at `root`, into a [`Project`].
    pub fn into_project(self, root: &Path) -> Result<Project> {
        if self.id.is_empty() {
            return Err(Error::config(root, "manifest is missing a required `id`"));
        }
        let version = self.parsed_version(root)?;
        let mut project = Project::new(self.id.clone(), self.kind, root);
        project.language = self.language.unwrap_or_default();
        project.version = version;
        project.use_public = self.use_;
        project.use_private = self.use_private;
        project.use_build = self.use_build;
        project.recursive = self.recursive;
        project.attributes = self.attribute_store();
        Ok(project)
    }
}

fn json_to_attribute(value: &Value) -> Attribute {
    match value {
        Value::Bool(b) => Attribute::Bool(*b),
        Value::Number(n) => Attribute::Num(n.as_f64().unwrap_or_default()),
        Value::String(s) => Attribute::Str(s.clone()),
        Value::Array(items) => Attribute::Array(items.iter().map(json_to_attribute).collect()),
        Value::Null => Attribute::Bool(false),
        Value::Object(map) => {
            Attribute::Array(map.values().map(json_to_attribute).collect())
        }
    }
}
