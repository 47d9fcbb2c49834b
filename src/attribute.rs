//! The per-project attribute store: a typed key-value bag (bool/string/
//! number/array) populated from a project's declarative metadata.

use serde::{Deserialize, Serialize};

/// A single attribute value. Mirrors the `value` block of a project
/// manifest: every leaf is a bool, string, number, or an array of the same.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Attribute {
    Bool(bool),
    Str(String),
    Num(f64),
    Array(Vec<Attribute>),
}

impl Attribute {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Self::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Attribute]> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Render an array of strings, skipping non-string entries.
    pub fn as_string_array(&self) -> Vec<String> {
        match self {
            Self::Array(items) => items.iter().filter_map(|i| i.as_str()).map(str::to_owned).collect(),
            Self::Str(s) => vec![s.clone()],
            _ => Vec::new(),
        }
    }
}

/// Names recognized by the driver framework itself (as opposed to
/// driver-specific attributes, which are opaque to the core and simply
/// passed through).
pub mod known {
    pub const CFLAGS: &str = "cflags";
    pub const CXXFLAGS: &str = "cxxflags";
    pub const LDFLAGS: &str = "ldflags";
    pub const INCLUDE: &str = "include";
    pub const LIB: &str = "lib";
    pub const LIBPATH: &str = "libpath";
    pub const STATIC_LIB: &[&str] = &["static_lib", "static-lib"];
    pub const STATIC_ARTEFACT: &[&str] = &["static_artefact", "static"];
    pub const EXPORT_SYMBOLS: &[&str] = &["export_symbols", "export-symbols"];
    pub const DYLIB: &str = "dylib";
    pub const C_STANDARD: &str = "c-standard";
    pub const CPP_STANDARD: &str = "cpp-standard";
}

/// A linear, name-indexed bag of [`Attribute`]s.
///
/// Lookup is linear by name, matching the documented invariant; a
/// `HashMap` would happen to behave the same for well-formed manifests but
/// the linear scan is what the "set never produces duplicates" guarantee is
/// specified against, so this stays a `Vec`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeStore(Vec<(String, Attribute)>);

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Look up any of several accepted spellings for the same logical
    /// attribute (e.g. `static_lib` / `static-lib`).
    pub fn get_any(&self, names: &[&str]) -> Option<&Attribute> {
        names.iter().find_map(|n| self.get(n))
    }

    /// Set an attribute, overwriting any existing value with the same name.
    pub fn set(&mut self, name: impl Into<String>, value: Attribute) {
        let name = name.into();
        if let Some(slot) = self.0.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.0.push((name, value));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites_without_duplicating() {
        let mut store = AttributeStore::new();
        store.set("cflags", Attribute::Array(vec![Attribute::Str("-O2".into())]));
        store.set("cflags", Attribute::Array(vec![Attribute::Str("-O3".into())]));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("cflags").unwrap().as_string_array(), vec!["-O3".to_string()]);
    }

    #[test]
    fn unknown_attribute_is_absent_not_error() {
        let store = AttributeStore::new();
        assert!(store.get("nonexistent").is_none());
    }

    #[test]
    fn get_any_accepts_alternate_spellings() {
        let mut store = AttributeStore::new();
        store.set("static-lib", Attribute::Array(vec![Attribute::Str("foo".into())]));
        assert!(store.get_any(known::STATIC_LIB).is_some());
    }
}
