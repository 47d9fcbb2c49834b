//! Pure path utilities: clean, combine, dirname, offset, tokenize.
//!
//! These operate on `/`-separated logical paths (the manifest and match
//! expressions never see platform separators; translation to
//! [`std::path::Path`] happens at the filesystem boundary in [`crate::fsiter`]).

use crate::error::{Error, Result};

/// Depth cap for [`tokenize`]. Chosen generously; real project trees never
/// approach it, and rejecting past this bound keeps pathological inputs
/// (and the match engine that walks them) bounded.
pub const MAX_DEPTH: usize = 256;

/// Split `path` into its non-empty `/`-separated components.
///
/// Returns an error if the path has more than [`MAX_DEPTH`] components.
pub fn tokenize(path: &str) -> Result<Vec<&str>> {
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if parts.len() > MAX_DEPTH {
        return Err(Error::internal(format!(
            "path `{path}` exceeds the maximum depth of {MAX_DEPTH} components"
        )));
    }
    Ok(parts)
}

/// Remove `.` components, resolve `..` against the prior component (never
/// past the root), and collapse duplicate separators.
pub fn clean(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut out: Vec<&str> = Vec::new();
    for comp in path.split('/') {
        match comp {
            "" | "." => continue,
            ".." => {
                if let Some(last) = out.last() {
                    if *last != ".." {
                        out.pop();
                        continue;
                    }
                }
                if !absolute {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    let joined = out.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Join `parent` and `child`. An absolute `child` replaces `parent`
/// entirely; joining onto the root never produces a doubled separator.
pub fn combine(parent: &str, child: &str) -> String {
    if child.starts_with('/') {
        return clean(child);
    }
    if parent.is_empty() || parent == "." {
        return clean(child);
    }
    if parent == "/" {
        return clean(&format!("/{child}"));
    }
    clean(&format!("{parent}/{child}"))
}

/// The parent portion of `path`; the empty string if there is no separator.
pub fn dirname(path: &str) -> String {
    match path.rfind('/') {
        None => String::new(),
        Some(0) => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

/// The final component of `path`.
pub fn basename(path: &str) -> &str {
    match path.rfind('/') {
        None => path,
        Some(idx) => &path[idx + 1..],
    }
}

/// Produce a relative path that, appended to `from`, equals `to`.
///
/// When `allow_parent` is false, the result never contains `..`; if `to`
/// is not a descendant of `from` in that mode, `to` (cleaned) is returned
/// as-is rather than synthesizing a `..`-laden path.
pub fn offset(from: &str, to: &str, allow_parent: bool) -> Result<String> {
    let from_parts = tokenize(&clean(from))?;
    let to_parts = tokenize(&clean(to))?;

    let common = from_parts.iter().zip(to_parts.iter()).take_while(|(a, b)| a == b).count();

    if !allow_parent && common < from_parts.len() {
        return Ok(clean(to));
    }

    let mut out: Vec<&str> = Vec::new();
    for _ in common..from_parts.len() {
        out.push("..");
    }
    out.extend(to_parts[common..].iter().copied());

    if out.is_empty() {
        Ok(".".to_string())
    } else {
        Ok(out.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_is_idempotent() {
        for p in ["a/./b/../c", "/a/../../b", "a//b///c", "./a/b/", ""] {
            assert_eq!(clean(&clean(p)), clean(p));
        }
    }

    #[test]
    fn clean_examples() {
        assert_eq!(clean("a/./b/../c"), "a/c");
        assert_eq!(clean("/a/../../b"), "/b");
        assert_eq!(clean(""), ".");
    }

    #[test]
    fn combine_roundtrips_with_dirname_and_basename() {
        let p = "/a/b/c";
        assert_eq!(clean(&combine(&dirname(p), basename(p))), clean(p));
    }

    #[test]
    fn offset_self_is_dot() {
        assert_eq!(offset("/a/b", "/a/b", true).unwrap(), ".");
    }

    #[test]
    fn offset_into_child_has_no_parent_refs() {
        let a = "/a/b";
        let child = combine(a, "c/d");
        let off = offset(a, &child, true).unwrap();
        assert!(!off.split('/').any(|c| c == ".."));
        assert_eq!(combine(a, &off), clean(&child));
    }

    #[test]
    fn offset_diverging_without_parent_returns_to_as_is() {
        let off = offset("/a/b", "/x/y", false).unwrap();
        assert_eq!(off, "/x/y");
    }

    #[test]
    fn tokenize_rejects_excessive_depth() {
        let long = "a/".repeat(MAX_DEPTH + 1);
        assert!(tokenize(&long).is_err());
    }
}
