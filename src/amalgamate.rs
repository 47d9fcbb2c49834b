//! Single-file amalgamation: inlines a project's transitively-`#include`d
//! headers (or sources) into one emitted file.
//!
//! Grounded directly on `drivers/amalgamate/src/main.c`'s `amalgamate()`/
//! `generate()` in the original source: recursive quoted/angle-include
//! resolution against a `VisitedSet`, a `#define <PROJECT>_STATIC` header
//! prefix, and a guarded `#include "<project>.h"` block prefixing the
//! source-side output. Unlike the original, this reads lines with
//! [`std::io::BufRead::read_line`] into a growable `String` rather than a
//! fixed 256-byte buffer (see design note in `DESIGN.md`) and logs a
//! `tracing::warn!` rather than silently truncating implausibly long lines.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::{instrument, warn};

use crate::error::{Error, Result};

/// A line over this length is still emitted in full, but logged — the
/// original's 256-byte cap would have silently truncated it.
const SOFT_LINE_LENGTH_WARNING: usize = 4096;

/// Ensures each file contributes to the amalgamated output at most once
/// across a single run. Keyed by cleaned absolute path.
#[derive(Debug, Default)]
pub struct VisitedSet(BTreeSet<PathBuf>);

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `path` as visited; returns `true` if it was newly inserted
    /// (i.e. the caller should proceed to inline it).
    fn visit(&mut self, path: &Path) -> bool {
        self.0.insert(clean_absolute(path))
    }
}

fn clean_absolute(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IncludeStyle {
    Angle,
    Quoted,
}

/// A parsed `#include` directive.
struct Include {
    target: String,
    style: IncludeStyle,
}

/// Parse a `#include <...>` or `#include "..."` line. Returns `None` for any
/// other line (including other preprocessor directives).
fn parse_include(line: &str) -> Option<Include> {
    let trimmed = line.trim_start();
    let rest = trimmed.strip_prefix("#include")?;
    let rest = rest.trim_start();
    let (open, close, style) = match rest.chars().next()? {
        '"' => ('"', '"', IncludeStyle::Quoted),
        '<' => ('<', '>', IncludeStyle::Angle),
        _ => return None,
    };
    let body = &rest[open.len_utf8()..];
    let end = body.find(close)?;
    Some(Include { target: body[..end].to_string(), style })
}

/// Inline `file` (and everything it transitively `#include`s) into `out`,
/// recursing per [`parse_include`]. `include_path` is the project's shared
/// include directory (`<project>/include`); `is_include` selects the
/// header-pass resolution rules vs. the source-pass rules described in
/// spec.md §4.7.
fn amalgamate_into(
    out: &mut impl Write,
    include_path: &Path,
    is_include: bool,
    file: &Path,
    visited: &mut VisitedSet,
) -> Result<()> {
    if !visited.visit(file) {
        return Ok(());
    }

    let cur_dir = file.parent().unwrap_or_else(|| Path::new("."));
    let reader =
        BufReader::new(File::open(file).map_err(|e| Error::fs(file, e))?);

    for line in reader.lines() {
        let line = line.map_err(|e| Error::fs(file, e))?;
        if line.len() > SOFT_LINE_LENGTH_WARNING {
            warn!(file = %file.display(), len = line.len(), "implausibly long line in amalgamation source");
        }

        let Some(include) = parse_include(&line) else {
            writeln!(out, "{line}").map_err(|e| Error::fs(file, std::io::Error::other(e)))?;
            continue;
        };

        match include.style {
            IncludeStyle::Quoted => {
                // Always resolved relative to the current file first, then
                // against the shared include path, in both passes — the
                // `is_include` flag only ever gated a no-op branch in the
                // original, so both passes fall back the same way. A target
                // already visited in the *other* pass (the header and
                // source passes share one `VisitedSet`, see `generate`)
                // contributes nothing here, which is how the guarded
                // `#include "<project>.h"` prefix avoids a duplicated body.
                let relative = cur_dir.join(&include.target);
                let resolved = if relative.is_file() {
                    Some(relative)
                } else {
                    let via_include_path = include_path.join(&include.target);
                    via_include_path.is_file().then_some(via_include_path)
                };
                match resolved {
                    Some(path) => amalgamate_into(out, include_path, is_include, &path, visited)?,
                    None => {
                        writeln!(out, "{line}").map_err(|e| Error::fs(file, std::io::Error::other(e)))?
                    }
                }
            }
            IncludeStyle::Angle => {
                // Angle includes are only ever looked up in the shared
                // include path (never relative) — resolved in both passes,
                // so headers an internal angle-include pulls in get inlined
                // even if the project's main header didn't pull them in
                // itself.
                let via_include_path = include_path.join(&include.target);
                if via_include_path.is_file() {
                    amalgamate_into(out, include_path, is_include, &via_include_path, visited)?;
                } else {
                    writeln!(out, "{line}").map_err(|e| Error::fs(file, std::io::Error::other(e)))?;
                }
            }
        }
    }
    Ok(())
}

/// Emit a project's single combined header, writing `<project_path>/
/// <id_short>.h`, driven from `<project_path>/include/<id_short>.h`.
/// Prefixes the output with `#define <ID>_STATIC`. `visited` is shared with
/// [`generate_source`] within one [`generate`] call, so a header inlined
/// here is not re-inlined while amalgamating sources.
#[instrument(skip_all, fields(project = %project_path.display()))]
pub fn generate_header(
    project_path: &Path,
    id_underscore: &str,
    visited: &mut VisitedSet,
) -> Result<PathBuf> {
    let include_path = project_path.join("include");
    let entry = include_path.join(format!("{id_underscore}.h"));
    if !entry.is_file() {
        return Err(Error::rule_execution(
            id_underscore,
            "amalgamate",
            format!("cannot find include file `{}`", entry.display()),
        ));
    }

    let out_path = project_path.join(format!("{id_underscore}.h"));
    let mut out = File::create(&out_path).map_err(|e| Error::fs(&out_path, e))?;
    writeln!(out, "#define {}_STATIC", id_underscore.to_ascii_uppercase())
        .map_err(|e| Error::fs(&out_path, e))?;

    amalgamate_into(&mut out, &include_path, true, &entry, visited)?;
    Ok(out_path)
}

/// Emit a project's single combined source file, writing
/// `<project_path>/<id_short>.c` from `sources` in sorted order, prefixed by
/// a guarded `#include "<id>.h"`. Shares `visited` with [`generate_header`].
#[instrument(skip_all, fields(project = %project_path.display()))]
pub fn generate_source(
    project_path: &Path,
    id_underscore: &str,
    sources: &[PathBuf],
    visited: &mut VisitedSet,
) -> Result<PathBuf> {
    let include_path = project_path.join("include");
    let out_path = project_path.join(format!("{id_underscore}.c"));
    let mut out = File::create(&out_path).map_err(|e| Error::fs(&out_path, e))?;

    let upper = id_underscore.to_ascii_uppercase();
    writeln!(out, "#ifndef {upper}_IMPL").map_err(|e| Error::fs(&out_path, e))?;
    writeln!(out, "#include \"{id_underscore}.h\"").map_err(|e| Error::fs(&out_path, e))?;
    writeln!(out, "#endif").map_err(|e| Error::fs(&out_path, e))?;

    let mut sorted: Vec<&PathBuf> = sources.iter().collect();
    sorted.sort();
    for source in sorted {
        amalgamate_into(&mut out, &include_path, false, source, visited)?;
    }
    Ok(out_path)
}

/// Amalgamate a non-recursive project: the combined header followed by the
/// combined source, sharing one [`VisitedSet`] across both so a header
/// pulled into the amalgamated header isn't duplicated into the amalgamated
/// source. Mirrors `drivers/amalgamate/src/main.c`'s `generate()`, which
/// skips recursive (umbrella) projects entirely.
pub fn generate(
    project_path: &Path,
    id_underscore: &str,
    sources: &[PathBuf],
) -> Result<(PathBuf, PathBuf)> {
    let mut visited = VisitedSet::new();
    let header = generate_header(project_path, id_underscore, &mut visited)?;
    let source = generate_source(project_path, id_underscore, sources, &mut visited)?;
    Ok((header, source))
}
