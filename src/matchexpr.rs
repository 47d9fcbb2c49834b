//! Path/glob match expression engine.
//!
//! Compiles expressions like `src/**/*.c` or `src/*.c&^src/test_*` into a
//! [`MatchProgram`] and evaluates them against path component sequences.
//! Grammar (EBNF, precedence loosest to tightest):
//!
//! ```text
//! expr    := term (SEP term)*
//! term    := or
//! or      := and ('|' and)*
//! and     := not ('&' not)*
//! not     := '^' not | scope
//! scope   := path (('/' | '//') path)*
//! path    := ident | filter | '.' | '..'
//! ident   := [A-Za-z_][A-Za-z0-9_.]*
//! filter  := ident with '*' or '?' wildcards permitted
//! SEP     := ','
//! ```

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Ident(String),
    Filter(String),
    This,
    Parent,
    Slash,
    Tree,
    And,
    Or,
    Not,
    Sep,
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Tok::Ident(s) | Tok::Filter(s) => s.clone(),
            Tok::This => ".".into(),
            Tok::Parent => "..".into(),
            Tok::Slash => "/".into(),
            Tok::Tree => "//".into(),
            Tok::And => "&".into(),
            Tok::Or => "|".into(),
            Tok::Not => "^".into(),
            Tok::Sep => ",".into(),
        }
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '*' || c == '?' || c == '.'
}

fn lex(src: &str) -> Result<Vec<Tok>> {
    let lowered = src.to_ascii_lowercase();
    let chars: Vec<char> = lowered.chars().collect();
    let mut toks = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '/' => {
                if i + 1 < chars.len() && chars[i + 1] == '/' {
                    toks.push(Tok::Tree);
                    i += 2;
                } else {
                    toks.push(Tok::Slash);
                    i += 1;
                }
            }
            '&' => {
                toks.push(Tok::And);
                i += 1;
            }
            '|' => {
                toks.push(Tok::Or);
                i += 1;
            }
            '^' => {
                toks.push(Tok::Not);
                i += 1;
            }
            ',' => {
                toks.push(Tok::Sep);
                i += 1;
            }
            _ if is_token_char(c) => {
                let start = i;
                while i < chars.len() && is_token_char(chars[i]) {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                toks.push(match text.as_str() {
                    "." => Tok::This,
                    ".." => Tok::Parent,
                    _ if text.contains('*') || text.contains('?') => Tok::Filter(text),
                    _ => Tok::Ident(text),
                });
            }
            other => {
                return Err(Error::matching(src, format!("unexpected character `{other}`")));
            }
        }
    }
    Ok(toks)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSeg {
    Ident(String),
    Filter(String),
    This,
    Parent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SepKind {
    None,
    Slash,
    Tree,
}

#[derive(Debug, Clone)]
struct Scope {
    segments: Vec<(SepKind, PathSeg)>,
}

#[derive(Debug, Clone)]
enum NotNode {
    Plain(Scope),
    Neg(Box<NotNode>),
}

#[derive(Debug, Clone)]
struct And(Vec<NotNode>);

#[derive(Debug, Clone)]
struct Or(Vec<And>);

#[derive(Debug, Clone)]
struct Expr(Vec<Or>);

struct Parser<'a> {
    toks: &'a [Tok],
    pos: usize,
    src: &'a str,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn err_unexpected(&self, cur: &Tok) -> Error {
        let prev = if self.pos == 0 { "start of expression".to_string() } else { self.toks[self.pos - 1].describe() };
        Error::matching(self.src, format!("unexpected `{}` after `{}`", cur.describe(), prev))
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        let mut ors = vec![self.parse_or()?];
        while matches!(self.peek(), Some(Tok::Sep)) {
            self.pos += 1;
            ors.push(self.parse_or()?);
        }
        Ok(Expr(ors))
    }

    fn parse_or(&mut self) -> Result<Or> {
        let mut ands = vec![self.parse_and()?];
        while matches!(self.peek(), Some(Tok::Or)) {
            self.pos += 1;
            ands.push(self.parse_and()?);
        }
        Ok(Or(ands))
    }

    fn parse_and(&mut self) -> Result<And> {
        let mut nots = vec![self.parse_not()?];
        while matches!(self.peek(), Some(Tok::And)) {
            self.pos += 1;
            nots.push(self.parse_not()?);
        }
        Ok(And(nots))
    }

    fn parse_not(&mut self) -> Result<NotNode> {
        if matches!(self.peek(), Some(Tok::Not)) {
            self.pos += 1;
            return Ok(NotNode::Neg(Box::new(self.parse_not()?)));
        }
        Ok(NotNode::Plain(self.parse_scope()?))
    }

    fn is_path_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(Tok::Ident(_)) | Some(Tok::Filter(_)) | Some(Tok::This) | Some(Tok::Parent)
        )
    }

    fn parse_scope(&mut self) -> Result<Scope> {
        let mut segments = Vec::new();
        let leading = match self.peek() {
            Some(Tok::Slash) => {
                self.pos += 1;
                SepKind::Slash
            }
            Some(Tok::Tree) => {
                self.pos += 1;
                SepKind::Tree
            }
            _ => SepKind::None,
        };
        if !self.is_path_start() {
            if leading == SepKind::None {
                // nothing consumed yet and no path token here: surface a normal parse error
                return Err(match self.peek().cloned() {
                    Some(tok) => self.err_unexpected(&tok),
                    None => Error::matching(self.src, "unexpected end of expression"),
                });
            }
            // a trailing `/` or `//` with nothing after it implicitly appends `*`
            segments.push((leading, PathSeg::Filter("*".into())));
            return Ok(Scope { segments });
        }
        segments.push((leading, self.parse_path()?));

        loop {
            let sep = match self.peek() {
                Some(Tok::Slash) => SepKind::Slash,
                Some(Tok::Tree) => SepKind::Tree,
                _ => break,
            };
            self.pos += 1;
            if !self.is_path_start() {
                segments.push((sep, PathSeg::Filter("*".into())));
                break;
            }
            segments.push((sep, self.parse_path()?));
        }
        Ok(Scope { segments })
    }

    fn parse_path(&mut self) -> Result<PathSeg> {
        match self.peek().cloned() {
            Some(Tok::Ident(s)) => {
                self.pos += 1;
                Ok(PathSeg::Ident(s))
            }
            Some(Tok::Filter(s)) => {
                self.pos += 1;
                Ok(PathSeg::Filter(s))
            }
            Some(Tok::This) => {
                self.pos += 1;
                Ok(PathSeg::This)
            }
            Some(Tok::Parent) => {
                self.pos += 1;
                Ok(PathSeg::Parent)
            }
            Some(other) => Err(self.err_unexpected(&other)),
            None => Err(Error::matching(self.src, "unexpected end of expression")),
        }
    }
}

/// The optimized classification cached alongside a compiled program, used to
/// fast-path the overwhelmingly common cases without walking the AST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    Generic,
    ExactId(String),
    This,
    SingleLevelWildcard,
    TreeWildcard,
}

/// A compiled match expression.
#[derive(Debug, Clone)]
pub struct MatchProgram {
    source: String,
    expr: Expr,
    kind: Kind,
}

impl MatchProgram {
    /// Compile `expr` into a [`MatchProgram`], or fail with a message of the
    /// form "unexpected `<tok>` after `<tok>`".
    pub fn compile(expr: &str) -> Result<Self> {
        let toks = lex(expr)?;
        let mut parser = Parser { toks: &toks, pos: 0, src: expr };
        let ast = parser.parse_expr()?;
        if parser.pos != toks.len() {
            let cur = toks[parser.pos].clone();
            return Err(parser.err_unexpected(&cur));
        }
        let kind = classify(&ast);
        Ok(Self { source: expr.to_string(), expr: ast, kind })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    /// `true` if the expression contains no wildcards and no operators —
    /// i.e. it denotes exactly one literal path, usable as a single-file
    /// existence test by the filesystem iterator.
    pub fn is_literal(&self) -> bool {
        matches!(self.kind, Kind::ExactId(_) | Kind::This)
    }

    /// Evaluate the compiled expression against a `/`-separated path.
    pub fn is_match(&self, path: &str) -> bool {
        let comps = components_of(path);
        match &self.kind {
            Kind::ExactId(id) => comps.len() == 1 && comps[0].eq_ignore_ascii_case(id),
            Kind::This => comps.is_empty(),
            Kind::SingleLevelWildcard => comps.len() == 1 && comps[0] != ".",
            Kind::TreeWildcard => !comps.is_empty(),
            Kind::Generic => eval_expr(&self.expr, &comps),
        }
    }
}

fn classify(expr: &Expr) -> Kind {
    if expr.0.len() != 1 || expr.0[0].0.len() != 1 || expr.0[0].0[0].0.len() != 1 {
        return Kind::Generic;
    }
    let NotNode::Plain(scope) = &expr.0[0].0[0].0[0] else { return Kind::Generic };
    if scope.segments.len() != 1 {
        return Kind::Generic;
    }
    let (sep, seg) = &scope.segments[0];
    match (sep, seg) {
        (SepKind::None, PathSeg::Ident(id)) => Kind::ExactId(id.clone()),
        (SepKind::None, PathSeg::This) => Kind::This,
        (SepKind::None, PathSeg::Filter(f)) if f == "*" => Kind::SingleLevelWildcard,
        (SepKind::Tree, PathSeg::Filter(f)) if f == "*" => Kind::TreeWildcard,
        _ => Kind::Generic,
    }
}

/// Split a `/`-separated path into its components. `.` and `..` are kept as
/// literal components (matching against them is purely syntactic); the
/// empty path and the literal path `"."` both yield zero components,
/// representing "the project root".
fn components_of(path: &str) -> Vec<&str> {
    if path.is_empty() || path == "." {
        return Vec::new();
    }
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn eval_expr(expr: &Expr, comps: &[&str]) -> bool {
    expr.0.iter().any(|or| eval_or(or, comps))
}

fn eval_or(or: &Or, comps: &[&str]) -> bool {
    or.0.iter().any(|and| eval_and(and, comps))
}

fn eval_and(and: &And, comps: &[&str]) -> bool {
    and.0.iter().all(|not| eval_not(not, comps))
}

fn eval_not(not: &NotNode, comps: &[&str]) -> bool {
    match not {
        NotNode::Plain(scope) => eval_scope(scope, comps),
        NotNode::Neg(inner) => !eval_not(inner, comps),
    }
}

fn eval_scope(scope: &Scope, comps: &[&str]) -> bool {
    if scope.segments.is_empty() {
        return comps.is_empty();
    }
    step(&scope.segments, comps, 0)
}

fn step(segments: &[(SepKind, PathSeg)], comps: &[&str], cursor: usize) -> bool {
    let (sep, seg) = &segments[0];
    let rest = &segments[1..];
    match sep {
        SepKind::None | SepKind::Slash => {
            let pos = match sep {
                SepKind::Slash => cursor + 1,
                _ => cursor,
            };
            try_test(seg, comps, pos, rest)
        }
        SepKind::Tree => {
            for pos in cursor..comps.len() {
                if try_test(seg, comps, pos, rest) {
                    return true;
                }
            }
            false
        }
    }
}

fn try_test(seg: &PathSeg, comps: &[&str], pos: usize, rest: &[(SepKind, PathSeg)]) -> bool {
    if pos >= comps.len() || !seg_matches(seg, comps[pos]) {
        return false;
    }
    if rest.is_empty() {
        pos == comps.len() - 1
    } else {
        step(rest, comps, pos)
    }
}

fn seg_matches(seg: &PathSeg, comp: &str) -> bool {
    match seg {
        PathSeg::This => comp == ".",
        PathSeg::Parent => comp == "..",
        PathSeg::Ident(id) => comp != "." && comp.eq_ignore_ascii_case(id),
        PathSeg::Filter(f) => comp != "." && glob_match(f, &comp.to_ascii_lowercase()),
    }
}

/// Minimal `*`/`?` glob matcher; `pattern` is already lowercased.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let (mut star_p, mut star_t) = (None, 0);
    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star_p = Some(pi);
            star_t = ti;
            pi += 1;
        } else if let Some(sp) = star_p {
            pi = sp + 1;
            star_t += 1;
            ti = star_t;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}
