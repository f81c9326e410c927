//! Path-pattern compiler.
//!
//! Turns the sugared route syntax into an anchored regex:
//!
//! | Syntax | Compiles to | Parameter key |
//! |---|---|---|
//! | `:name` | `([^/]+)` | `:name` |
//! | `(expr)` | `(expr)` | `*0`, `*1`, … |
//! | `(:name expr)` | `(expr)` | `:name` |
//! | `*` | `.*` | not captured |
//!
//! Every other character is matched literally. Parameter groups are emitted
//! as uniquely named slots, so one name may appear more than once; lookups
//! return the first.

use std::fmt::Write;

use regex::Regex;

use crate::error::Error;

/// A compiled pattern plus the parameter key for each capture group.
#[derive(Debug)]
pub(crate) struct Pattern {
    pub(crate) regex: Regex,
    pub(crate) keys: Vec<String>,
}

impl Pattern {
    pub(crate) fn compile(path: &str) -> Result<Self, Error> {
        let mut names = Vec::new();
        let source = format!("^(?:{})$", translate(path, &mut names));
        let regex = Regex::new(&source).map_err(|source| Error::InvalidPattern {
            pattern: path.to_owned(),
            source,
        })?;

        let mut unnamed = 0;
        let keys = regex
            .capture_names()
            .skip(1)
            .map(|group| match (group, group.and_then(slot_index).and_then(|i| names.get(i))) {
                (_, Some(param)) => format!(":{param}"),
                (Some(name), None) => format!(":{name}"),
                (None, None) => {
                    unnamed += 1;
                    format!("*{}", unnamed - 1)
                }
            })
            .collect();

        Ok(Self { regex, keys })
    }

    /// Full-path match. Returns captured `(key, value)` pairs in group order.
    pub(crate) fn captures(&self, path: &str) -> Option<Vec<(String, String)>> {
        let caps = self.regex.captures(path)?;
        let whole = caps.get(0)?;
        if whole.start() != 0 || whole.end() != path.len() {
            return None;
        }
        Some(
            self.keys
                .iter()
                .enumerate()
                .map(|(i, key)| {
                    let value = caps.get(i + 1).map_or("", |m| m.as_str());
                    (key.clone(), value.to_owned())
                })
                .collect(),
        )
    }
}

/// True if `path` uses any pattern syntax and must go through the regex list.
pub(crate) fn is_pattern(path: &str) -> bool {
    path.contains([':', '(', '*'])
}

/// Strips one trailing `/`, leaving the root path alone.
pub(crate) fn trim_trailing_slash(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

// Route parameters compile to uniquely named slots (`__p0`, `__p1`, …) so a
// name may repeat in one pattern; `names[i]` is the parameter behind `__p{i}`.
const SLOT_PREFIX: &str = "__p";

fn slot(out: &mut String, names: &mut Vec<String>, name: &str, body: &str) {
    let _ = write!(out, "(?P<{SLOT_PREFIX}{}>{body}", names.len());
    names.push(name.to_owned());
}

fn slot_index(group: &str) -> Option<usize> {
    group.strip_prefix(SLOT_PREFIX)?.parse().ok()
}

fn translate(path: &str, names: &mut Vec<String>) -> String {
    let chars: Vec<char> = path.chars().collect();
    let mut out = String::with_capacity(path.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            ':' => {
                let name = ident(&chars[i + 1..]);
                if name.is_empty() {
                    out.push_str(&regex::escape(":"));
                    i += 1;
                } else {
                    slot(&mut out, names, &name, "[^/]+)");
                    i += 1 + name.len();
                }
            }
            '(' => {
                let close = matching_paren(&chars, i);
                let inner: String = chars[i + 1..close.unwrap_or(chars.len())].iter().collect();
                group(&mut out, names, &inner, close.is_some());
                i = close.map_or(chars.len(), |c| c + 1);
            }
            '*' => {
                out.push_str(".*");
                i += 1;
            }
            c => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
                i += 1;
            }
        }
    }
    out
}

/// Writes a parenthesised subpattern. An unbalanced group is left open so the
/// regex compiler reports it.
fn group(out: &mut String, names: &mut Vec<String>, inner: &str, closed: bool) {
    let named = inner.strip_prefix(':').map(|rest| {
        let chars: Vec<char> = rest.chars().collect();
        let name = ident(&chars);
        let body = rest[name.len()..].trim_start();
        (name, body)
    });

    match named {
        Some((name, body)) if !name.is_empty() => {
            let body = if body.is_empty() { "[^/]+" } else { body };
            slot(out, names, &name, body);
        }
        _ => {
            out.push('(');
            out.push_str(inner);
        }
    }
    if closed {
        out.push(')');
    }
}

fn ident(chars: &[char]) -> String {
    chars
        .iter()
        .take_while(|c| c.is_ascii_alphanumeric() || **c == '_')
        .collect()
}

fn matching_paren(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}
