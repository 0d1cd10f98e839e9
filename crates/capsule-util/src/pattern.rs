//! Glob pattern declarations: nesting, flattening, and brace expansion.

use serde::{Deserialize, Serialize};

/// A glob pattern as written in an artifact definition.
///
/// Patterns may be grouped for readability; groups nest arbitrarily and are
/// flattened in written order before matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GlobPattern {
    /// A single glob expression (e.g. `"dist/**"` or `"!**/*.map"`).
    Single(String),
    /// An ordered group of patterns.
    Group(Vec<GlobPattern>),
}

impl From<&str> for GlobPattern {
    fn from(pattern: &str) -> Self {
        Self::Single(pattern.to_owned())
    }
}

impl From<String> for GlobPattern {
    fn from(pattern: String) -> Self {
        Self::Single(pattern)
    }
}

impl<T: Into<GlobPattern>> From<Vec<T>> for GlobPattern {
    fn from(group: Vec<T>) -> Self {
        Self::Group(group.into_iter().map(Into::into).collect())
    }
}

/// Flatten nested pattern groups into one ordered sequence.
pub fn flatten(patterns: &[GlobPattern]) -> Vec<&str> {
    let mut out = Vec::new();
    flatten_into(patterns, &mut out);
    out
}

fn flatten_into<'a>(patterns: &'a [GlobPattern], out: &mut Vec<&'a str>) {
    for pattern in patterns {
        match pattern {
            GlobPattern::Single(p) => out.push(p),
            GlobPattern::Group(group) => flatten_into(group, out),
        }
    }
}

/// Expand brace alternations (`{a,b}`) into separate patterns.
///
/// Braces nest and expand left to right, keeping the written order:
/// `"{a,b}/{x,y}"` yields `a/x`, `a/y`, `b/x`, `b/y`. A brace group without a
/// top-level comma, or without a closing brace, is kept literally.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(group) = find_brace_group(pattern) else {
        return vec![pattern.to_owned()];
    };

    let prefix = pattern.get(..group.open).unwrap_or_default();
    let suffix = pattern.get(group.close + 1..).unwrap_or_default();

    let mut expanded = Vec::new();
    for alternative in group.alternatives {
        expanded.extend(expand_braces(&format!("{prefix}{alternative}{suffix}")));
    }
    expanded
}

struct BraceGroup<'a> {
    open: usize,
    close: usize,
    alternatives: Vec<&'a str>,
}

/// Find the first brace group that has a matching `}` and at least one
/// top-level comma.
fn find_brace_group(pattern: &str) -> Option<BraceGroup<'_>> {
    let bytes = pattern.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = pattern.get(search_from..)?.find('{') {
        let open = search_from + offset;
        let mut depth = 0usize;
        let mut commas = Vec::new();
        let mut close = None;

        for (i, &b) in bytes.iter().enumerate().skip(open) {
            match b {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(i);
                        break;
                    }
                }
                b',' if depth == 1 => commas.push(i),
                _ => {}
            }
        }

        // An unterminated brace means nothing after it can close either.
        let close = close?;

        if commas.is_empty() {
            search_from = open + 1;
            continue;
        }

        let mut alternatives = Vec::with_capacity(commas.len() + 1);
        let mut start = open + 1;
        for comma in commas.into_iter().chain(std::iter::once(close)) {
            alternatives.push(pattern.get(start..comma)?);
            start = comma + 1;
        }

        return Some(BraceGroup {
            open,
            close,
            alternatives,
        });
    }

    None
}
