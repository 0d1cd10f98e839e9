//! Resolve glob patterns against a root directory into matched relative paths.

use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};
use indexmap::IndexSet;

use crate::error::UtilError;
use crate::pattern::{expand_braces, flatten, GlobPattern};

/// Wildcards never cross `/` and never match a leading `.` in a component.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// A single compiled pattern, ready to match paths relative to the root.
struct CompiledPattern {
    /// Literal leading directories; walking starts here instead of at the root.
    base: PathBuf,
    /// Set when the whole pattern is literal and names exactly one path.
    literal: Option<PathBuf>,
    pattern: Pattern,
}

impl CompiledPattern {
    fn compile(raw: &str) -> Result<Self, UtilError> {
        let normalized = normalize(raw);
        let pattern = Pattern::new(&normalized).map_err(|e| UtilError::GlobPattern {
            pattern: raw.to_owned(),
            message: e.to_string(),
        })?;

        let components: Vec<&str> = normalized.split('/').collect();
        let literal_len = components
            .iter()
            .take_while(|c| !c.contains(['*', '?', '[']))
            .count();

        let (base, literal) = if literal_len == components.len() {
            (PathBuf::new(), Some(PathBuf::from(&normalized)))
        } else {
            let base: PathBuf = components.iter().take(literal_len).collect();
            (base, None)
        };

        Ok(Self {
            base,
            literal,
            pattern,
        })
    }

    fn matches(&self, relative: &Path) -> bool {
        self.pattern.matches_path_with(relative, MATCH_OPTIONS)
    }

    /// Collect every file under `root` this pattern matches, in sorted walk order.
    fn matched_files(&self, root: &Path) -> Result<Vec<PathBuf>, UtilError> {
        if let Some(literal) = &self.literal {
            if stays_inside(literal) && root.join(literal).is_file() {
                return Ok(vec![literal.clone()]);
            }
            return Ok(Vec::new());
        }

        if !stays_inside(&self.base) {
            return Ok(Vec::new());
        }

        let files = crate::fs::walk_files(&root.join(&self.base), root)?;
        Ok(files.into_iter().filter(|f| self.matches(f)).collect())
    }
}

/// Rewrite a pattern into the dialect `glob::Pattern` accepts.
///
/// A `**` that is not a whole path component acts as `*`, and a class opened
/// with `[^` is negated like `[!`.
fn normalize(raw: &str) -> String {
    raw.split('/')
        .map(normalize_component)
        .collect::<Vec<_>>()
        .join("/")
}

fn normalize_component(component: &str) -> String {
    if component == "**" {
        return component.to_owned();
    }

    let mut out = String::with_capacity(component.len());
    let mut chars = component.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                out.push('*');
                while chars.next_if_eq(&'*').is_some() {}
            }
            '[' => {
                out.push('[');
                if chars.next_if_eq(&'^').is_some() {
                    out.push('!');
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Whether a relative path can only name something under the root.
fn stays_inside(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Compile a flattened pattern list into inclusion and exclusion patterns.
///
/// A leading `!` marks an exclusion, a leading `./` is ignored, and brace
/// alternations expand in place. Empty patterns are skipped.
fn compile_all(
    patterns: &[GlobPattern],
) -> Result<(Vec<CompiledPattern>, Vec<CompiledPattern>), UtilError> {
    let mut include = Vec::new();
    let mut exclude = Vec::new();

    for raw in flatten(patterns) {
        let (negated, body) = match raw.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let body = body.trim_start_matches("./");
        if body.is_empty() {
            continue;
        }

        for expanded in expand_braces(body) {
            let compiled = CompiledPattern::compile(&expanded)?;
            if negated {
                exclude.push(compiled);
            } else {
                include.push(compiled);
            }
        }
    }

    Ok((include, exclude))
}

/// Resolve `patterns` against `root` into an ordered list of relative file paths.
///
/// Nested pattern groups are flattened first. Paths are ordered by the first
/// pattern that matches them, and by sorted walk order within one pattern;
/// each path appears once. Only regular files under `root` are ever returned.
/// No matches, or a `root` that does not exist, yields an empty list.
///
/// # Errors
/// Returns an error if a pattern is not a valid glob, or if a directory under
/// `root` cannot be read.
pub fn resolve_paths(root: &Path, patterns: &[GlobPattern]) -> Result<Vec<PathBuf>, UtilError> {
    let (include, exclude) = compile_all(patterns)?;

    let mut matched: IndexSet<PathBuf> = IndexSet::new();
    for pattern in &include {
        for file in pattern.matched_files(root)? {
            if !exclude.iter().any(|e| e.matches(&file)) {
                matched.insert(file);
            }
        }
    }

    Ok(matched.into_iter().collect())
}
