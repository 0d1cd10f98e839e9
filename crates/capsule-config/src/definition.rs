use std::fmt;
use std::path::{Component, PathBuf};

use serde::{Deserialize, Serialize};

use capsule_util::pattern::flatten;
use capsule_util::GlobPattern;

use crate::manifest::ManifestError;

/// Where an artifact definition's files are searched for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactContext {
    /// Each component's own capsule directory.
    #[default]
    Component,
    /// The capsules root shared by every component in the build.
    Env,
}

impl fmt::Display for ArtifactContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Component => f.write_str("component"),
            Self::Env => f.write_str("env"),
        }
    }
}

/// Declares which files a task produces and how they are stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactDefinition {
    /// Artifact name (e.g. `"dist"`).
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Glob patterns, possibly grouped, matched against the search root.
    pub glob_patterns: Vec<GlobPattern>,
    /// Subdirectory of the context root to search in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_dir: Option<PathBuf>,
    #[serde(default)]
    pub context: ArtifactContext,
    /// Name of the storage resolver to persist with; unknown names fall back
    /// to the default resolver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_resolver: Option<String>,
}

impl ArtifactDefinition {
    /// Create a component-scoped definition with no root dir and the default resolver.
    pub fn new(name: impl Into<String>, glob_patterns: Vec<GlobPattern>) -> Self {
        Self {
            name: name.into(),
            description: None,
            glob_patterns,
            root_dir: None,
            context: ArtifactContext::default(),
            storage_resolver: None,
        }
    }

    /// Attach a human-readable description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Search under `root_dir` inside the context root.
    pub fn with_root_dir(mut self, root_dir: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(root_dir.into());
        self
    }

    /// Resolve per component or once for the whole environment.
    pub fn with_context(mut self, context: ArtifactContext) -> Self {
        self.context = context;
        self
    }

    /// Name the storage resolver that persists the artifact.
    pub fn with_storage_resolver(mut self, name: impl Into<String>) -> Self {
        self.storage_resolver = Some(name.into());
        self
    }

    /// The flattened glob patterns, in written order.
    pub fn flat_patterns(&self) -> Vec<&str> {
        flatten(&self.glob_patterns)
    }

    /// Check the definition is usable.
    ///
    /// # Errors
    /// Returns `ManifestError::InvalidDefinition` if the name is empty, no
    /// glob patterns remain after flattening, or `root_dir` is absolute or
    /// climbs out of the context root with `..`.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.name.trim().is_empty() {
            return Err(self.invalid("artifact name must not be empty"));
        }

        if self.flat_patterns().iter().all(|p| p.trim().is_empty()) {
            return Err(self.invalid("at least one glob pattern is required"));
        }

        if let Some(root_dir) = &self.root_dir {
            let contained = root_dir
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
            if !contained {
                return Err(self.invalid(&format!(
                    "root_dir `{}` must be a relative path inside the capsule",
                    root_dir.display()
                )));
            }
        }

        Ok(())
    }

    fn invalid(&self, reason: &str) -> ManifestError {
        ManifestError::InvalidDefinition {
            name: self.name.clone(),
            reason: reason.to_owned(),
        }
    }
}
