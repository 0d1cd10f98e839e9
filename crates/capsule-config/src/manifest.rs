use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::definition::ArtifactDefinition;

/// The `capsule.toml` manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub capsules: CapsuleLayout,
    #[serde(default, rename = "artifact")]
    pub artifacts: Vec<ArtifactDefinition>,
}

/// Where each component's capsule lives, and the shared capsules root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapsuleLayout {
    #[serde(default = "default_capsules_root")]
    pub root: PathBuf,
    /// Components in build order.
    #[serde(default, rename = "component")]
    pub components: Vec<ComponentCapsule>,
}

impl Default for CapsuleLayout {
    fn default() -> Self {
        Self {
            root: default_capsules_root(),
            components: Vec::new(),
        }
    }
}

fn default_capsules_root() -> PathBuf {
    PathBuf::from("capsules")
}

/// A component and its capsule directory.
///
/// A component listed without a `path` has no capsule; resolving a
/// component-scoped artifact for it fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentCapsule {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl CapsuleLayout {
    /// Return a copy with relative paths joined onto `base`.
    pub fn resolved_against(&self, base: &Path) -> Self {
        Self {
            root: base.join(&self.root),
            components: self
                .components
                .iter()
                .map(|c| ComponentCapsule {
                    id: c.id.clone(),
                    path: c.path.as_ref().map(|p| base.join(p)),
                })
                .collect(),
        }
    }
}

impl Manifest {
    /// Read, parse, and validate a `capsule.toml` from the given path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, contains invalid TOML,
    /// or declares an invalid or duplicate artifact definition.
    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|e| ManifestError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let manifest: Manifest = toml::from_str(&content).map_err(|e| ManifestError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate every artifact definition and check names are unique.
    ///
    /// # Errors
    /// Returns the first invalid or duplicate definition found.
    pub fn validate(&self) -> Result<(), ManifestError> {
        let mut seen = HashSet::new();
        for def in &self.artifacts {
            def.validate()?;
            if !seen.insert(def.name.as_str()) {
                return Err(ManifestError::DuplicateArtifact {
                    name: def.name.clone(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid capsule.toml at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid artifact definition `{name}`: {reason}")]
    InvalidDefinition { name: String, reason: String },
    #[error("artifact `{name}` is defined more than once")]
    DuplicateArtifact { name: String },
}
