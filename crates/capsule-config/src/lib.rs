//! Parse and validate `capsule.toml` and the artifact definitions it declares.

pub mod definition;
pub mod manifest;

pub use definition::{ArtifactContext, ArtifactDefinition};
pub use manifest::Manifest;
