//! Error types for capsule-engine.

use crate::context::ComponentId;

/// Errors produced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A component-scoped artifact was resolved for a component with no capsule.
    #[error("no capsule found for component {component}")]
    CapsuleNotFound { component: ComponentId },

    /// Glob resolution for an artifact definition failed.
    #[error("cannot resolve artifact `{artifact}`: {source}")]
    Resolve {
        artifact: String,
        source: capsule_util::error::UtilError,
    },
}
