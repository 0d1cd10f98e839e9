//! Artifact resolution for built components: contexts, storage resolvers,
//! and the factory that turns artifact definitions into per-component lists.

pub mod artifact;
pub mod context;
pub mod error;
pub mod factory;
pub mod storage;

pub use artifact::{Artifact, ArtifactFiles, ArtifactList, ArtifactMap};
pub use context::{
    BuildContext, Capsule, CapsuleGraph, Component, ComponentId, StaticCapsuleGraph, Task,
};
pub use error::EngineError;
pub use factory::ArtifactFactory;
pub use storage::{DefaultResolver, StorageResolver, StorageResolverRegistry};
