//! Named storage strategies for resolved artifacts.

use std::fmt;
use std::sync::Arc;

/// Name advertised by [`DefaultResolver`].
pub const DEFAULT_RESOLVER_NAME: &str = "default";

/// A named strategy for persisting an artifact's files.
///
/// Concrete backends live outside this crate; the engine only selects one
/// per artifact by name.
pub trait StorageResolver: fmt::Debug + Send + Sync {
    /// Stable name artifact definitions refer to this resolver by.
    fn name(&self) -> &str;
}

/// The built-in resolver used when a definition names none, or names one
/// that is not registered.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResolver;

impl StorageResolver for DefaultResolver {
    fn name(&self) -> &str {
        DEFAULT_RESOLVER_NAME
    }
}

/// Registry of storage resolvers, filled during initialization and read-only
/// once handed to an [`crate::ArtifactFactory`].
#[derive(Debug, Clone)]
pub struct StorageResolverRegistry {
    resolvers: Vec<Arc<dyn StorageResolver>>,
    default: Arc<dyn StorageResolver>,
}

impl Default for StorageResolverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageResolverRegistry {
    /// Create a registry holding only the default resolver.
    pub fn new() -> Self {
        Self {
            resolvers: Vec::new(),
            default: Arc::new(DefaultResolver),
        }
    }

    /// Register a resolver. A resolver already registered under the same
    /// name is replaced.
    pub fn register(&mut self, resolver: Arc<dyn StorageResolver>) {
        self.resolvers.retain(|r| r.name() != resolver.name());
        self.resolvers.push(resolver);
    }

    /// Builder form of [`Self::register`].
    pub fn with_resolver(mut self, resolver: Arc<dyn StorageResolver>) -> Self {
        self.register(resolver);
        self
    }

    /// Select the resolver registered under `name`, or the default resolver.
    ///
    /// A name with no registered resolver is not an error; the default is
    /// used so definitions keep working when a backend is unavailable.
    pub fn resolver_for(&self, name: Option<&str>) -> Arc<dyn StorageResolver> {
        let Some(name) = name else {
            return Arc::clone(&self.default);
        };

        if let Some(resolver) = self.resolvers.iter().find(|r| r.name() == name) {
            return Arc::clone(resolver);
        }

        if name != DEFAULT_RESOLVER_NAME {
            tracing::debug!(
                requested = name,
                fallback = DEFAULT_RESOLVER_NAME,
                "storage resolver not registered, using default"
            );
        }
        Arc::clone(&self.default)
    }

    /// The shared fallback resolver.
    pub fn default_resolver(&self) -> &Arc<dyn StorageResolver> {
        &self.default
    }

    /// Names of the registered resolvers, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }
}
