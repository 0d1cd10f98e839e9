//! The build context an artifact resolution runs against.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;

use capsule_config::manifest::CapsuleLayout;

/// Identity of a component under build (e.g. `"ui/button"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(String);

impl ComponentId {
    /// Wrap a component id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A component under build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub id: ComponentId,
}

impl Component {
    /// A component identified by `id`.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: ComponentId::new(id),
        }
    }
}

/// An isolated build directory for a single component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capsule {
    pub component_id: ComponentId,
    pub path: PathBuf,
}

/// Source of capsule locations for a build.
pub trait CapsuleGraph: fmt::Debug + Send + Sync {
    /// The capsule built for `id`, if any.
    fn capsule(&self, id: &ComponentId) -> Option<&Capsule>;

    /// The directory shared by every capsule in the build.
    fn capsules_root_dir(&self) -> &Path;
}

/// An in-memory capsule graph with a fixed set of capsules.
#[derive(Debug, Clone)]
pub struct StaticCapsuleGraph {
    root: PathBuf,
    capsules: IndexMap<ComponentId, Capsule>,
}

impl StaticCapsuleGraph {
    /// An empty graph whose capsules share `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            capsules: IndexMap::new(),
        }
    }

    /// Add (or replace) the capsule for `id`.
    pub fn with_capsule(mut self, id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.insert(ComponentId::new(id), path.into());
        self
    }

    /// Add (or replace) the capsule for `id` in place.
    pub fn insert(&mut self, id: ComponentId, path: PathBuf) {
        self.capsules.insert(
            id.clone(),
            Capsule {
                component_id: id,
                path,
            },
        );
    }
}

impl CapsuleGraph for StaticCapsuleGraph {
    fn capsule(&self, id: &ComponentId) -> Option<&Capsule> {
        self.capsules.get(id)
    }

    fn capsules_root_dir(&self) -> &Path {
        &self.root
    }
}

/// The task whose outputs are being collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub name: String,
    pub description: Option<String>,
}

impl Task {
    /// A task named `name`, with no description.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }
}

/// The components under build and the capsule graph they were built in.
#[derive(Debug, Clone)]
pub struct BuildContext {
    components: Vec<Component>,
    capsule_graph: Arc<dyn CapsuleGraph>,
}

impl BuildContext {
    /// Create a context. Components repeating an earlier id are dropped,
    /// so every id appears once, at its first position.
    pub fn new(
        components: impl IntoIterator<Item = Component>,
        capsule_graph: Arc<dyn CapsuleGraph>,
    ) -> Self {
        let mut seen = HashSet::new();
        let components = components
            .into_iter()
            .filter(|c| seen.insert(c.id.clone()))
            .collect();
        Self {
            components,
            capsule_graph,
        }
    }

    /// Build a context from a manifest's capsule layout, in listed order.
    /// Components listed without a path get no capsule.
    pub fn from_layout(layout: &CapsuleLayout) -> Self {
        let mut graph = StaticCapsuleGraph::new(&layout.root);
        for entry in &layout.components {
            if let Some(path) = &entry.path {
                graph.insert(ComponentId::new(entry.id.as_str()), path.clone());
            }
        }
        let components = layout.components.iter().map(|c| Component::new(c.id.as_str()));
        Self::new(components, Arc::new(graph))
    }

    /// The components under build, in context order.
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// The graph capsule locations are looked up in.
    pub fn capsule_graph(&self) -> &dyn CapsuleGraph {
        self.capsule_graph.as_ref()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use capsule_config::manifest::ComponentCapsule;

    use super::*;

    #[test]
    fn static_graph_lookup() {
        let graph = StaticCapsuleGraph::new("/tmp/capsules").with_capsule("x", "/tmp/x");
        assert_eq!(graph.capsules_root_dir(), Path::new("/tmp/capsules"));
        let capsule = graph.capsule(&ComponentId::from("x")).unwrap();
        assert_eq!(capsule.path, PathBuf::from("/tmp/x"));
        assert_eq!(capsule.component_id.as_str(), "x");
        assert!(graph.capsule(&ComponentId::from("y")).is_none());
    }

    #[test]
    fn static_graph_replaces_capsule() {
        let graph = StaticCapsuleGraph::new("/r")
            .with_capsule("x", "/old")
            .with_capsule("x", "/new");
        assert_eq!(
            graph.capsule(&ComponentId::from("x")).unwrap().path,
            PathBuf::from("/new")
        );
    }

    #[test]
    fn context_dedups_components_keeping_first() {
        let graph = Arc::new(StaticCapsuleGraph::new("/r"));
        let context = BuildContext::new(
            vec![Component::new("b"), Component::new("a"), Component::new("b")],
            graph,
        );
        let ids: Vec<&str> = context.components().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn context_from_layout() {
        let layout = CapsuleLayout {
            root: PathBuf::from("/work/capsules"),
            components: vec![
                ComponentCapsule {
                    id: "ui/button".to_owned(),
                    path: Some(PathBuf::from("/work/capsules/button")),
                },
                ComponentCapsule {
                    id: "ui/card".to_owned(),
                    path: None,
                },
            ],
        };
        let context = BuildContext::from_layout(&layout);

        let ids: Vec<&str> = context.components().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["ui/button", "ui/card"]);

        let graph = context.capsule_graph();
        assert_eq!(graph.capsules_root_dir(), Path::new("/work/capsules"));
        assert!(graph.capsule(&ComponentId::from("ui/button")).is_some());
        assert!(graph.capsule(&ComponentId::from("ui/card")).is_none());
    }
}
