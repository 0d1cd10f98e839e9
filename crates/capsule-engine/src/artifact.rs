//! Resolved artifacts and the per-component lists they are collected into.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;

use capsule_config::ArtifactDefinition;

use crate::context::{ComponentId, Task};
use crate::storage::StorageResolver;

/// Matched file paths, relative to the directory they were searched in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactFiles {
    paths: Vec<PathBuf>,
}

impl ArtifactFiles {
    /// Wrap matched paths, keeping their order.
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    /// The matched paths, in match order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.paths.iter()
    }
}

impl<'a> IntoIterator for &'a ArtifactFiles {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

/// Files produced by a task, bound to the storage resolver that persists them.
///
/// Immutable once built. An env-scoped artifact is one value shared by
/// reference across every component's list.
#[derive(Debug)]
pub struct Artifact {
    definition: ArtifactDefinition,
    storage_resolver: Arc<dyn StorageResolver>,
    files: ArtifactFiles,
    root_dir: PathBuf,
    search_dir: PathBuf,
    task: Arc<Task>,
    task_aspect_id: String,
}

impl Artifact {
    /// Bind matched files to their definition, resolver and producing task.
    ///
    /// Files are taken as relative to `root_dir` joined with the definition's
    /// `root_dir`; use [`Self::with_search_dir`] when they were searched
    /// somewhere else.
    pub fn new(
        definition: ArtifactDefinition,
        storage_resolver: Arc<dyn StorageResolver>,
        files: ArtifactFiles,
        root_dir: PathBuf,
        task: Arc<Task>,
        task_aspect_id: impl Into<String>,
    ) -> Self {
        let search_dir = match &definition.root_dir {
            Some(sub) => root_dir.join(sub),
            None => root_dir.clone(),
        };
        Self {
            definition,
            storage_resolver,
            files,
            root_dir,
            search_dir,
            task,
            task_aspect_id: task_aspect_id.into(),
        }
    }

    /// Set the directory the files were matched in.
    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dir = dir.into();
        self
    }

    /// Name of the definition this artifact was resolved from.
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// The definition this artifact was resolved from.
    pub fn definition(&self) -> &ArtifactDefinition {
        &self.definition
    }

    /// The resolver that persists this artifact.
    pub fn storage_resolver(&self) -> &Arc<dyn StorageResolver> {
        &self.storage_resolver
    }

    /// Matched paths, relative to [`Self::search_dir`].
    pub fn files(&self) -> &ArtifactFiles {
        &self.files
    }

    /// The directory the artifact belongs to.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// The directory the files were matched in.
    pub fn search_dir(&self) -> &Path {
        &self.search_dir
    }

    /// The task that produced the files.
    pub fn task(&self) -> &Arc<Task> {
        &self.task
    }

    /// Id of the aspect that registered the producing task.
    pub fn task_aspect_id(&self) -> &str {
        &self.task_aspect_id
    }

    /// The on-disk location of every file.
    pub fn absolute_paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| self.search_dir.join(f)).collect()
    }
}

/// The artifacts a component received, in definition order.
#[derive(Debug, Clone, Default)]
pub struct ArtifactList(Vec<Arc<Artifact>>);

impl ArtifactList {
    /// Wrap artifacts, keeping their order.
    pub fn new(artifacts: Vec<Arc<Artifact>>) -> Self {
        Self(artifacts)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Artifact>> {
        self.0.iter()
    }

    /// The artifacts as a slice, in definition order.
    pub fn as_slice(&self) -> &[Arc<Artifact>] {
        &self.0
    }

    /// The first artifact whose definition is named `name`.
    pub fn by_name(&self, name: &str) -> Option<&Arc<Artifact>> {
        self.0.iter().find(|a| a.name() == name)
    }

    /// Storage resolver name of each artifact, in list order.
    pub fn storage_resolver_names(&self) -> Vec<&str> {
        self.0.iter().map(|a| a.storage_resolver().name()).collect()
    }
}

impl<'a> IntoIterator for &'a ArtifactList {
    type Item = &'a Arc<Artifact>;
    type IntoIter = std::slice::Iter<'a, Arc<Artifact>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Artifact lists keyed by component, one entry per component in the build
/// context, in context order.
#[derive(Debug, Clone, Default)]
pub struct ArtifactMap {
    entries: IndexMap<ComponentId, ArtifactList>,
}

impl ArtifactMap {
    pub(crate) fn from_entries(entries: IndexMap<ComponentId, ArtifactList>) -> Self {
        Self { entries }
    }

    /// The artifact list of `component`, if it is in the build context.
    pub fn get(&self, component: &ComponentId) -> Option<&ArtifactList> {
        self.entries.get(component)
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, ComponentId, ArtifactList> {
        self.entries.iter()
    }

    /// Component ids in context order.
    pub fn component_ids(&self) -> impl Iterator<Item = &ComponentId> {
        self.entries.keys()
    }

    /// Number of components in the map.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total list entries across components; a shared artifact counts once
    /// per component holding it.
    pub fn total_artifacts(&self) -> usize {
        self.entries.values().map(ArtifactList::len).sum()
    }
}

impl<'a> IntoIterator for &'a ArtifactMap {
    type Item = (&'a ComponentId, &'a ArtifactList);
    type IntoIter = indexmap::map::Iter<'a, ComponentId, ArtifactList>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
