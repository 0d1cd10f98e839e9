//! Turn artifact definitions into resolved artifacts for every component in a build.
//!
//! A component-scoped definition is resolved once per component, inside that
//! component's capsule. An env-scoped definition is resolved once, inside the
//! shared capsules root, and the single resulting artifact is handed to every
//! component.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;

use capsule_config::{ArtifactContext, ArtifactDefinition};

use crate::artifact::{Artifact, ArtifactFiles, ArtifactList, ArtifactMap};
use crate::context::{BuildContext, Component, ComponentId, Task};
use crate::error::EngineError;
use crate::storage::{StorageResolver, StorageResolverRegistry};

/// Resolves artifact definitions against a build context.
#[derive(Debug, Clone, Default)]
pub struct ArtifactFactory {
    registry: StorageResolverRegistry,
}

impl ArtifactFactory {
    /// Create a factory over a fully populated resolver registry.
    pub fn new(registry: StorageResolverRegistry) -> Self {
        Self { registry }
    }

    /// The resolver registry definitions are bound against.
    pub fn registry(&self) -> &StorageResolverRegistry {
        &self.registry
    }

    /// Resolve one definition for one component.
    ///
    /// Returns `Ok(None)` when no file matched. The artifact's root is the
    /// component's capsule (or the shared capsules root for env scope); the
    /// definition's `root_dir` only narrows where files are searched. This
    /// holds for both scopes; [`Self::generate`] roots shared artifacts
    /// differently.
    ///
    /// # Errors
    /// Returns `EngineError::CapsuleNotFound` if the definition is
    /// component-scoped and the component has no capsule, or
    /// `EngineError::Resolve` if a glob pattern is invalid or the capsule
    /// cannot be read.
    pub fn create_from_component(
        &self,
        context: &BuildContext,
        component: &Component,
        definition: &ArtifactDefinition,
        task: &Arc<Task>,
        task_aspect_id: &str,
    ) -> Result<Option<Artifact>, EngineError> {
        let storage_resolver = self.storage_resolver(definition);
        let root_dir = context_root(context, component, definition)?;
        let search_dir = search_root(&root_dir, definition);
        let artifact = resolve_artifact(
            definition,
            storage_resolver,
            search_dir,
            root_dir,
            task,
            task_aspect_id,
        )?;

        match &artifact {
            Some(a) => tracing::debug!(
                artifact = %definition.name,
                component = %component.id,
                files = a.files().len(),
                "resolved artifact"
            ),
            None => tracing::trace!(
                artifact = %definition.name,
                component = %component.id,
                "no files matched"
            ),
        }

        Ok(artifact)
    }

    /// Resolve every definition for every component in `context`.
    ///
    /// The result holds one list per component, in context order, with
    /// artifacts in definition order; components nothing matched for get an
    /// empty list. An env-scoped artifact appears in every list as the same
    /// shared value, rooted at the capsules root joined with the definition's
    /// `root_dir`.
    ///
    /// # Errors
    /// Fails on the first error from [`Self::create_from_component`]; no
    /// partial map is returned.
    pub fn generate(
        &self,
        context: &BuildContext,
        definitions: &[ArtifactDefinition],
        task: &Arc<Task>,
        task_aspect_id: &str,
    ) -> Result<ArtifactMap, EngineError> {
        let mut collected: IndexMap<ComponentId, Vec<Arc<Artifact>>> = context
            .components()
            .iter()
            .map(|c| (c.id.clone(), Vec::new()))
            .collect();

        for definition in definitions {
            match definition.context {
                ArtifactContext::Env => {
                    let shared = self.create_shared(context, definition, task, task_aspect_id)?;
                    let Some(artifact) = shared else {
                        continue;
                    };
                    let artifact = Arc::new(artifact);
                    for artifacts in collected.values_mut() {
                        artifacts.push(Arc::clone(&artifact));
                    }
                }
                ArtifactContext::Component => {
                    for component in context.components() {
                        let Some(artifact) = self.create_from_component(
                            context,
                            component,
                            definition,
                            task,
                            task_aspect_id,
                        )?
                        else {
                            continue;
                        };
                        if let Some(artifacts) = collected.get_mut(&component.id) {
                            artifacts.push(Arc::new(artifact));
                        }
                    }
                }
            }
        }

        let entries = collected
            .into_iter()
            .map(|(id, artifacts)| (id, ArtifactList::new(artifacts)))
            .collect();
        Ok(ArtifactMap::from_entries(entries))
    }

    /// Resolve an env-scoped definition once against the shared capsules root.
    ///
    /// Unlike [`Self::create_from_component`], the shared artifact is rooted
    /// at the searched directory, with the definition's `root_dir` applied.
    fn create_shared(
        &self,
        context: &BuildContext,
        definition: &ArtifactDefinition,
        task: &Arc<Task>,
        task_aspect_id: &str,
    ) -> Result<Option<Artifact>, EngineError> {
        let search_dir = search_root(context.capsule_graph().capsules_root_dir(), definition);
        let artifact = resolve_artifact(
            definition,
            self.storage_resolver(definition),
            search_dir.clone(),
            search_dir,
            task,
            task_aspect_id,
        )?;

        if let Some(a) = &artifact {
            tracing::debug!(
                artifact = %definition.name,
                components = context.components().len(),
                files = a.files().len(),
                "resolved shared artifact"
            );
        }

        Ok(artifact)
    }

    fn storage_resolver(&self, definition: &ArtifactDefinition) -> Arc<dyn StorageResolver> {
        self.registry.resolver_for(definition.storage_resolver.as_deref())
    }
}

/// The directory an artifact belongs to: the component's capsule, or the
/// shared capsules root for env scope.
fn context_root(
    context: &BuildContext,
    component: &Component,
    definition: &ArtifactDefinition,
) -> Result<PathBuf, EngineError> {
    let graph = context.capsule_graph();
    match definition.context {
        ArtifactContext::Component => graph
            .capsule(&component.id)
            .map(|capsule| capsule.path.clone())
            .ok_or_else(|| EngineError::CapsuleNotFound {
                component: component.id.clone(),
            }),
        ArtifactContext::Env => Ok(graph.capsules_root_dir().to_path_buf()),
    }
}

/// Search `search_dir` and bind any matches into an artifact rooted at
/// `root_dir`.
fn resolve_artifact(
    definition: &ArtifactDefinition,
    storage_resolver: Arc<dyn StorageResolver>,
    search_dir: PathBuf,
    root_dir: PathBuf,
    task: &Arc<Task>,
    task_aspect_id: &str,
) -> Result<Option<Artifact>, EngineError> {
    let paths = resolve_paths(&search_dir, definition)?;
    if paths.is_empty() {
        return Ok(None);
    }

    let artifact = Artifact::new(
        definition.clone(),
        storage_resolver,
        ArtifactFiles::new(paths),
        root_dir,
        Arc::clone(task),
        task_aspect_id,
    )
    .with_search_dir(search_dir);
    Ok(Some(artifact))
}

fn search_root(root_dir: &Path, definition: &ArtifactDefinition) -> PathBuf {
    match &definition.root_dir {
        Some(sub) => root_dir.join(sub),
        None => root_dir.to_path_buf(),
    }
}

fn resolve_paths(
    root: &Path,
    definition: &ArtifactDefinition,
) -> Result<Vec<PathBuf>, EngineError> {
    capsule_util::resolve_paths(root, &definition.glob_patterns).map_err(|source| {
        EngineError::Resolve {
            artifact: definition.name.clone(),
            source,
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use super::*;
    use crate::context::StaticCapsuleGraph;
    use crate::storage::DEFAULT_RESOLVER_NAME;
    use proptest::prelude::*;

    #[derive(Debug)]
    struct Named(&'static str);

    impl StorageResolver for Named {
        fn name(&self) -> &str {
            self.0
        }
    }

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn task() -> Arc<Task> {
        Arc::new(Task::new("compile"))
    }

    /// Components `x` and `y` with capsules under `root/x` and `root/y`,
    /// and `root/shared` as the capsules root.
    fn two_component_context(root: &Path) -> BuildContext {
        fs::create_dir_all(root.join("x")).unwrap();
        fs::create_dir_all(root.join("y")).unwrap();
        fs::create_dir_all(root.join("shared")).unwrap();
        let graph = StaticCapsuleGraph::new(root.join("shared"))
            .with_capsule("x", root.join("x"))
            .with_capsule("y", root.join("y"));
        BuildContext::new(vec![Component::new("x"), Component::new("y")], Arc::new(graph))
    }

    fn list<'a>(map: &'a ArtifactMap, id: &str) -> &'a ArtifactList {
        map.get(&ComponentId::from(id)).unwrap()
    }

    fn file_names(artifact: &Artifact) -> Vec<String> {
        artifact
            .files()
            .iter()
            .map(|p| p.display().to_string())
            .collect()
    }

    #[test]
    fn component_scope_resolves_per_capsule() {
        let tmp = tempfile::tempdir().unwrap();
        let context = two_component_context(tmp.path());
        touch(tmp.path(), "x/dist/a.js");
        fs::create_dir_all(tmp.path().join("y/dist")).unwrap();

        let def = ArtifactDefinition::new("dist", vec!["dist/**".into()]);
        let map = ArtifactFactory::default()
            .generate(&context, &[def], &task(), "builder.compile")
            .unwrap();

        let x = list(&map, "x");
        assert_eq!(x.len(), 1);
        let artifact = x.iter().next().unwrap();
        assert_eq!(file_names(artifact), vec!["dist/a.js"]);
        assert_eq!(artifact.root_dir(), tmp.path().join("x"));
        assert!(list(&map, "y").is_empty());
    }

    #[test]
    fn env_scope_shares_one_artifact() {
        let tmp = tempfile::tempdir().unwrap();
        let context = two_component_context(tmp.path());
        touch(tmp.path(), "shared/report.json");

        let def = ArtifactDefinition::new("report", vec!["report.json".into()])
            .with_context(ArtifactContext::Env);
        let map = ArtifactFactory::default()
            .generate(&context, &[def], &task(), "builder.compile")
            .unwrap();

        let x = list(&map, "x").as_slice();
        let y = list(&map, "y").as_slice();
        assert_eq!(x.len(), 1);
        assert_eq!(y.len(), 1);
        let (x0, y0) = (x.first().unwrap(), y.first().unwrap());
        assert!(Arc::ptr_eq(x0, y0));
        assert_eq!(file_names(x0), vec!["report.json"]);
        assert_eq!(x0.root_dir(), tmp.path().join("shared"));
    }

    #[test]
    fn env_scope_with_root_dir_is_rooted_at_searched_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let context = two_component_context(tmp.path());
        touch(tmp.path(), "shared/out/summary.txt");
        touch(tmp.path(), "shared/ignored.txt");

        let def = ArtifactDefinition::new("summary", vec!["*.txt".into()])
            .with_root_dir("out")
            .with_context(ArtifactContext::Env);
        let map = ArtifactFactory::default()
            .generate(&context, &[def], &task(), "builder.compile")
            .unwrap();

        let x0 = list(&map, "x").as_slice().first().unwrap();
        let y0 = list(&map, "y").as_slice().first().unwrap();
        assert!(Arc::ptr_eq(x0, y0));
        assert_eq!(x0.root_dir(), tmp.path().join("shared/out"));
        assert_eq!(file_names(x0), vec!["summary.txt"]);
        for file in x0.files() {
            assert!(x0.root_dir().join(file).is_file());
        }
        assert_eq!(
            x0.absolute_paths(),
            vec![tmp.path().join("shared/out/summary.txt")]
        );
    }

    #[test]
    fn env_scope_without_matches_contributes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let context = two_component_context(tmp.path());

        let def = ArtifactDefinition::new("report", vec!["report.json".into()])
            .with_context(ArtifactContext::Env);
        let map = ArtifactFactory::default()
            .generate(&context, &[def], &task(), "builder.compile")
            .unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map.total_artifacts(), 0);
    }

    #[test]
    fn env_scope_does_not_need_capsules() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "shared/report.json");
        let graph = StaticCapsuleGraph::new(tmp.path().join("shared"));
        let context = BuildContext::new(vec![Component::new("orphan")], Arc::new(graph));

        let def = ArtifactDefinition::new("report", vec!["report.json".into()])
            .with_context(ArtifactContext::Env);
        let map = ArtifactFactory::default()
            .generate(&context, &[def], &task(), "builder.compile")
            .unwrap();
        assert_eq!(list(&map, "orphan").len(), 1);
    }

    #[test]
    fn missing_capsule_fails_with_component_id() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("x")).unwrap();
        let graph = StaticCapsuleGraph::new(tmp.path()).with_capsule("x", tmp.path().join("x"));
        let context = BuildContext::new(
            vec![Component::new("x"), Component::new("ghost")],
            Arc::new(graph),
        );
        let def = ArtifactDefinition::new("dist", vec!["dist/**".into()]);

        let err = ArtifactFactory::default()
            .generate(&context, std::slice::from_ref(&def), &task(), "builder.compile")
            .unwrap_err();
        match err {
            EngineError::CapsuleNotFound { component } => assert_eq!(component.as_str(), "ghost"),
            other => panic!("expected CapsuleNotFound, got {other:?}"),
        }

        let ghost = Component::new("ghost");
        let err = ArtifactFactory::default()
            .create_from_component(&context, &ghost, &def, &task(), "builder.compile")
            .unwrap_err();
        assert!(err.to_string().contains("ghost"), "error was: {err}");
    }

    #[test]
    fn missing_capsule_fails_even_without_matches_elsewhere() {
        let tmp = tempfile::tempdir().unwrap();
        let graph = StaticCapsuleGraph::new(tmp.path());
        let context = BuildContext::new(vec![Component::new("ghost")], Arc::new(graph));
        let def = ArtifactDefinition::new("dist", vec!["nothing/**".into()]);

        let result =
            ArtifactFactory::default().generate(&context, &[def], &task(), "builder.compile");
        assert!(matches!(result, Err(EngineError::CapsuleNotFound { .. })));
    }

    #[test]
    fn create_from_component_no_match_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let context = two_component_context(tmp.path());
        let def = ArtifactDefinition::new("dist", vec!["dist/**".into()]);

        let artifact = ArtifactFactory::default()
            .create_from_component(
                &context,
                &Component::new("x"),
                &def,
                &task(),
                "builder.compile",
            )
            .unwrap();
        assert!(artifact.is_none());
    }

    #[test]
    fn create_from_component_env_uses_capsules_root() {
        let tmp = tempfile::tempdir().unwrap();
        let context = two_component_context(tmp.path());
        touch(tmp.path(), "shared/out/summary.txt");
        let def = ArtifactDefinition::new("summary", vec!["*.txt".into()])
            .with_root_dir("out")
            .with_context(ArtifactContext::Env);

        let artifact = ArtifactFactory::default()
            .create_from_component(
                &context,
                &Component::new("x"),
                &def,
                &task(),
                "builder.compile",
            )
            .unwrap()
            .unwrap();
        assert_eq!(artifact.root_dir(), tmp.path().join("shared"));
        assert_eq!(file_names(&artifact), vec!["summary.txt"]);
        assert_eq!(
            artifact.absolute_paths(),
            vec![tmp.path().join("shared/out/summary.txt")]
        );
    }

    #[test]
    fn root_dir_narrows_search_but_not_artifact_root() {
        let tmp = tempfile::tempdir().unwrap();
        let context = two_component_context(tmp.path());
        touch(tmp.path(), "x/pkg/dist/index.js");
        touch(tmp.path(), "x/dist/ignored.js");

        let def = ArtifactDefinition::new("dist", vec!["dist/*.js".into()]).with_root_dir("pkg");
        let artifact = ArtifactFactory::default()
            .create_from_component(
                &context,
                &Component::new("x"),
                &def,
                &task(),
                "builder.compile",
            )
            .unwrap()
            .unwrap();

        assert_eq!(artifact.root_dir(), tmp.path().join("x"));
        assert_eq!(file_names(&artifact), vec!["dist/index.js"]);
        assert_eq!(
            artifact.absolute_paths(),
            vec![tmp.path().join("x/pkg/dist/index.js")]
        );
    }

    #[test]
    fn artifact_records_task_and_aspect() {
        let tmp = tempfile::tempdir().unwrap();
        let context = two_component_context(tmp.path());
        touch(tmp.path(), "x/dist/a.js");
        let task = task();

        let def = ArtifactDefinition::new("dist", vec!["dist/**".into()]);
        let artifact = ArtifactFactory::default()
            .create_from_component(&context, &Component::new("x"), &def, &task, "builder.compile")
            .unwrap()
            .unwrap();

        assert!(Arc::ptr_eq(artifact.task(), &task));
        assert_eq!(artifact.task_aspect_id(), "builder.compile");
        assert_eq!(artifact.definition(), &def);
    }

    #[test]
    fn registered_resolver_is_used() {
        let tmp = tempfile::tempdir().unwrap();
        let context = two_component_context(tmp.path());
        touch(tmp.path(), "x/dist/a.js");

        let custom: Arc<dyn StorageResolver> = Arc::new(Named("custom"));
        let factory =
            ArtifactFactory::new(StorageResolverRegistry::new().with_resolver(Arc::clone(&custom)));

        let def = ArtifactDefinition::new("dist", vec!["dist/**".into()])
            .with_storage_resolver("custom");
        let artifact = factory
            .create_from_component(&context, &Component::new("x"), &def, &task(), "builder.compile")
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(artifact.storage_resolver(), &custom));
    }

    #[test]
    fn unregistered_resolver_falls_back_to_default() {
        let tmp = tempfile::tempdir().unwrap();
        let context = two_component_context(tmp.path());
        touch(tmp.path(), "x/dist/a.js");

        let factory = ArtifactFactory::new(
            StorageResolverRegistry::new().with_resolver(Arc::new(Named("custom"))),
        );
        let def = ArtifactDefinition::new("dist", vec!["dist/**".into()])
            .with_storage_resolver("s3");
        let artifact = factory
            .create_from_component(&context, &Component::new("x"), &def, &task(), "builder.compile")
            .unwrap()
            .unwrap();

        assert_eq!(artifact.storage_resolver().name(), DEFAULT_RESOLVER_NAME);
        assert!(Arc::ptr_eq(
            artifact.storage_resolver(),
            factory.registry().default_resolver()
        ));
    }

    #[test]
    fn artifacts_follow_definition_order() {
        let tmp = tempfile::tempdir().unwrap();
        let context = two_component_context(tmp.path());
        touch(tmp.path(), "x/dist/a.js");
        touch(tmp.path(), "x/types/a.d.ts");
        touch(tmp.path(), "y/types/b.d.ts");
        touch(tmp.path(), "shared/report.json");

        let defs = vec![
            ArtifactDefinition::new("types", vec!["types/*.d.ts".into()]),
            ArtifactDefinition::new("report", vec!["report.json".into()])
                .with_context(ArtifactContext::Env),
            ArtifactDefinition::new("dist", vec!["dist/**".into()]),
        ];
        let map = ArtifactFactory::default()
            .generate(&context, &defs, &task(), "builder.compile")
            .unwrap();

        let names = |id: &str| -> Vec<String> {
            list(&map, id).iter().map(|a| a.name().to_owned()).collect()
        };
        assert_eq!(names("x"), vec!["types", "report", "dist"]);
        assert_eq!(names("y"), vec!["types", "report"]);
    }

    #[test]
    fn grouped_patterns_resolve_like_flat() {
        let tmp = tempfile::tempdir().unwrap();
        let context = two_component_context(tmp.path());
        touch(tmp.path(), "x/a/one.js");
        touch(tmp.path(), "x/b/two.ts");

        let grouped = ArtifactDefinition::new(
            "grouped",
            vec![vec!["a/*.js"].into(), "b/*.ts".into()],
        );
        let flat = ArtifactDefinition::new("flat", vec!["a/*.js".into(), "b/*.ts".into()]);
        let factory = ArtifactFactory::default();
        let x = Component::new("x");

        let grouped = factory
            .create_from_component(&context, &x, &grouped, &task(), "builder.compile")
            .unwrap()
            .unwrap();
        let flat = factory
            .create_from_component(&context, &x, &flat, &task(), "builder.compile")
            .unwrap()
            .unwrap();
        assert_eq!(grouped.files(), flat.files());
        assert_eq!(file_names(&flat), vec!["a/one.js", "b/two.ts"]);
    }

    #[test]
    fn invalid_pattern_reports_artifact_name() {
        let tmp = tempfile::tempdir().unwrap();
        let context = two_component_context(tmp.path());
        let def = ArtifactDefinition::new("broken", vec!["dist/[a".into()]);

        let err = ArtifactFactory::default()
            .generate(&context, &[def], &task(), "builder.compile")
            .unwrap_err();
        assert!(matches!(err, EngineError::Resolve { ref artifact, .. } if artifact == "broken"));
    }

    #[test]
    fn empty_context_yields_empty_map() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "report.json");
        let context = BuildContext::new(
            Vec::new(),
            Arc::new(StaticCapsuleGraph::new(tmp.path())),
        );
        let def = ArtifactDefinition::new("report", vec!["report.json".into()])
            .with_context(ArtifactContext::Env);

        let map = ArtifactFactory::default()
            .generate(&context, &[def], &task(), "builder.compile")
            .unwrap();
        assert!(map.is_empty());
    }

    proptest! {
        #[test]
        fn map_has_one_entry_per_component_in_order(
            ids in proptest::collection::vec("[a-e]{1,2}", 0..8),
            with_files in proptest::collection::vec(any::<bool>(), 8),
        ) {
            let tmp = tempfile::tempdir().unwrap();
            let mut graph = StaticCapsuleGraph::new(tmp.path().join("shared"));
            for (i, id) in ids.iter().enumerate() {
                let capsule = tmp.path().join(id);
                fs::create_dir_all(&capsule).unwrap();
                if with_files.get(i).copied().unwrap_or(false) {
                    touch(&capsule, "dist/out.js");
                }
                graph.insert(ComponentId::new(id.as_str()), capsule);
            }
            let context = BuildContext::new(
                ids.iter().map(|id| Component::new(id.as_str())),
                Arc::new(graph),
            );

            let def = ArtifactDefinition::new("dist", vec!["dist/**".into()]);
            let map = ArtifactFactory::default()
                .generate(&context, &[def], &task(), "builder.compile")
                .unwrap();

            let expected: Vec<&str> = context.components().iter().map(|c| c.id.as_str()).collect();
            let actual: Vec<&str> = map.component_ids().map(ComponentId::as_str).collect();
            prop_assert_eq!(actual, expected);
            for (_, artifacts) in &map {
                prop_assert!(artifacts.len() <= 1);
                prop_assert!(artifacts.iter().all(|a| !a.files().is_empty()));
            }
        }
    }
}
