//! Recursive, duplicate-free builds over dependency and plugin-host graphs
//!
//! The walk is depth-first and post-order: plugin hosts and dependencies are
//! built before the project that needs them, and each root is visited at most
//! once per run. After a building target, produced files are copied to their
//! consumers and recorded in the destination directory's manifest.

use crate::driver::{BuildDriver, BuildOptions, MakeDriver, Target};
use crate::errors::BuildError;
use crate::generator::{builtin_registry, Generator, GeneratorRegistry};
use crate::project::{DescriptorStore, NodeKey, ProjectInfo};
use ahash::AHashSet;
use std::path::{Path, PathBuf};
use tkmake_config::Config;
use tkmake_manifest::{
    apply, copy_into, diff, file_sha256, index_path, load_index, save_index, Manifests,
    PluginRecord, PluginSet, PropagationReport,
};
use tkmake_naming::ArtifactKind;

/// What one [`Orchestrator::run`] did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Roots handed to the build driver, in build order.
    pub built: Vec<PathBuf>,
    /// Manifests written at the end of the run.
    pub manifests_saved: usize,
    /// Source files that were missing while propagating.
    pub missing: Vec<PathBuf>,
}

pub struct Orchestrator<S, D> {
    generator: Box<dyn Generator>,
    store: S,
    driver: D,
    options: BuildOptions,
    visited: AHashSet<PathBuf>,
    manifests: Manifests,
    summary: RunSummary,
}

impl<S: DescriptorStore> Orchestrator<S, MakeDriver> {
    /// Orchestrator over the built-in generators and the configured make.
    pub fn with_make(config: &Config, generator: &str, store: S, options: BuildOptions) -> Result<Self, BuildError> {
        let registry = builtin_registry()?;
        let driver = MakeDriver::from_config(config)?;
        Orchestrator::new(&registry, generator, store, driver, options)
    }
}

impl<S: DescriptorStore, D: BuildDriver> Orchestrator<S, D> {
    /// Pick `generator` from `registry`. An unknown name fails here, before
    /// any project is touched.
    pub fn new(
        registry: &GeneratorRegistry,
        generator: &str,
        store: S,
        driver: D,
        options: BuildOptions,
    ) -> Result<Self, BuildError> {
        let generator = registry.create(generator)?;
        Ok(Orchestrator {
            generator,
            store,
            driver,
            options,
            visited: AHashSet::new(),
            manifests: Manifests::new(),
            summary: RunSummary::default(),
        })
    }

    /// Build `key` and everything it needs for `target`.
    pub fn run(&mut self, key: &NodeKey, target: Target) -> Result<RunSummary, BuildError> {
        self.visited.clear();
        self.summary = RunSummary::default();
        tracing::info!(
            "Running '{}' for {} with generator '{}'",
            target,
            key.root.display(),
            self.generator.name()
        );

        let outcome = self
            .walk(key, target)
            .and_then(|()| self.propagate_root(key, target));
        // Files already copied stay on disk, so their references must too.
        let saved = self.manifests.save_all();
        outcome?;
        self.summary.manifests_saved = saved?;
        Ok(std::mem::take(&mut self.summary))
    }

    fn propagate_root(&mut self, key: &NodeKey, target: Target) -> Result<(), BuildError> {
        if !target.propagates() {
            return Ok(());
        }
        let root = self.store.load(key)?;
        match root.kind() {
            ArtifactKind::Program => self.copy_dependencies(&root)?,
            ArtifactKind::Plugin => {
                for host_key in &root.plugin_hosts {
                    let host = self.store.load(host_key)?;
                    self.merge_plugin(&root, &host)?;
                }
            }
            ArtifactKind::Library => {}
        }
        Ok(())
    }

    fn walk(&mut self, key: &NodeKey, target: Target) -> Result<(), BuildError> {
        if !self.visited.insert(key.root.clone()) {
            tracing::trace!("Already visited {}", key.root.display());
            return Ok(());
        }
        let project = self.store.load(key)?;

        // clean_self only touches the requested root.
        if target != Target::CleanSelf {
            if project.kind() == ArtifactKind::Plugin {
                for host_key in &project.plugin_hosts {
                    self.walk(host_key, target)?;
                    if !target.propagates() {
                        continue;
                    }
                    let host = self.store.load(host_key)?;
                    match host.kind() {
                        ArtifactKind::Program => self.copy_dependencies(&host)?,
                        ArtifactKind::Plugin => self.merge_plugin(&project, &host)?,
                        ArtifactKind::Library => {
                            tracing::debug!("Host {} is a library, nothing to propagate", host.root().display());
                        }
                    }
                }
            }
            for dependency in &project.dependencies {
                self.walk(dependency, target)?;
            }
        }

        let build_file = self.generator.generate(&project)?;
        self.driver
            .build(&project, &build_file, target, &self.options)?;
        self.summary.built.push(project.root().to_path_buf());

        if target.is_clean() {
            self.generator.delete(&project)?;
            tracing::debug!("Removed generated build files for {}", project.root().display());
        }
        Ok(())
    }

    fn record_missing(&mut self, report: PropagationReport) {
        self.summary.missing.extend(report.missing);
    }

    /// Copy a program's shared libraries next to it.
    fn copy_dependencies(&mut self, program: &ProjectInfo) -> Result<(), BuildError> {
        let dest = program.output_dir();
        let program_name = program.goal_file_name();
        let mut report = PropagationReport::default();
        for library in &program.shared_libraries {
            let Some(copied) = copy_into(library, &dest, &mut report)? else {
                continue;
            };
            if let Some(name) = copied.file_name() {
                self.manifests
                    .get_mut(&dest)?
                    .add_file(&name.to_string_lossy(), &program_name);
            }
        }
        self.record_missing(report);
        Ok(())
    }

    fn plugin_record(plugin: &ProjectInfo, goal: &Path) -> Result<PluginRecord, BuildError> {
        Ok(PluginRecord {
            path: goal.to_string_lossy().into_owned(),
            version: plugin.goal.version.clone(),
            sha256: file_sha256(goal)?,
            dependencies: plugin
                .shared_libraries
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
        })
    }

    /// Bring `host`'s copy of `plugin`, and of the plugins `plugin` itself
    /// hosts, up to date.
    fn merge_plugin(&mut self, plugin: &ProjectInfo, host: &ProjectInfo) -> Result<(), BuildError> {
        let goal = plugin.goal_path();
        if !goal.is_file() {
            tracing::warn!(
                "Plugin {} has not been built yet, skipping merge into {}",
                goal.display(),
                host.root().display()
            );
            self.summary.missing.push(goal);
            return Ok(());
        }

        let dest = host.output_dir();
        let host_name = host.goal_file_name();
        let plugin_name = plugin.goal_file_name();
        let goal_key = goal.to_string_lossy().into_owned();

        // The host's own index, narrowed to this plugin.
        let host_index_path = index_path(&host.goal_path());
        let mut host_index = load_index(&host_index_path)?;
        let from: PluginSet = host_index.get(&goal_key).cloned().into_iter().collect::<Vec<_>>().into();
        let to = PluginSet::from(vec![Self::plugin_record(plugin, &goal)?]);
        let changes = diff(&from, &to);
        if !changes.is_empty() {
            let manifest = self.manifests.get_mut(&dest)?;
            let report = apply(&changes, &dest, &host_name, manifest, &mut host_index)?;
            manifest.save()?;
            save_index(&host_index_path, &host_index)?;
            self.record_missing(report);
        }

        // Plugins of the plugin, through the snapshot kept beside the copy.
        let snapshot_path = index_path(&dest.join(&plugin_name));
        let snapshot = load_index(&snapshot_path)?;
        let nested = load_index(&index_path(&goal))?;
        let nested_changes = diff(&snapshot, &nested);
        if !nested_changes.is_empty() {
            let mut updated = snapshot;
            let manifest = self.manifests.get_mut(&dest)?;
            let report = apply(&nested_changes, &dest, &plugin_name, manifest, &mut updated)?;
            manifest.save()?;
            save_index(&snapshot_path, &updated)?;
            self.record_missing(report);
        }

        tracing::debug!("Merged {} into {}", plugin_name, dest.display());
        Ok(())
    }
}
