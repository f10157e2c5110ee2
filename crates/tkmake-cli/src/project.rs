//! Loaded projects and the store that produces them
//!
//! Parsing project descriptors is not this crate's job; the orchestrator only
//! sees [`ProjectInfo`] values handed out by a [`DescriptorStore`].

use crate::errors::BuildError;
use ahash::AHashMap;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tkmake_naming::{ArtifactKind, BuildConfig, GoalName, LinkType};

/// A project root built with one configuration and link type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub root: PathBuf,
    pub config: BuildConfig,
    pub link: LinkType,
}

impl NodeKey {
    pub fn new(root: impl Into<PathBuf>, config: BuildConfig, link: LinkType) -> Self {
        NodeKey {
            root: root.into(),
            config,
            link,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProjectInfo {
    pub key: NodeKey,
    pub goal: GoalName,
    /// Ordinary dependencies, built before this project.
    pub dependencies: Vec<NodeKey>,
    /// Projects that load this one as a plugin.
    pub plugin_hosts: Vec<NodeKey>,
    /// Shared libraries the goal links against and needs beside it at run time.
    pub shared_libraries: Vec<PathBuf>,
}

impl ProjectInfo {
    pub fn kind(&self) -> ArtifactKind {
        self.goal.kind
    }

    pub fn root(&self) -> &Path {
        &self.key.root
    }

    pub fn goal_path(&self) -> PathBuf {
        self.goal.goal_path(&self.key.root)
    }

    pub fn goal_file_name(&self) -> String {
        self.goal.file_name()
    }

    /// Directory the goal is written to: `bin` or `lib`, plus any
    /// hierarchical segments.
    pub fn output_dir(&self) -> PathBuf {
        let goal = self.goal_path();
        goal.parent().map_or_else(|| self.key.root.clone(), Path::to_path_buf)
    }
}

pub trait DescriptorStore {
    fn load(&self, key: &NodeKey) -> Result<Arc<ProjectInfo>, BuildError>;
}

/// Caches another store's projects for the lifetime of one run.
pub struct MemoizedStore<S> {
    inner: S,
    cache: RefCell<AHashMap<NodeKey, Arc<ProjectInfo>>>,
}

impl<S: DescriptorStore> MemoizedStore<S> {
    pub fn new(inner: S) -> Self {
        MemoizedStore {
            inner,
            cache: RefCell::new(AHashMap::new()),
        }
    }

    pub fn cached(&self) -> usize {
        self.cache.borrow().len()
    }
}

impl<S: DescriptorStore> DescriptorStore for MemoizedStore<S> {
    fn load(&self, key: &NodeKey) -> Result<Arc<ProjectInfo>, BuildError> {
        if let Some(found) = self.cache.borrow().get(key) {
            return Ok(Arc::clone(found));
        }
        let loaded = self.inner.load(key)?;
        self.cache
            .borrow_mut()
            .insert(key.clone(), Arc::clone(&loaded));
        Ok(loaded)
    }
}
