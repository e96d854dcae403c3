//! In-memory transfer provider
//!
//! Backs engine tests: trees are plain maps keyed by endpoint, and
//! individual paths can be primed to fail so failure-escalation paths
//! are reachable without a real transfer engine.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::entry::Entry;
use crate::errors::{Result, TransferError};
use crate::provider::{Endpoint, TransferProvider};

/// [`TransferProvider`] over in-memory trees, with failure injection
#[derive(Default)]
pub struct MemoryProvider {
    trees: Mutex<HashMap<String, BTreeMap<String, Entry>>>,
    fail_paths: Mutex<HashSet<String>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(root: &Endpoint) -> String {
        root.to_string()
    }

    /// Replace the tree under `root`
    pub async fn seed(&self, root: &Endpoint, entries: Vec<Entry>) {
        let mut trees = self.trees.lock().await;
        let tree = trees.entry(Self::key(root)).or_default();
        tree.clear();
        for entry in entries {
            tree.insert(entry.path.clone(), entry);
        }
    }

    /// Insert or replace a single entry under `root`
    pub async fn insert(&self, root: &Endpoint, entry: Entry) {
        let mut trees = self.trees.lock().await;
        trees
            .entry(Self::key(root))
            .or_default()
            .insert(entry.path.clone(), entry);
    }

    /// Remove a single entry under `root`
    pub async fn remove(&self, root: &Endpoint, path: &str) {
        let mut trees = self.trees.lock().await;
        if let Some(tree) = trees.get_mut(&Self::key(root)) {
            tree.remove(path);
        }
    }

    /// Snapshot of the tree under `root`, for assertions
    pub async fn entries(&self, root: &Endpoint) -> BTreeMap<String, Entry> {
        let trees = self.trees.lock().await;
        trees.get(&Self::key(root)).cloned().unwrap_or_default()
    }

    /// Make every copy/delete touching `path` fail
    pub async fn inject_failure(&self, path: &str) {
        self.fail_paths.lock().await.insert(path.to_string());
    }

    async fn check_injected(&self, path: &str) -> Result<()> {
        if self.fail_paths.lock().await.contains(path) {
            return Err(TransferError::Injected(path.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TransferProvider for MemoryProvider {
    async fn list(&self, root: &Endpoint) -> Result<Vec<Entry>> {
        let trees = self.trees.lock().await;
        Ok(trees
            .get(&Self::key(root))
            .map(|tree| tree.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn copy(&self, src: &Endpoint, dst: &Endpoint, path: &str) -> Result<()> {
        self.check_injected(path).await?;
        let mut trees = self.trees.lock().await;
        let entry = trees
            .get(&Self::key(src))
            .and_then(|tree| tree.get(path))
            .cloned()
            .ok_or_else(|| TransferError::NotFound(format!("{path} under {src}")))?;
        trees
            .entry(Self::key(dst))
            .or_default()
            .insert(path.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, root: &Endpoint, path: &str) -> Result<()> {
        self.check_injected(path).await?;
        let mut trees = self.trees.lock().await;
        if let Some(tree) = trees.get_mut(&Self::key(root)) {
            tree.remove(path);
        }
        // Deleting a missing path is success: re-applied deletes are no-ops
        Ok(())
    }
}
