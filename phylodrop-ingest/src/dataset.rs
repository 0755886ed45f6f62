//! Dataset records and deferred sidecar payloads
//!
//! A dataset is created when a main or Newick file is classified, gains
//! sidecar slots during association, and is read-only once handed to the
//! consumer. Sidecar payloads load on their own tasks; the slots hold
//! shared futures the consumer awaits when it actually needs the data,
//! so a large payload never blocks the initial view switch.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde_json::Value;
use thiserror::Error;

use phylodrop_common::model::DatasetDoc;

use crate::classify::SidecarKind;

/// Failure resolving a deferred sidecar payload. Cloneable so every
/// consumer of the shared future observes the same failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("sidecar file {name}: {reason}")]
pub struct SidecarError {
    pub name: String,
    pub reason: String,
}

/// A sidecar payload that may still be loading: awaitable any number of
/// times, by any number of consumers.
pub type SharedJson = Shared<BoxFuture<'static, Result<Arc<Value>, SidecarError>>>;

/// Spawn `task` and wrap its handle into a [`SharedJson`]. The read runs
/// to completion on its own task whether or not anyone awaits it.
pub fn shared_json<F>(name: String, task: F) -> SharedJson
where
    F: Future<Output = Result<Value, SidecarError>> + Send + 'static,
{
    let handle = tokio::spawn(task);
    async move {
        match handle.await {
            Ok(result) => result.map(Arc::new),
            Err(err) => Err(SidecarError {
                name,
                reason: format!("read task failed: {err}"),
            }),
        }
    }
    .boxed()
    .shared()
}

/// Sidecar slots of one dataset, keyed by kind.
#[derive(Debug, Clone, Default)]
pub struct SidecarSet {
    slots: HashMap<SidecarKind, SharedJson>,
}

impl SidecarSet {
    /// Store a pending payload. Returns false (and drops the new value)
    /// if the slot is already occupied.
    pub fn insert(&mut self, kind: SidecarKind, pending: SharedJson) -> bool {
        if self.slots.contains_key(&kind) {
            return false;
        }
        self.slots.insert(kind, pending);
        true
    }

    pub fn get(&self, kind: SidecarKind) -> Option<&SharedJson> {
        self.slots.get(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Kinds with a pending or resolved payload, in declaration order.
    pub fn kinds(&self) -> impl Iterator<Item = SidecarKind> + '_ {
        SidecarKind::ALL
            .into_iter()
            .filter(|kind| self.slots.contains_key(kind))
    }
}

/// One associated dataset.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Canonical key (lowercase), shared with sidecar association and
    /// narrative linking
    pub key: String,
    /// Name of the dropped file the dataset came from
    pub source_name: String,
    pub doc: DatasetDoc,
    pub sidecars: SidecarSet,
}

impl Dataset {
    pub fn new(key: String, source_name: String, doc: DatasetDoc) -> Self {
        Self {
            key,
            source_name,
            doc,
            sidecars: SidecarSet::default(),
        }
    }
}

/// Insertion-ordered, case-insensitively keyed dataset collection.
///
/// Drop order is the deterministic order used wherever "the first
/// datasets" are selected; map iteration order is never observable.
#[derive(Debug, Clone, Default)]
pub struct DatasetSet {
    order: Vec<String>,
    by_key: HashMap<String, Dataset>,
}

impl DatasetSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a dataset, keeping drop order. On a key collision the set
    /// is unchanged and the rejected dataset is handed back.
    pub fn insert(&mut self, dataset: Dataset) -> Result<(), Dataset> {
        let norm = Self::normalize(&dataset.key);
        if self.by_key.contains_key(&norm) {
            return Err(dataset);
        }
        self.order.push(norm.clone());
        self.by_key.insert(norm, dataset);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Dataset> {
        self.by_key.get(&Self::normalize(key))
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Dataset> {
        self.by_key.get_mut(&Self::normalize(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.by_key.contains_key(&Self::normalize(key))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Datasets in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Dataset> {
        self.order.iter().filter_map(|key| self.by_key.get(key))
    }

    /// Drop every dataset whose key is not in `keep` (keys compared
    /// case-insensitively). Returns the removed keys in insertion order.
    pub fn retain_keys(&mut self, keep: &std::collections::HashSet<String>) -> Vec<String> {
        let mut removed = Vec::new();
        self.order.retain(|key| {
            if keep.contains(key) {
                true
            } else {
                removed.push(key.clone());
                false
            }
        });
        for key in &removed {
            self.by_key.remove(key);
        }
        removed
    }

    fn normalize(key: &str) -> String {
        key.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset(key: &str) -> Dataset {
        let doc = serde_json::from_value(json!({"tree": {"name": "r"}})).unwrap();
        Dataset::new(key.to_string(), format!("{key}.json"), doc)
    }

    #[test]
    fn preserves_insertion_order() {
        let mut set = DatasetSet::new();
        for key in ["zika/colombia", "ncov/global", "flu/seasonal"] {
            set.insert(dataset(key)).unwrap();
        }
        assert_eq!(
            set.keys().collect::<Vec<_>>(),
            vec!["zika/colombia", "ncov/global", "flu/seasonal"]
        );
        assert_eq!(set.iter().count(), 3);
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let mut set = DatasetSet::new();
        set.insert(dataset("ncov/global")).unwrap();
        assert!(set.contains_key("NCOV/Global"));
        assert!(set.get("NCOV/GLOBAL").is_some());
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let mut set = DatasetSet::new();
        set.insert(dataset("ncov/global")).unwrap();
        let rejected = set.insert(dataset("ncov/global")).unwrap_err();
        assert_eq!(rejected.key, "ncov/global");
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn retain_reports_removed_keys() {
        let mut set = DatasetSet::new();
        set.insert(dataset("ncov/global")).unwrap();
        set.insert(dataset("flu/seasonal")).unwrap();

        let keep = std::collections::HashSet::from(["ncov/global".to_string()]);
        let removed = set.retain_keys(&keep);
        assert_eq!(removed, vec!["flu/seasonal".to_string()]);
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["ncov/global"]);
    }

    #[tokio::test]
    async fn shared_sidecars_resolve_for_every_consumer() {
        let pending = shared_json("tf.json".to_string(), async {
            Ok(json!({"pivots": [2020.0]}))
        });

        let mut sidecars = SidecarSet::default();
        assert!(sidecars.insert(SidecarKind::TipFrequencies, pending.clone()));
        assert!(!sidecars.insert(SidecarKind::TipFrequencies, pending));

        let slot = sidecars.get(SidecarKind::TipFrequencies).unwrap();
        let first = slot.clone().await.unwrap();
        let second = slot.clone().await.unwrap();
        assert_eq!(first["pivots"][0], 2020.0);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn sidecar_failure_is_shared_too() {
        let pending = shared_json("bad.json".to_string(), async {
            Err(SidecarError {
                name: "bad.json".to_string(),
                reason: "invalid JSON".to_string(),
            })
        });
        let err = pending.clone().await.unwrap_err();
        assert_eq!(err.name, "bad.json");
        assert_eq!(pending.await.unwrap_err(), err);
    }
}
