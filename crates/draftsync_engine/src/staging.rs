//! Staging of drafts with unresolved references.
//!
//! A draft naming resources that do not exist yet is parked as a
//! [`DeferredRecord`] in a key-value collaborator until those resources
//! appear. Save and delete failures are reported through the error callback
//! so batch processing continues.

use crate::config::ErrorCallback;
use crate::error::{RemoteError, SyncError, SyncResult};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// A remote key-value store grouped into containers.
///
/// Upserts are last-writer-wins.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value.
    async fn upsert(&self, container: &str, key: &str, value: Value) -> Result<Value, RemoteError>;

    /// Fetches the values stored under `keys` as `(key, value)` pairs.
    async fn fetch(
        &self,
        container: &str,
        keys: &BTreeSet<String>,
    ) -> Result<Vec<(String, Value)>, RemoteError>;

    /// Removes and returns the value stored under `key`.
    async fn delete(&self, container: &str, key: &str) -> Result<Option<Value>, RemoteError>;
}

/// An in-memory key-value store.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    containers: RwLock<BTreeMap<String, BTreeMap<String, Value>>>,
    failures: Mutex<VecDeque<RemoteError>>,
    fetch_calls: AtomicUsize,
}

impl MemoryKeyValueStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next call of any kind.
    pub fn fail_next(&self, error: RemoteError) {
        self.failures.lock().push_back(error);
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, container: &str, key: &str) -> Option<Value> {
        self.containers
            .read()
            .get(container)
            .and_then(|values| values.get(key))
            .cloned()
    }

    /// Returns the number of values in `container`.
    pub fn len(&self, container: &str) -> usize {
        self.containers
            .read()
            .get(container)
            .map_or(0, BTreeMap::len)
    }

    /// Returns how many fetches reached the store.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::Relaxed)
    }

    fn take_failure(&self) -> Result<(), RemoteError> {
        match self.failures.lock().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn upsert(&self, container: &str, key: &str, value: Value) -> Result<Value, RemoteError> {
        self.take_failure()?;
        self.containers
            .write()
            .entry(container.to_owned())
            .or_default()
            .insert(key.to_owned(), value.clone());
        Ok(value)
    }

    async fn fetch(
        &self,
        container: &str,
        keys: &BTreeSet<String>,
    ) -> Result<Vec<(String, Value)>, RemoteError> {
        self.fetch_calls.fetch_add(1, Ordering::Relaxed);
        self.take_failure()?;
        let containers = self.containers.read();
        let Some(values) = containers.get(container) else {
            return Ok(Vec::new());
        };
        Ok(keys
            .iter()
            .filter_map(|key| values.get(key).map(|value| (key.clone(), value.clone())))
            .collect())
    }

    async fn delete(&self, container: &str, key: &str) -> Result<Option<Value>, RemoteError> {
        self.take_failure()?;
        Ok(self
            .containers
            .write()
            .get_mut(container)
            .and_then(|values| values.remove(key)))
    }
}

/// A draft waiting for the resources it refers to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeferredRecord<D> {
    /// Key of the waiting draft.
    pub key: String,
    /// The waiting draft.
    pub draft: D,
    /// Keys of the referenced resources that do not exist yet.
    pub missing_references: BTreeSet<String>,
}

impl<D> DeferredRecord<D> {
    /// Creates a record.
    pub fn new(key: impl Into<String>, draft: D, missing_references: BTreeSet<String>) -> Self {
        Self {
            key: key.into(),
            draft,
            missing_references,
        }
    }
}

/// Typed access to the deferred records of one family.
pub struct DeferredReferenceStore<D> {
    store: Arc<dyn KeyValueStore>,
    container: String,
    error_callback: Option<ErrorCallback>,
    _draft: std::marker::PhantomData<fn() -> D>,
}

impl<D: Serialize + DeserializeOwned> DeferredReferenceStore<D> {
    /// Creates a store writing to `container`.
    pub fn new(store: Arc<dyn KeyValueStore>, container: impl Into<String>) -> Self {
        Self {
            store,
            container: container.into(),
            error_callback: None,
            _draft: std::marker::PhantomData,
        }
    }

    /// Sets the callback receiving save and delete failures.
    pub fn with_error_callback(mut self, callback: Option<ErrorCallback>) -> Self {
        self.error_callback = callback;
        self
    }

    /// Returns the container name.
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Saves `record` under its key.
    ///
    /// Returns `None` after reporting a failure.
    pub async fn save(&self, record: DeferredRecord<D>) -> Option<DeferredRecord<D>> {
        let value = match serde_json::to_value(&record) {
            Ok(value) => value,
            Err(err) => {
                self.report_failure("save", &record.key, SyncError::from(err));
                return None;
            }
        };

        match self.store.upsert(&self.container, &record.key, value).await {
            Ok(_) => {
                debug!(container = %self.container, key = %record.key, "deferred draft saved");
                Some(record)
            }
            Err(err) => {
                self.report_failure("save", &record.key, SyncError::from(err));
                None
            }
        }
    }

    /// Fetches the records stored under `keys`.
    ///
    /// An empty `keys` set returns nothing without calling the store.
    pub async fn fetch(&self, keys: &BTreeSet<String>) -> SyncResult<Vec<DeferredRecord<D>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let values = self.store.fetch(&self.container, keys).await?;
        values
            .into_iter()
            .map(|(_, value)| serde_json::from_value(value).map_err(SyncError::from))
            .collect()
    }

    /// Deletes the record stored under `key`, returning it.
    ///
    /// Returns `None` when nothing was stored or after reporting a failure.
    pub async fn delete(&self, key: &str) -> Option<DeferredRecord<D>> {
        match self.store.delete(&self.container, key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(record) => {
                    debug!(container = %self.container, key, "deferred draft deleted");
                    Some(record)
                }
                Err(err) => {
                    self.report_failure("delete", key, SyncError::from(err));
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                self.report_failure("delete", key, SyncError::from(err));
                None
            }
        }
    }

    fn report_failure(&self, operation: &str, key: &str, error: SyncError) {
        let message =
            format!("Failed to {operation} deferred draft with key: '{key}'. Reason: {error}");
        warn!(container = %self.container, key, error = %error, "{message}");
        if let Some(callback) = &self.error_callback {
            callback(&message, &error);
        }
    }
}
