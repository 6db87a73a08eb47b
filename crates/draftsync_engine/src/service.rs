//! Remote collaborators and their in-memory implementations.

use crate::error::RemoteError;
use crate::family::{RemoteResource, ResourceFamily, SyncDraft};
use async_trait::async_trait;
use draftsync_diff::ResourceDiff;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

/// The remote service holding the resources of one family.
///
/// This trait abstracts the transport, allowing for different implementations
/// (HTTP clients, in-memory for testing, etc.).
#[async_trait]
pub trait ResourceService<F: ResourceFamily>: Send + Sync {
    /// Fetches the resources whose keys are in `keys`.
    async fn fetch_matching_by_keys(
        &self,
        keys: &BTreeSet<String>,
    ) -> Result<Vec<F::Resource>, RemoteError>;

    /// Fetches one resource by id.
    async fn fetch_by_id(&self, id: &str) -> Result<Option<F::Resource>, RemoteError>;

    /// Creates a resource from a draft.
    ///
    /// `Ok(None)` signals a failure the remote has already reported.
    async fn create(&self, draft: &F::Draft) -> Result<Option<F::Resource>, RemoteError>;

    /// Applies `actions` to `resource`, guarded by its version.
    async fn update(
        &self,
        resource: &F::Resource,
        actions: &[F::Action],
    ) -> Result<F::Resource, RemoteError>;
}

/// Tells which referenced keys exist on the remote.
#[async_trait]
pub trait ReferenceResolver: Send + Sync {
    /// Returns the subset of `keys` that exist.
    async fn existing_keys(&self, keys: &BTreeSet<String>) -> Result<BTreeSet<String>, RemoteError>;
}

/// Number of calls an in-memory service has received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceCalls {
    /// Batched lookups by key.
    pub lookups: usize,
    /// Fetches by id.
    pub fetches: usize,
    /// Create requests.
    pub creates: usize,
    /// Update requests.
    pub updates: usize,
    /// Reference resolutions.
    pub resolutions: usize,
}

enum Scripted {
    Fail(RemoteError),
    Empty,
}

type Materialize<F> =
    Box<dyn Fn(&<F as ResourceDiff>::Draft, String) -> <F as ResourceDiff>::Resource + Send + Sync>;
type Apply<F> = Box<
    dyn Fn(&<F as ResourceDiff>::Resource, &[<F as ResourceDiff>::Action]) -> <F as ResourceDiff>::Resource
        + Send
        + Sync,
>;

/// An in-memory remote service.
///
/// Resources are kept by key. `materialize` turns a draft and a fresh id into
/// a resource; `apply` returns the resource after applying actions and must
/// advance its version. Failures can be scripted per operation and are
/// consumed in order.
pub struct MemoryResourceService<F: ResourceFamily> {
    materialize: Materialize<F>,
    apply: Apply<F>,
    resources: RwLock<BTreeMap<String, F::Resource>>,
    lookup_failures: Mutex<VecDeque<RemoteError>>,
    fetch_script: Mutex<VecDeque<Scripted>>,
    create_script: Mutex<VecDeque<Scripted>>,
    update_failures: Mutex<VecDeque<RemoteError>>,
    lookups: Mutex<Vec<BTreeSet<String>>>,
    submitted: Mutex<Vec<(String, Vec<F::Action>)>>,
    fetches: AtomicUsize,
    creates: AtomicUsize,
    updates: AtomicUsize,
    resolutions: AtomicUsize,
}

impl<F: ResourceFamily> MemoryResourceService<F> {
    /// Creates an empty service.
    pub fn new(
        materialize: impl Fn(&F::Draft, String) -> F::Resource + Send + Sync + 'static,
        apply: impl Fn(&F::Resource, &[F::Action]) -> F::Resource + Send + Sync + 'static,
    ) -> Self {
        Self {
            materialize: Box::new(materialize),
            apply: Box::new(apply),
            resources: RwLock::new(BTreeMap::new()),
            lookup_failures: Mutex::new(VecDeque::new()),
            fetch_script: Mutex::new(VecDeque::new()),
            create_script: Mutex::new(VecDeque::new()),
            update_failures: Mutex::new(VecDeque::new()),
            lookups: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            resolutions: AtomicUsize::new(0),
        }
    }

    /// Stores `resource`, replacing any resource with the same key.
    pub fn insert(&self, resource: F::Resource) {
        self.resources
            .write()
            .insert(resource.key().to_owned(), resource);
    }

    /// Removes the resource with `key`.
    pub fn remove(&self, key: &str) -> Option<F::Resource> {
        self.resources.write().remove(key)
    }

    /// Returns the resource with `key`.
    pub fn get(&self, key: &str) -> Option<F::Resource> {
        self.resources.read().get(key).cloned()
    }

    /// Returns the number of stored resources.
    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    /// Returns true if no resource is stored.
    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }

    /// Fails the next lookup by keys.
    pub fn fail_next_lookup(&self, error: RemoteError) {
        self.lookup_failures.lock().push_back(error);
    }

    /// Fails the next fetch by id.
    pub fn fail_next_fetch(&self, error: RemoteError) {
        self.fetch_script.lock().push_back(Scripted::Fail(error));
    }

    /// Makes the next fetch by id find nothing.
    pub fn miss_next_fetch(&self) {
        self.fetch_script.lock().push_back(Scripted::Empty);
    }

    /// Fails the next create.
    pub fn fail_next_create(&self, error: RemoteError) {
        self.create_script.lock().push_back(Scripted::Fail(error));
    }

    /// Makes the next create return no resource.
    pub fn reject_next_create(&self) {
        self.create_script.lock().push_back(Scripted::Empty);
    }

    /// Fails the next update.
    pub fn fail_next_update(&self, error: RemoteError) {
        self.update_failures.lock().push_back(error);
    }

    /// Returns the call counts.
    pub fn calls(&self) -> ServiceCalls {
        ServiceCalls {
            lookups: self.lookups.lock().len(),
            fetches: self.fetches.load(Ordering::Relaxed),
            creates: self.creates.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            resolutions: self.resolutions.load(Ordering::Relaxed),
        }
    }

    /// Returns the key sets of all lookups, in call order.
    pub fn lookup_batches(&self) -> Vec<BTreeSet<String>> {
        self.lookups.lock().clone()
    }

    /// Returns every submitted update as `(key, actions)`, in call order.
    pub fn submitted_updates(&self) -> Vec<(String, Vec<F::Action>)> {
        self.submitted.lock().clone()
    }
}

#[async_trait]
impl<F: ResourceFamily> ResourceService<F> for MemoryResourceService<F> {
    async fn fetch_matching_by_keys(
        &self,
        keys: &BTreeSet<String>,
    ) -> Result<Vec<F::Resource>, RemoteError> {
        self.lookups.lock().push(keys.clone());
        if let Some(error) = self.lookup_failures.lock().pop_front() {
            return Err(error);
        }

        let resources = self.resources.read();
        Ok(keys
            .iter()
            .filter_map(|key| resources.get(key).cloned())
            .collect())
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<F::Resource>, RemoteError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        match self.fetch_script.lock().pop_front() {
            Some(Scripted::Fail(error)) => return Err(error),
            Some(Scripted::Empty) => return Ok(None),
            None => {}
        }

        Ok(self
            .resources
            .read()
            .values()
            .find(|resource| resource.id() == id)
            .cloned())
    }

    async fn create(&self, draft: &F::Draft) -> Result<Option<F::Resource>, RemoteError> {
        self.creates.fetch_add(1, Ordering::Relaxed);
        match self.create_script.lock().pop_front() {
            Some(Scripted::Fail(error)) => return Err(error),
            Some(Scripted::Empty) => return Ok(None),
            None => {}
        }

        let key = draft
            .key()
            .ok_or_else(|| RemoteError::Validation("draft has no key".into()))?;
        let mut resources = self.resources.write();
        if resources.contains_key(key) {
            return Err(RemoteError::Validation(format!(
                "a resource with key '{key}' already exists"
            )));
        }

        let resource = (self.materialize)(draft, Uuid::new_v4().to_string());
        resources.insert(key.to_owned(), resource.clone());
        Ok(Some(resource))
    }

    async fn update(
        &self,
        resource: &F::Resource,
        actions: &[F::Action],
    ) -> Result<F::Resource, RemoteError> {
        self.updates.fetch_add(1, Ordering::Relaxed);
        self.submitted
            .lock()
            .push((resource.key().to_owned(), actions.to_vec()));
        if let Some(error) = self.update_failures.lock().pop_front() {
            return Err(error);
        }

        let mut resources = self.resources.write();
        let stored = resources
            .get(resource.key())
            .ok_or_else(|| RemoteError::NotFound(resource.id().to_owned()))?;
        if stored.version() != resource.version() {
            return Err(RemoteError::ConcurrentModification {
                expected: resource.version(),
                current: stored.version(),
            });
        }

        let updated = (self.apply)(stored, actions);
        resources.insert(resource.key().to_owned(), updated.clone());
        Ok(updated)
    }
}

#[async_trait]
impl<F: ResourceFamily> ReferenceResolver for MemoryResourceService<F> {
    async fn existing_keys(&self, keys: &BTreeSet<String>) -> Result<BTreeSet<String>, RemoteError> {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        let resources = self.resources.read();
        Ok(keys
            .iter()
            .filter(|key| resources.contains_key(*key))
            .cloned()
            .collect())
    }
}
