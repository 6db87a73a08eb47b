//! Sync orchestrator.
//!
//! Drafts are split into batches. Each batch is validated, optionally
//! screened for missing references, matched against existing resources with
//! one lookup and then synced concurrently. Keys created by a batch release
//! drafts that were waiting for them.

use crate::config::SyncOptions;
use crate::error::{RemoteError, SyncError};
use crate::family::{RemoteResource, ResourceFamily, SyncDraft};
use crate::service::{ReferenceResolver, ResourceService};
use crate::staging::{DeferredRecord, DeferredReferenceStore, KeyValueStore};
use crate::stats::{StatisticsSnapshot, SyncStatistics};
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

const FETCH_ON_RETRY_FAILED: &str =
    "Failed to fetch from remote while retrying after concurrency modification.";
const NOT_FOUND_ON_RETRY: &str =
    "Not found when attempting to fetch while retrying after concurrency modification.";

/// The lifecycle state of one draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftState {
    /// Handed to the engine.
    Received,
    /// Passed validation.
    Validated,
    /// An existing resource has the draft's key.
    Matched,
    /// No existing resource has the draft's key.
    Unmatched,
    /// Parked until its references exist.
    Deferred,
    /// A resource was created.
    Created,
    /// The existing resource was updated.
    Updated,
    /// The existing resource needed no change.
    UpToDate,
    /// The draft could not be synced.
    Failed,
    /// The before-create hook dropped the draft.
    Skipped,
}

impl DraftState {
    /// Returns true if processing of the draft has ended for this call.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DraftState::Deferred
                | DraftState::Created
                | DraftState::Updated
                | DraftState::UpToDate
                | DraftState::Failed
                | DraftState::Skipped
        )
    }

    /// Returns true if the remote now matches the draft.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            DraftState::Created | DraftState::Updated | DraftState::UpToDate
        )
    }
}

/// Drafts waiting for references, indexed by the keys they wait for.
#[derive(Debug, Default)]
struct WaitingIndex {
    by_missing_key: BTreeMap<String, BTreeSet<String>>,
    drafts: BTreeSet<String>,
}

impl WaitingIndex {
    fn park(&mut self, draft_key: &str, missing: &BTreeSet<String>) {
        for key in missing {
            self.by_missing_key
                .entry(key.clone())
                .or_default()
                .insert(draft_key.to_owned());
        }
        self.drafts.insert(draft_key.to_owned());
    }

    /// Removes the entries for `available` keys and returns the drafts that
    /// were waiting on any of them.
    fn waiting_on(&mut self, available: &BTreeSet<String>) -> BTreeSet<String> {
        let mut affected = BTreeSet::new();
        for key in available {
            if let Some(drafts) = self.by_missing_key.remove(key) {
                affected.extend(drafts.into_iter().filter(|d| self.drafts.contains(d)));
            }
        }
        affected
    }

    fn release(&mut self, draft_key: &str) -> bool {
        self.drafts.remove(draft_key)
    }

    fn len(&self) -> usize {
        self.drafts.len()
    }
}

struct DeferredReferences<F: ResourceFamily> {
    resolver: Arc<dyn ReferenceResolver>,
    store: DeferredReferenceStore<F::Draft>,
    waiting: Mutex<WaitingIndex>,
}

/// Syncs drafts of one resource family against a remote service.
///
/// Statistics accumulate over every [`sync`](Self::sync) call of one engine.
pub struct SyncEngine<F: ResourceFamily, S: ResourceService<F>> {
    service: Arc<S>,
    options: SyncOptions<F>,
    statistics: SyncStatistics,
    deferred: Option<DeferredReferences<F>>,
}

impl<F: ResourceFamily, S: ResourceService<F>> SyncEngine<F, S> {
    /// Creates a new sync engine.
    pub fn new(service: Arc<S>, options: SyncOptions<F>) -> Self {
        Self {
            service,
            options,
            statistics: SyncStatistics::new(F::PLURAL),
            deferred: None,
        }
    }

    /// Parks drafts with missing references in `store` until the referenced
    /// keys exist according to `resolver`.
    pub fn with_deferred_references(
        mut self,
        resolver: Arc<dyn ReferenceResolver>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let store = DeferredReferenceStore::new(store, F::staging_container())
            .with_error_callback(self.options.error_callback().cloned());
        self.deferred = Some(DeferredReferences {
            resolver,
            store,
            waiting: Mutex::new(WaitingIndex::default()),
        });
        self
    }

    /// Returns the options.
    pub fn options(&self) -> &SyncOptions<F> {
        &self.options
    }

    /// Returns the remote service.
    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// Returns the current statistics.
    pub fn statistics(&self) -> StatisticsSnapshot {
        self.statistics.snapshot()
    }

    /// Returns the keys of drafts waiting for references.
    pub fn waiting_drafts(&self) -> BTreeSet<String> {
        match &self.deferred {
            Some(deferred) => deferred.waiting.lock().drafts.clone(),
            None => BTreeSet::new(),
        }
    }

    /// Syncs `drafts` and returns the statistics afterwards.
    ///
    /// Accepts drafts or optional drafts; a `None` entry fails as a null
    /// draft. Failures never escape: each one is reported through the error
    /// callback and counted.
    pub async fn sync<I>(&self, drafts: I) -> StatisticsSnapshot
    where
        I: IntoIterator,
        I::Item: Into<Option<F::Draft>>,
    {
        let drafts: Vec<Option<F::Draft>> = drafts.into_iter().map(Into::into).collect();
        info!(
            resource = F::PLURAL,
            drafts = drafts.len(),
            batch_size = self.options.batch_size(),
            "sync started"
        );

        self.statistics.start_timer();
        for batch in drafts.chunks(self.options.batch_size()) {
            self.process_batch(batch).await;
        }
        self.statistics.stop_timer();

        let snapshot = self.statistics.snapshot();
        info!(
            resource = F::PLURAL,
            processed = snapshot.processed(),
            created = snapshot.created,
            updated = snapshot.updated,
            up_to_date = snapshot.up_to_date,
            failed = snapshot.failed,
            waiting = snapshot.waiting_to_be_resolved,
            elapsed = %snapshot.processing_time_breakdown(),
            "sync finished"
        );
        snapshot
    }

    async fn process_batch(&self, batch: &[Option<F::Draft>]) {
        let valid = self.validate(batch);
        let ready = match &self.deferred {
            Some(deferred) => self.partition_by_references(deferred, valid).await,
            None => valid,
        };

        let outcomes = self.sync_ready(ready).await;
        let created = self.settle(&outcomes).await;
        self.resolve_deferred(created).await;
    }

    fn validate(&self, batch: &[Option<F::Draft>]) -> Vec<F::Draft> {
        let mut valid = Vec::with_capacity(batch.len());
        for draft in batch {
            match draft {
                None => self.fail_invalid(
                    &format!("Failed to process null {} draft.", F::NAME),
                    "draft is null",
                ),
                Some(draft) if draft.key().is_some_and(|key| !key.is_empty()) => {
                    valid.push(draft.clone());
                }
                Some(_) => self.fail_invalid(
                    &format!("Failed to process {} draft without key.", F::NAME),
                    "draft has no key",
                ),
            }
        }
        valid
    }

    async fn partition_by_references(
        &self,
        deferred: &DeferredReferences<F>,
        drafts: Vec<F::Draft>,
    ) -> Vec<F::Draft> {
        let referenced: BTreeSet<String> = drafts.iter().flat_map(|draft| draft.references()).collect();
        if referenced.is_empty() {
            return drafts;
        }

        let existing = match deferred.resolver.existing_keys(&referenced).await {
            Ok(existing) => existing,
            Err(err) => {
                let (blocked, ready): (Vec<_>, Vec<_>) = drafts
                    .into_iter()
                    .partition(|draft| !draft.references().is_empty());
                let keys = draft_keys(&blocked);
                let message = format!(
                    "Failed to resolve references of {} with keys: '{}'.",
                    F::PLURAL,
                    format_keys(&keys)
                );
                self.fail_many(&message, &SyncError::from(err), blocked.len());
                return ready;
            }
        };

        let mut ready = Vec::new();
        for draft in drafts {
            let missing: BTreeSet<String> =
                draft.references().difference(&existing).cloned().collect();
            if missing.is_empty() {
                ready.push(draft);
            } else {
                self.park(deferred, draft, missing).await;
            }
        }
        ready
    }

    async fn park(
        &self,
        deferred: &DeferredReferences<F>,
        draft: F::Draft,
        missing: BTreeSet<String>,
    ) {
        let key = draft.key().unwrap_or_default().to_owned();
        let record = DeferredRecord::new(key.clone(), draft, missing);

        let Some(record) = deferred.store.save(record).await else {
            self.statistics.increment_failed();
            return;
        };

        let waiting = {
            let mut index = deferred.waiting.lock();
            index.park(&key, &record.missing_references);
            index.len()
        };
        self.statistics.set_waiting_to_be_resolved(waiting as u64);

        let message = format!(
            "Deferred {} draft with key: '{}' until its references '{}' exist.",
            F::NAME,
            key,
            format_keys(&record.missing_references)
        );
        debug!(resource = F::NAME, key = %key, state = ?DraftState::Deferred, "draft parked");
        warn!(resource = F::NAME, key = %key, "{message}");
        self.options.report_warning(&message);
    }

    async fn sync_ready(&self, drafts: Vec<F::Draft>) -> Vec<(String, DraftState)> {
        if drafts.is_empty() {
            return Vec::new();
        }

        let keys = draft_keys(&drafts);
        let existing = match self.service.fetch_matching_by_keys(&keys).await {
            Ok(existing) => existing,
            Err(err) => {
                let message = format!(
                    "Failed to fetch existing {} with keys: '{}'.",
                    F::PLURAL,
                    format_keys(&keys)
                );
                self.fail_many(&message, &SyncError::from(err), drafts.len());
                return drafts
                    .iter()
                    .map(|draft| (draft_key(draft), DraftState::Failed))
                    .collect();
            }
        };

        let by_key: HashMap<String, F::Resource> = existing
            .into_iter()
            .map(|resource| (resource.key().to_owned(), resource))
            .collect();
        let syncs = drafts.into_iter().map(|draft| {
            let old = draft.key().and_then(|key| by_key.get(key)).cloned();
            self.sync_draft(draft, old)
        });
        join_all(syncs).await
    }

    async fn sync_draft(&self, draft: F::Draft, old: Option<F::Resource>) -> (String, DraftState) {
        let key = draft_key(&draft);
        let state = match old {
            Some(old) => {
                debug!(resource = F::NAME, key = %key, state = ?DraftState::Matched);
                self.update_resource(&key, old, &draft).await
            }
            None => {
                debug!(resource = F::NAME, key = %key, state = ?DraftState::Unmatched);
                self.create_resource(&key, draft).await
            }
        };
        self.record(state);
        debug!(resource = F::NAME, key = %key, state = ?state, "draft processed");
        (key, state)
    }

    async fn create_resource(&self, key: &str, draft: F::Draft) -> DraftState {
        let Some(draft) = self.options.apply_before_create(draft) else {
            debug!(resource = F::NAME, key, "draft dropped by before-create hook");
            return DraftState::Skipped;
        };

        match self.service.create(&draft).await {
            Ok(Some(resource)) => {
                self.options.apply_after_create(&resource);
                DraftState::Created
            }
            Ok(None) => {
                warn!(resource = F::NAME, key, "remote returned no resource for create");
                DraftState::Failed
            }
            Err(err) => {
                let message = format!("Failed to create {} with key: '{}'. Reason: {}", F::NAME, key, err);
                self.fail(&message, &SyncError::from(err));
                DraftState::Failed
            }
        }
    }

    async fn update_resource(&self, key: &str, old: F::Resource, draft: &F::Draft) -> DraftState {
        let mut current = old;
        let mut retried = false;

        loop {
            let actions = match F::build_actions(&current, draft) {
                Ok(actions) => actions,
                Err(err) => {
                    let message = format!(
                        "Failed to build update actions for {} with key: '{}'. Reason: {}",
                        F::NAME,
                        key,
                        err
                    );
                    self.fail(&message, &SyncError::from(err));
                    return DraftState::Failed;
                }
            };
            if actions.is_empty() {
                return DraftState::UpToDate;
            }

            let actions = self.options.apply_before_update(actions, draft, &current);
            if actions.is_empty() {
                return DraftState::UpToDate;
            }

            match self.service.update(&current, &actions).await {
                Ok(updated) => {
                    self.options.apply_after_update(&updated, &actions);
                    return DraftState::Updated;
                }
                Err(err) if err.is_conflict() && !retried => {
                    retried = true;
                    debug!(
                        resource = F::NAME,
                        key,
                        version = current.version(),
                        "concurrent modification, fetching latest version"
                    );
                    match self.service.fetch_by_id(current.id()).await {
                        Ok(Some(latest)) => current = latest,
                        Ok(None) => {
                            let cause = RemoteError::NotFound(current.id().to_owned());
                            self.fail_update(key, NOT_FOUND_ON_RETRY, &SyncError::from(cause));
                            return DraftState::Failed;
                        }
                        Err(fetch_err) => {
                            self.fail_update(key, FETCH_ON_RETRY_FAILED, &SyncError::from(fetch_err));
                            return DraftState::Failed;
                        }
                    }
                }
                Err(err) => {
                    let reason = err.to_string();
                    self.fail_update(key, &reason, &SyncError::from(err));
                    return DraftState::Failed;
                }
            }
        }
    }

    /// Releases parked drafts that reached a terminal state and deletes the
    /// records of those that succeeded. Returns the created keys.
    ///
    /// Records of released drafts that failed or were skipped stay staged
    /// until the draft is parked again under the same key.
    async fn settle(&self, outcomes: &[(String, DraftState)]) -> BTreeSet<String> {
        let created: BTreeSet<String> = outcomes
            .iter()
            .filter(|(_, state)| *state == DraftState::Created)
            .map(|(key, _)| key.clone())
            .collect();

        let Some(deferred) = &self.deferred else {
            return created;
        };

        let (released, waiting) = {
            let mut index = deferred.waiting.lock();
            let released: Vec<(String, bool)> = outcomes
                .iter()
                .filter(|(key, _)| index.release(key))
                .map(|(key, state)| (key.clone(), state.is_success()))
                .collect();
            (released, index.len())
        };
        if released.is_empty() {
            return created;
        }

        self.statistics.set_waiting_to_be_resolved(waiting as u64);
        for (key, succeeded) in released {
            if succeeded {
                deferred.store.delete(&key).await;
            }
        }
        created
    }

    async fn resolve_deferred(&self, mut available: BTreeSet<String>) {
        let Some(deferred) = &self.deferred else {
            return;
        };

        while !available.is_empty() {
            let affected = deferred.waiting.lock().waiting_on(&available);
            if affected.is_empty() {
                break;
            }

            let records = match deferred.store.fetch(&affected).await {
                Ok(records) => records,
                Err(err) => {
                    let waiting = {
                        let mut index = deferred.waiting.lock();
                        for key in &affected {
                            index.release(key);
                        }
                        index.len()
                    };
                    self.statistics.set_waiting_to_be_resolved(waiting as u64);
                    let message = format!(
                        "Failed to fetch deferred {} with keys: '{}'.",
                        F::PLURAL,
                        format_keys(&affected)
                    );
                    self.fail_many(&message, &err, affected.len());
                    break;
                }
            };

            let mut ready = Vec::new();
            for mut record in records {
                record
                    .missing_references
                    .retain(|key| !available.contains(key));
                if record.missing_references.is_empty() {
                    debug!(resource = F::NAME, key = %record.key, "references resolved");
                    ready.push(record.draft);
                } else {
                    deferred.store.save(record).await;
                }
            }

            let mut outcomes = Vec::with_capacity(ready.len());
            let mut ready = ready.into_iter().peekable();
            while ready.peek().is_some() {
                let chunk: Vec<F::Draft> =
                    ready.by_ref().take(self.options.batch_size()).collect();
                outcomes.extend(self.sync_ready(chunk).await);
            }
            available = self.settle(&outcomes).await;
        }
    }

    fn record(&self, state: DraftState) {
        match state {
            DraftState::Created => self.statistics.increment_created(),
            DraftState::Updated => self.statistics.increment_updated(),
            DraftState::UpToDate => self.statistics.increment_up_to_date(),
            DraftState::Failed => self.statistics.increment_failed(),
            _ => {}
        }
    }

    fn fail(&self, message: &str, error: &SyncError) {
        warn!(resource = F::NAME, error = %error, "{message}");
        self.options.report_error(message, error);
    }

    fn fail_update(&self, key: &str, reason: &str, error: &SyncError) {
        let message = format!("Failed to update {} with key: '{}'. Reason: {}", F::NAME, key, reason);
        self.fail(&message, error);
    }

    fn fail_invalid(&self, message: &str, reason: &str) {
        self.fail(message, &SyncError::InvalidDraft(reason.to_owned()));
        self.statistics.increment_failed();
    }

    fn fail_many(&self, message: &str, error: &SyncError, count: usize) {
        self.fail(message, error);
        self.statistics.increment_failed_by(count as u64);
    }
}

fn draft_key<D: SyncDraft>(draft: &D) -> String {
    draft.key().unwrap_or_default().to_owned()
}

fn draft_keys<D: SyncDraft>(drafts: &[D]) -> BTreeSet<String> {
    drafts.iter().map(draft_key).collect()
}

fn format_keys(keys: &BTreeSet<String>) -> String {
    let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
    format!("[{}]", keys.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{MemoryResourceService, ServiceCalls};
    use crate::staging::MemoryKeyValueStore;
    use crate::test_family::{memory_service, Item, ItemAction, ItemDraft, Items};
    use async_trait::async_trait;

    type Service = MemoryResourceService<Items>;
    type Engine = SyncEngine<Items, Service>;

    #[derive(Clone, Default)]
    struct Recorded {
        errors: Arc<Mutex<Vec<String>>>,
        warnings: Arc<Mutex<Vec<String>>>,
    }

    impl Recorded {
        fn options(&self) -> SyncOptions<Items> {
            let errors = Arc::clone(&self.errors);
            let warnings = Arc::clone(&self.warnings);
            SyncOptions::new()
                .with_error_callback(move |message, _| errors.lock().push(message.to_owned()))
                .with_warning_callback(move |message| warnings.lock().push(message.to_owned()))
        }

        fn errors(&self) -> Vec<String> {
            self.errors.lock().clone()
        }

        fn warnings(&self) -> Vec<String> {
            self.warnings.lock().clone()
        }
    }

    fn setup() -> (Arc<Service>, Recorded) {
        (Arc::new(memory_service()), Recorded::default())
    }

    fn deferred_engine(
        service: &Arc<Service>,
        options: SyncOptions<Items>,
    ) -> (Engine, Arc<MemoryKeyValueStore>) {
        let store = Arc::new(MemoryKeyValueStore::new());
        let engine = SyncEngine::new(Arc::clone(service), options)
            .with_deferred_references(service.clone(), store.clone());
        (engine, store)
    }

    const CONTAINER: &str = "draftsync.deferred.items";

    fn conflict() -> RemoteError {
        RemoteError::ConcurrentModification {
            expected: 1,
            current: 2,
        }
    }

    #[test]
    fn draft_state_classification() {
        assert!(DraftState::Skipped.is_terminal());
        assert!(DraftState::Deferred.is_terminal());
        assert!(!DraftState::Matched.is_terminal());
        assert!(!DraftState::Received.is_terminal());
        assert!(!DraftState::Validated.is_terminal());
        assert!(DraftState::UpToDate.is_success());
        assert!(!DraftState::Failed.is_success());
        assert!(!DraftState::Skipped.is_success());
    }

    #[test]
    fn waiting_index_tracks_drafts() {
        let mut index = WaitingIndex::default();
        let missing: BTreeSet<String> = ["p1".to_owned(), "p2".to_owned()].into();
        index.park("child", &missing);
        index.park("other", &BTreeSet::from(["p2".to_owned()]));
        assert_eq!(index.len(), 2);

        let affected = index.waiting_on(&BTreeSet::from(["p2".to_owned()]));
        assert_eq!(affected.len(), 2);

        assert!(index.release("other"));
        assert!(!index.release("other"));
        let affected = index.waiting_on(&BTreeSet::from(["p1".to_owned()]));
        assert_eq!(affected, BTreeSet::from(["child".to_owned()]));
    }

    #[test]
    fn keys_format_like_a_list() {
        let keys: BTreeSet<String> = ["b".to_owned(), "a".to_owned()].into();
        assert_eq!(format_keys(&keys), "[a, b]");
        assert_eq!(format_keys(&BTreeSet::new()), "[]");
    }

    #[tokio::test]
    async fn new_draft_is_created() {
        let (service, recorded) = setup();
        let created = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&created);
        let options = recorded
            .options()
            .with_after_create(move |item: &Item| sink.lock().push(item.key.clone()));
        let engine = SyncEngine::new(Arc::clone(&service), options);

        let stats = engine.sync(vec![ItemDraft::new("k1", "First")]).await;

        assert_eq!(stats.created, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.processed(), 1);
        assert_eq!(service.get("k1").unwrap().name, "First");
        assert_eq!(*created.lock(), vec!["k1".to_owned()]);
        assert!(recorded.errors().is_empty());
    }

    #[tokio::test]
    async fn identical_resource_is_up_to_date() {
        let (service, recorded) = setup();
        service.insert(Item::new("id-1", "k1", "Same"));
        let engine = SyncEngine::new(Arc::clone(&service), recorded.options());

        let stats = engine.sync(vec![ItemDraft::new("k1", "Same")]).await;

        assert_eq!(stats.up_to_date, 1);
        assert_eq!(stats.processed(), 1);
        assert_eq!(service.calls().updates, 0);
    }

    #[tokio::test]
    async fn changed_resource_is_updated() {
        let (service, recorded) = setup();
        service.insert(Item::new("id-1", "k1", "Old"));
        let updated = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&updated);
        let options = recorded
            .options()
            .with_after_update(move |item: &Item, actions: &[ItemAction]| {
                sink.lock().push((item.version, actions.len()));
            });
        let engine = SyncEngine::new(Arc::clone(&service), options);

        let stats = engine.sync(vec![ItemDraft::new("k1", "New")]).await;

        assert_eq!(stats.updated, 1);
        assert_eq!(
            service.submitted_updates(),
            vec![("k1".to_owned(), vec![ItemAction::Rename("New".into())])]
        );
        assert_eq!(*updated.lock(), vec![(2, 1)]);
        assert_eq!(service.get("k1").unwrap().name, "New");
    }

    #[tokio::test]
    async fn invalid_drafts_fail_without_remote_calls() {
        let (service, recorded) = setup();
        let engine = SyncEngine::new(Arc::clone(&service), recorded.options());
        let empty_key = ItemDraft {
            key: Some(String::new()),
            ..ItemDraft::without_key("empty")
        };

        let stats = engine
            .sync(vec![None, Some(ItemDraft::without_key("x")), Some(empty_key)])
            .await;

        assert_eq!(stats.failed, 3);
        assert_eq!(stats.processed(), 3);
        assert_eq!(service.calls(), ServiceCalls::default());
        assert_eq!(
            recorded.errors(),
            vec![
                "Failed to process null item draft.",
                "Failed to process item draft without key.",
                "Failed to process item draft without key.",
            ]
        );
    }

    #[tokio::test]
    async fn conflict_is_retried_once_after_refetch() {
        let (service, recorded) = setup();
        service.insert(Item::new("id-1", "k1", "Old"));
        service.fail_next_update(conflict());
        let engine = SyncEngine::new(Arc::clone(&service), recorded.options());

        let stats = engine.sync(vec![ItemDraft::new("k1", "New")]).await;

        assert_eq!(stats.updated, 1);
        assert_eq!(stats.failed, 0);
        assert!(recorded.errors().is_empty());
        let calls = service.calls();
        assert_eq!(calls.updates, 2);
        assert_eq!(calls.fetches, 1);
    }

    #[tokio::test]
    async fn refetch_failure_is_reported_distinctly() {
        let (service, recorded) = setup();
        service.insert(Item::new("id-1", "k1", "Old"));
        service.fail_next_update(conflict());
        service.fail_next_fetch(RemoteError::other("timeout"));
        let engine = SyncEngine::new(Arc::clone(&service), recorded.options());

        let stats = engine.sync(vec![ItemDraft::new("k1", "New")]).await;

        assert_eq!(stats.failed, 1);
        assert_eq!(
            recorded.errors(),
            vec![
                "Failed to update item with key: 'k1'. Reason: Failed to fetch from remote while retrying after concurrency modification."
            ]
        );
    }

    #[tokio::test]
    async fn refetch_miss_is_reported_distinctly() {
        let (service, recorded) = setup();
        service.insert(Item::new("id-1", "k1", "Old"));
        service.fail_next_update(conflict());
        service.miss_next_fetch();
        let engine = SyncEngine::new(Arc::clone(&service), recorded.options());

        let stats = engine.sync(vec![ItemDraft::new("k1", "New")]).await;

        assert_eq!(stats.failed, 1);
        assert_eq!(
            recorded.errors(),
            vec![
                "Failed to update item with key: 'k1'. Reason: Not found when attempting to fetch while retrying after concurrency modification."
            ]
        );
    }

    #[tokio::test]
    async fn conflict_on_retry_is_terminal() {
        let (service, recorded) = setup();
        service.insert(Item::new("id-1", "k1", "Old"));
        let remote = Arc::clone(&service);
        let options = recorded.options().with_before_update(move |actions, _, old: &Item| {
            // Someone else writes between our read and our update.
            let mut concurrent = old.clone();
            concurrent.version += 1;
            remote.insert(concurrent);
            actions
        });
        let engine = SyncEngine::new(Arc::clone(&service), options);

        let stats = engine.sync(vec![ItemDraft::new("k1", "New")]).await;

        assert_eq!(stats.failed, 1);
        assert_eq!(service.calls().updates, 2);
        assert_eq!(service.calls().fetches, 1);
        let errors = recorded.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with(
            "Failed to update item with key: 'k1'. Reason: concurrent modification"
        ));
    }

    #[tokio::test]
    async fn other_update_failures_are_not_retried() {
        let (service, recorded) = setup();
        service.insert(Item::new("id-1", "k1", "Old"));
        service.fail_next_update(RemoteError::Validation("name too long".into()));
        let engine = SyncEngine::new(Arc::clone(&service), recorded.options());

        let stats = engine.sync(vec![ItemDraft::new("k1", "New")]).await;

        assert_eq!(stats.failed, 1);
        assert_eq!(service.calls().fetches, 0);
        assert_eq!(
            recorded.errors(),
            vec!["Failed to update item with key: 'k1'. Reason: validation failed: name too long"]
        );
    }

    #[tokio::test]
    async fn create_failures() {
        let (service, recorded) = setup();
        service.fail_next_create(RemoteError::other("down"));
        service.reject_next_create();
        let engine = SyncEngine::new(Arc::clone(&service), recorded.options().with_batch_size(1));

        let stats = engine
            .sync(vec![ItemDraft::new("a", "A"), ItemDraft::new("b", "B")])
            .await;

        assert_eq!(stats.failed, 2);
        assert_eq!(
            recorded.errors(),
            vec!["Failed to create item with key: 'a'. Reason: remote error: down"]
        );
    }

    #[tokio::test]
    async fn before_create_veto_is_counted_nowhere() {
        let (service, recorded) = setup();
        let options = recorded.options().with_before_create(|_| None);
        let engine = SyncEngine::new(Arc::clone(&service), options);

        let stats = engine.sync(vec![ItemDraft::new("a", "A")]).await;

        assert_eq!(stats.processed(), 0);
        assert_eq!(service.calls().creates, 0);
        assert!(service.is_empty());
    }

    #[tokio::test]
    async fn before_update_emptying_actions_means_up_to_date() {
        let (service, recorded) = setup();
        service.insert(Item::new("id-1", "k1", "Old"));
        let options = recorded.options().with_before_update(|_, _, _| Vec::new());
        let engine = SyncEngine::new(Arc::clone(&service), options);

        let stats = engine.sync(vec![ItemDraft::new("k1", "New")]).await;

        assert_eq!(stats.up_to_date, 1);
        assert_eq!(service.calls().updates, 0);
    }

    #[tokio::test]
    async fn lookup_failure_fails_the_batch() {
        let (service, recorded) = setup();
        service.fail_next_lookup(RemoteError::other("unavailable"));
        let engine = SyncEngine::new(Arc::clone(&service), recorded.options().with_batch_size(2));

        let stats = engine
            .sync(vec![
                ItemDraft::new("b", "B"),
                ItemDraft::new("a", "A"),
                ItemDraft::new("c", "C"),
            ])
            .await;

        assert_eq!(stats.failed, 2);
        assert_eq!(stats.created, 1);
        assert_eq!(
            recorded.errors(),
            vec!["Failed to fetch existing items with keys: '[a, b]'."]
        );
        assert_eq!(service.calls().creates, 1);
    }

    #[tokio::test]
    async fn diff_failure_is_reported() {
        let (service, recorded) = setup();
        service.insert(Item::new("id-1", "k1", "Old"));
        let engine = SyncEngine::new(Arc::clone(&service), recorded.options());

        let stats = engine.sync(vec![ItemDraft::new("k1", "!bad")]).await;

        assert_eq!(stats.failed, 1);
        assert_eq!(
            recorded.errors(),
            vec![
                "Failed to build update actions for item with key: 'k1'. Reason: unsupported change of name: reserved prefix"
            ]
        );
    }

    #[tokio::test]
    async fn drafts_are_looked_up_per_batch() {
        let (service, recorded) = setup();
        let engine = SyncEngine::new(Arc::clone(&service), recorded.options().with_batch_size(2));
        let drafts: Vec<ItemDraft> = (0..5)
            .map(|i| ItemDraft::new(&format!("k{i}"), "Name"))
            .collect();

        let stats = engine.sync(drafts).await;

        assert_eq!(stats.created, 5);
        let sizes: Vec<usize> = service.lookup_batches().iter().map(BTreeSet::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn statistics_accumulate_across_calls() {
        let (service, recorded) = setup();
        let engine = SyncEngine::new(Arc::clone(&service), recorded.options());

        engine.sync(vec![ItemDraft::new("a", "A")]).await;
        let stats = engine
            .sync(vec![ItemDraft::new("a", "A2"), ItemDraft::new("b", "B")])
            .await;

        assert_eq!(stats.created, 2);
        assert_eq!(stats.updated, 1);
        assert_eq!(engine.statistics(), stats);
        assert_eq!(
            stats.report_message(),
            "Summary: 3 items were processed in total (2 created, 1 updated, 0 failed to sync and 0 items with missing references)."
        );
    }

    #[tokio::test]
    async fn child_waits_for_parent_in_same_call() {
        let (service, recorded) = setup();
        let (engine, store) = deferred_engine(&service, recorded.options());

        let stats = engine
            .sync(vec![
                ItemDraft::new("child", "Child").requiring(["parent"]),
                ItemDraft::new("parent", "Parent"),
            ])
            .await;

        assert_eq!(stats.created, 2);
        assert_eq!(stats.waiting_to_be_resolved, 0);
        assert!(service.get("child").is_some());
        assert_eq!(store.len(CONTAINER), 0);
        assert!(engine.waiting_drafts().is_empty());
        assert_eq!(
            recorded.warnings(),
            vec!["Deferred item draft with key: 'child' until its references '[parent]' exist."]
        );
        assert!(recorded.errors().is_empty());
    }

    #[tokio::test]
    async fn unresolved_child_stays_parked() {
        let (service, recorded) = setup();
        let (engine, store) = deferred_engine(&service, recorded.options());

        let stats = engine
            .sync(vec![ItemDraft::new("child", "Child").requiring(["parent"])])
            .await;

        assert_eq!(stats.processed(), 0);
        assert_eq!(stats.waiting_to_be_resolved, 1);
        assert_eq!(store.len(CONTAINER), 1);
        assert_eq!(engine.waiting_drafts(), BTreeSet::from(["child".to_owned()]));
        assert_eq!(service.calls().creates, 0);

        let stats = engine.sync(vec![ItemDraft::new("parent", "Parent")]).await;

        assert_eq!(stats.created, 2);
        assert_eq!(stats.waiting_to_be_resolved, 0);
        assert_eq!(store.len(CONTAINER), 0);
    }

    #[tokio::test]
    async fn chains_resolve_level_by_level() {
        let (service, recorded) = setup();
        let (engine, store) = deferred_engine(&service, recorded.options().with_batch_size(1));

        let stats = engine
            .sync(vec![
                ItemDraft::new("grandchild", "Grandchild").requiring(["child"]),
                ItemDraft::new("child", "Child").requiring(["root"]),
                ItemDraft::new("root", "Root"),
            ])
            .await;

        assert_eq!(stats.created, 3);
        assert_eq!(stats.waiting_to_be_resolved, 0);
        assert_eq!(store.len(CONTAINER), 0);
    }

    #[tokio::test]
    async fn partially_resolved_draft_keeps_waiting() {
        let (service, recorded) = setup();
        let (engine, store) = deferred_engine(&service, recorded.options());

        let stats = engine
            .sync(vec![
                ItemDraft::new("child", "Child").requiring(["p1", "p2"]),
                ItemDraft::new("p1", "P1"),
            ])
            .await;

        assert_eq!(stats.created, 1);
        assert_eq!(stats.waiting_to_be_resolved, 1);
        let stored = store.get(CONTAINER, "child").unwrap();
        assert_eq!(stored["missing_references"], serde_json::json!(["p2"]));

        let stats = engine.sync(vec![ItemDraft::new("p2", "P2")]).await;
        assert_eq!(stats.created, 3);
        assert_eq!(store.len(CONTAINER), 0);
    }

    #[tokio::test]
    async fn failed_save_counts_as_failed() {
        let (service, recorded) = setup();
        let (engine, store) = deferred_engine(&service, recorded.options());
        store.fail_next(RemoteError::other("unavailable"));

        let stats = engine
            .sync(vec![ItemDraft::new("child", "Child").requiring(["parent"])])
            .await;

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.waiting_to_be_resolved, 0);
        assert_eq!(
            recorded.errors(),
            vec!["Failed to save deferred draft with key: 'child'. Reason: remote error: unavailable"]
        );
    }

    struct UnavailableResolver;

    #[async_trait]
    impl ReferenceResolver for UnavailableResolver {
        async fn existing_keys(
            &self,
            _keys: &BTreeSet<String>,
        ) -> Result<BTreeSet<String>, RemoteError> {
            Err(RemoteError::other("unavailable"))
        }
    }

    #[tokio::test]
    async fn resolver_failure_fails_drafts_with_references() {
        let (service, recorded) = setup();
        let engine = SyncEngine::new(Arc::clone(&service), recorded.options())
            .with_deferred_references(
                Arc::new(UnavailableResolver),
                Arc::new(MemoryKeyValueStore::new()),
            );

        let stats = engine
            .sync(vec![
                ItemDraft::new("child", "Child").requiring(["parent"]),
                ItemDraft::new("plain", "Plain"),
            ])
            .await;

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.created, 1);
        assert_eq!(
            recorded.errors(),
            vec!["Failed to resolve references of items with keys: '[child]'."]
        );
    }

    #[tokio::test]
    async fn existing_references_do_not_park() {
        let (service, recorded) = setup();
        service.insert(Item::new("id-1", "parent", "Parent"));
        let (engine, store) = deferred_engine(&service, recorded.options());

        let stats = engine
            .sync(vec![ItemDraft::new("child", "Child").requiring(["parent"])])
            .await;

        assert_eq!(stats.created, 1);
        assert_eq!(store.len(CONTAINER), 0);
        assert!(recorded.warnings().is_empty());
        assert_eq!(service.calls().resolutions, 1);
    }

    #[tokio::test]
    async fn released_drafts_are_synced_in_batches() {
        let (service, recorded) = setup();
        let (engine, store) = deferred_engine(&service, recorded.options().with_batch_size(2));
        let children: Vec<ItemDraft> = (1..=5)
            .map(|index| {
                ItemDraft::new(&format!("child-{index}"), "Child").requiring(["parent"])
            })
            .collect();

        let stats = engine.sync(children).await;
        assert_eq!(stats.waiting_to_be_resolved, 5);

        let stats = engine.sync(vec![ItemDraft::new("parent", "Parent")]).await;

        assert_eq!(stats.created, 6);
        assert_eq!(stats.waiting_to_be_resolved, 0);
        assert_eq!(store.len(CONTAINER), 0);
        let sizes: Vec<usize> = service.lookup_batches().iter().map(BTreeSet::len).collect();
        assert_eq!(sizes, vec![1, 2, 2, 1]);
    }

    #[tokio::test]
    async fn staging_fetch_failure_releases_waiting_drafts_as_failed() {
        let (service, recorded) = setup();
        let (engine, store) = deferred_engine(&service, recorded.options());
        engine
            .sync(vec![ItemDraft::new("child", "Child").requiring(["parent"])])
            .await;
        store.fail_next(RemoteError::other("unavailable"));

        let stats = engine.sync(vec![ItemDraft::new("parent", "Parent")]).await;

        assert_eq!(stats.created, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.waiting_to_be_resolved, 0);
        assert!(engine.waiting_drafts().is_empty());
        assert_eq!(store.len(CONTAINER), 1);
        assert_eq!(
            recorded.errors(),
            vec!["Failed to fetch deferred items with keys: '[child]'."]
        );

        let stats = engine.sync(vec![ItemDraft::new("other", "Other")]).await;
        assert_eq!(stats.created, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.waiting_to_be_resolved, 0);
        assert!(service.get("child").is_none());
    }

    #[tokio::test]
    async fn skipped_resolved_draft_keeps_its_record() {
        let (service, recorded) = setup();
        let options = recorded.options().with_before_create(|draft: ItemDraft| {
            (draft.key() != Some("child")).then_some(draft)
        });
        let (engine, store) = deferred_engine(&service, options);

        let stats = engine
            .sync(vec![
                ItemDraft::new("child", "Child").requiring(["parent"]),
                ItemDraft::new("parent", "Parent"),
            ])
            .await;

        assert_eq!(stats.created, 1);
        assert_eq!(stats.waiting_to_be_resolved, 0);
        assert!(engine.waiting_drafts().is_empty());
        assert!(service.get("child").is_none());
        assert!(store.get(CONTAINER, "child").is_some());
    }
}
