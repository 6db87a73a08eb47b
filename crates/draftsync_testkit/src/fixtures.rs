//! Test fixtures and sync helpers.
//!
//! Provides callback recorders, a harness wiring an engine to the in-memory
//! collaborators, and tracing setup.

use draftsync_engine::{
    MemoryKeyValueStore, MemoryResourceService, ResourceFamily, SyncEngine, SyncOptions,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Installs a test-writer tracing subscriber honoring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Records the messages passed to the error and warning callbacks.
#[derive(Debug, Default, Clone)]
pub struct CallbackRecorder {
    errors: Arc<Mutex<Vec<String>>>,
    warnings: Arc<Mutex<Vec<String>>>,
}

impl CallbackRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns options whose callbacks record into this recorder.
    pub fn options<F: ResourceFamily>(&self) -> SyncOptions<F> {
        let errors = Arc::clone(&self.errors);
        let warnings = Arc::clone(&self.warnings);
        SyncOptions::new()
            .with_error_callback(move |message, _| errors.lock().push(message.to_owned()))
            .with_warning_callback(move |message| warnings.lock().push(message.to_owned()))
    }

    /// Returns the recorded error messages.
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    /// Returns the recorded warning messages.
    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().clone()
    }

    /// Forgets every recorded message.
    pub fn clear(&self) {
        self.errors.lock().clear();
        self.warnings.lock().clear();
    }
}

/// An engine over the in-memory collaborators of one family.
pub type MemoryEngine<F> = SyncEngine<F, MemoryResourceService<F>>;

/// Wires engines to one in-memory service, staging store and recorder.
pub struct SyncHarness<F: ResourceFamily> {
    /// The remote service.
    pub service: Arc<MemoryResourceService<F>>,
    /// The staging store for deferred drafts.
    pub store: Arc<MemoryKeyValueStore>,
    /// Recorder for callback messages.
    pub recorder: CallbackRecorder,
}

impl<F: ResourceFamily> SyncHarness<F> {
    /// Creates a harness around `service`.
    pub fn new(service: MemoryResourceService<F>) -> Self {
        Self {
            service: Arc::new(service),
            store: Arc::new(MemoryKeyValueStore::new()),
            recorder: CallbackRecorder::new(),
        }
    }

    /// Returns recording options for this family.
    pub fn options(&self) -> SyncOptions<F> {
        self.recorder.options()
    }

    /// Creates an engine without deferred staging.
    pub fn engine(&self) -> MemoryEngine<F> {
        self.engine_with(self.options())
    }

    /// Creates an engine without deferred staging using `options`.
    pub fn engine_with(&self, options: SyncOptions<F>) -> MemoryEngine<F> {
        SyncEngine::new(Arc::clone(&self.service), options)
    }

    /// Creates an engine resolving references against the service and
    /// parking drafts in the store.
    pub fn deferred_engine(&self) -> MemoryEngine<F> {
        self.engine().with_deferred_references(self.service.clone(), self.store.clone())
    }

    /// Returns the number of staged records of this family.
    pub fn staged(&self) -> usize {
        self.store.len(&F::staging_container())
    }
}
