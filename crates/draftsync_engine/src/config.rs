//! Configuration and lifecycle hooks for the sync engine.

use crate::error::SyncError;
use crate::family::ResourceFamily;
use std::fmt;
use std::sync::Arc;

/// Number of drafts processed per batch unless configured otherwise.
pub const BATCH_SIZE_DEFAULT: usize = 30;

/// Receives a human-readable message and the error behind a failed draft.
pub type ErrorCallback = Arc<dyn Fn(&str, &SyncError) + Send + Sync>;

/// Receives a human-readable warning.
pub type WarningCallback = Arc<dyn Fn(&str) + Send + Sync>;

type BeforeCreate<D> = Arc<dyn Fn(D) -> Option<D> + Send + Sync>;
type BeforeUpdate<D, R, A> = Arc<dyn Fn(Vec<A>, &D, &R) -> Vec<A> + Send + Sync>;
type AfterCreate<R> = Arc<dyn Fn(&R) + Send + Sync>;
type AfterUpdate<R, A> = Arc<dyn Fn(&R, &[A]) + Send + Sync>;

/// Options for syncing one resource family.
///
/// Every hook is optional. Absent filtering hooks pass their input through
/// and absent callbacks do nothing.
pub struct SyncOptions<F: ResourceFamily> {
    batch_size: usize,
    before_create: Option<BeforeCreate<F::Draft>>,
    before_update: Option<BeforeUpdate<F::Draft, F::Resource, F::Action>>,
    after_create: Option<AfterCreate<F::Resource>>,
    after_update: Option<AfterUpdate<F::Resource, F::Action>>,
    error_callback: Option<ErrorCallback>,
    warning_callback: Option<WarningCallback>,
}

impl<F: ResourceFamily> SyncOptions<F> {
    /// Creates options with the default batch size and no hooks.
    pub fn new() -> Self {
        Self {
            batch_size: BATCH_SIZE_DEFAULT,
            before_create: None,
            before_update: None,
            after_create: None,
            after_update: None,
            error_callback: None,
            warning_callback: None,
        }
    }

    /// Sets the batch size. Zero falls back to [`BATCH_SIZE_DEFAULT`].
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = if size == 0 { BATCH_SIZE_DEFAULT } else { size };
        self
    }

    /// Sets the hook run on a draft before it is created.
    ///
    /// Returning `None` skips the draft.
    pub fn with_before_create(
        mut self,
        hook: impl Fn(F::Draft) -> Option<F::Draft> + Send + Sync + 'static,
    ) -> Self {
        self.before_create = Some(Arc::new(hook));
        self
    }

    /// Sets the hook filtering a non-empty action list before it is submitted.
    pub fn with_before_update(
        mut self,
        hook: impl Fn(Vec<F::Action>, &F::Draft, &F::Resource) -> Vec<F::Action> + Send + Sync + 'static,
    ) -> Self {
        self.before_update = Some(Arc::new(hook));
        self
    }

    /// Sets the hook run on every created resource.
    pub fn with_after_create(mut self, hook: impl Fn(&F::Resource) + Send + Sync + 'static) -> Self {
        self.after_create = Some(Arc::new(hook));
        self
    }

    /// Sets the hook run on every updated resource with the applied actions.
    pub fn with_after_update(
        mut self,
        hook: impl Fn(&F::Resource, &[F::Action]) + Send + Sync + 'static,
    ) -> Self {
        self.after_update = Some(Arc::new(hook));
        self
    }

    /// Sets the callback invoked for every failure.
    pub fn with_error_callback(
        mut self,
        callback: impl Fn(&str, &SyncError) + Send + Sync + 'static,
    ) -> Self {
        self.error_callback = Some(Arc::new(callback));
        self
    }

    /// Sets the callback invoked for every warning.
    pub fn with_warning_callback(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.warning_callback = Some(Arc::new(callback));
        self
    }

    /// Returns the batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns the error callback, if set.
    pub fn error_callback(&self) -> Option<&ErrorCallback> {
        self.error_callback.as_ref()
    }

    pub(crate) fn apply_before_create(&self, draft: F::Draft) -> Option<F::Draft> {
        match &self.before_create {
            Some(hook) => hook(draft),
            None => Some(draft),
        }
    }

    pub(crate) fn apply_before_update(
        &self,
        actions: Vec<F::Action>,
        draft: &F::Draft,
        old: &F::Resource,
    ) -> Vec<F::Action> {
        match &self.before_update {
            Some(hook) if !actions.is_empty() => hook(actions, draft, old),
            _ => actions,
        }
    }

    pub(crate) fn apply_after_create(&self, resource: &F::Resource) {
        if let Some(hook) = &self.after_create {
            hook(resource);
        }
    }

    pub(crate) fn apply_after_update(&self, resource: &F::Resource, actions: &[F::Action]) {
        if let Some(hook) = &self.after_update {
            hook(resource, actions);
        }
    }

    pub(crate) fn report_error(&self, message: &str, error: &SyncError) {
        if let Some(callback) = &self.error_callback {
            callback(message, error);
        }
    }

    pub(crate) fn report_warning(&self, message: &str) {
        if let Some(callback) = &self.warning_callback {
            callback(message);
        }
    }
}

impl<F: ResourceFamily> Default for SyncOptions<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ResourceFamily> Clone for SyncOptions<F> {
    fn clone(&self) -> Self {
        Self {
            batch_size: self.batch_size,
            before_create: self.before_create.clone(),
            before_update: self.before_update.clone(),
            after_create: self.after_create.clone(),
            after_update: self.after_update.clone(),
            error_callback: self.error_callback.clone(),
            warning_callback: self.warning_callback.clone(),
        }
    }
}

impl<F: ResourceFamily> fmt::Debug for SyncOptions<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOptions")
            .field("resource", &F::NAME)
            .field("batch_size", &self.batch_size)
            .field("before_create", &self.before_create.is_some())
            .field("before_update", &self.before_update.is_some())
            .field("after_create", &self.after_create.is_some())
            .field("after_update", &self.after_update.is_some())
            .field("error_callback", &self.error_callback.is_some())
            .field("warning_callback", &self.warning_callback.is_some())
            .finish()
    }
}
