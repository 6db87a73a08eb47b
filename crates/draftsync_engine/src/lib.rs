//! # draftsync engine
//!
//! Batch sync orchestrator for draftsync.
//!
//! This crate provides:
//! - The sync engine matching drafts to existing resources by key
//! - Lifecycle hooks and callbacks (`SyncOptions`)
//! - Optimistic concurrency recovery with a single re-fetch and retry
//! - Staging of drafts whose references do not exist yet
//! - Thread-safe sync statistics
//! - In-memory remote collaborators for tests and embedding
//!
//! ## Architecture
//!
//! Drafts are processed in batches of `batch_size`:
//! 1. Validate drafts (null drafts and drafts without key fail)
//! 2. Park drafts with missing references, if staging is enabled
//! 3. Look up existing resources for the whole batch with one call
//! 4. Create or diff and update every draft concurrently
//! 5. Retry drafts whose references were created by the batch
//!
//! ## Key Invariants
//!
//! - Drafts always win; there is no bidirectional merge
//! - Every processed draft increments exactly one counter
//! - `processed == created + updated + up_to_date + failed`
//! - At most one conflict retry per draft and sync call
//! - No failure escapes `SyncEngine::sync`

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod family;
mod service;
mod staging;
mod state;
mod stats;

#[cfg(test)]
mod test_family;

pub use config::{ErrorCallback, SyncOptions, WarningCallback, BATCH_SIZE_DEFAULT};
pub use error::{RemoteError, SyncError, SyncResult};
pub use family::{RemoteResource, ResourceFamily, SyncDraft};
pub use service::{MemoryResourceService, ReferenceResolver, ResourceService, ServiceCalls};
pub use staging::{DeferredRecord, DeferredReferenceStore, KeyValueStore, MemoryKeyValueStore};
pub use state::{DraftState, SyncEngine};
pub use stats::{ProcessingTime, StatisticsSnapshot, SyncStatistics};

/// Re-exported so families and callers can name the diff types.
pub use draftsync_diff as diff;
