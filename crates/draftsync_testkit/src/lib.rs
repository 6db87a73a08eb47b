//! # draftsync Testkit
//!
//! Test utilities for draftsync.
//!
//! This crate provides:
//! - Callback recorders and a sync harness over the in-memory collaborators
//! - Property-based test generators using proptest
//! - A reference model applying reconciler actions to a plain list
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use draftsync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn test_with_harness() {
//!     let harness = SyncHarness::new(Categories::memory_service());
//!     let stats = harness.engine().sync(drafts).await;
//!     assert_eq!(stats.failed, 0);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod model;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::model::*;
    pub use draftsync_families::{Categories, CustomTypes, ProductTypes};
}

pub use fixtures::*;
pub use generators::*;
pub use model::*;
