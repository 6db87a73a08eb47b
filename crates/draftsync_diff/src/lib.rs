//! # draftsync diff
//!
//! Diffing primitives for draftsync.
//!
//! This crate provides:
//! - Field-level operation builders (`build_update_action` and friends)
//! - The ordered-collection reconciler for keyed sub-lists
//! - The `ResourceDiff` trait each resource family implements
//!
//! This is a pure crate with no I/O operations.
//!
//! ## Key Invariants
//!
//! - Equal values never produce an operation
//! - Operation order is deterministic for a given input
//! - Duplicate keys inside one collection are always an error

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod builder;
pub mod collection;
mod error;
mod resource;

pub use builder::{build_optional_update_action, build_present_update_action, build_update_action};
pub use collection::{reconcile, AddPlacement, CollectionPolicy, KeyedElement};
pub use error::{DiffError, DiffResult};
pub use resource::ResourceDiff;
