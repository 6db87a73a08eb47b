//! Resource family contracts.
//!
//! A family ties together the draft, remote resource and action types of one
//! remote resource type with the diff that relates them.

use draftsync_diff::ResourceDiff;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Desired state of one resource.
pub trait SyncDraft: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Returns the key identifying the resource, if set.
    fn key(&self) -> Option<&str>;

    /// Returns the keys of other resources this draft refers to.
    fn references(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }
}

/// Current state of one resource as stored by the remote.
pub trait RemoteResource: Clone + fmt::Debug + Send + Sync + 'static {
    /// Returns the remote-assigned id.
    fn id(&self) -> &str;

    /// Returns the key the resource is matched by.
    fn key(&self) -> &str;

    /// Returns the optimistic concurrency version.
    fn version(&self) -> u64;
}

/// One remote resource type.
pub trait ResourceFamily:
    ResourceDiff<
        Draft: SyncDraft,
        Resource: RemoteResource,
        Action: Clone + fmt::Debug + Send + Sync + 'static,
    > + Send
    + Sync
    + 'static
{
    /// Singular name used in messages, e.g. `category`.
    const NAME: &'static str;

    /// Plural name used in messages, e.g. `categories`.
    const PLURAL: &'static str;

    /// Returns the staging container for deferred drafts of this family.
    fn staging_container() -> String {
        format!("draftsync.deferred.{}", Self::PLURAL)
    }
}
