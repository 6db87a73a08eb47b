//! The per-family diff contract.

use crate::error::DiffResult;

/// Builds the update actions that turn an existing resource into a draft.
///
/// Implementations compare fields in a fixed order and concatenate the
/// field-level results with any collection reconciliation. An empty result
/// means the resource is already up to date.
pub trait ResourceDiff {
    /// The resource as stored on the remote.
    type Resource;
    /// The desired state of a resource.
    type Draft;
    /// One atomic change the remote can apply.
    type Action;

    /// Builds the actions turning `old` into `new`.
    fn build_actions(old: &Self::Resource, new: &Self::Draft) -> DiffResult<Vec<Self::Action>>;
}
