//! Field-level operation builders.
//!
//! Each builder compares one field of an existing resource with the same
//! field of a draft and yields at most one action. A resource diff is the
//! concatenation of these results in a fixed field order:
//!
//! ```
//! use draftsync_diff::{build_optional_update_action, build_update_action};
//!
//! #[derive(Debug, PartialEq)]
//! enum Action {
//!     ChangeName(String),
//!     SetDescription(Option<String>),
//! }
//!
//! let actions: Vec<Action> = [
//!     build_update_action("shoes", "boots", || Action::ChangeName("boots".into())),
//!     build_optional_update_action(
//!         Some("old"),
//!         None,
//!         |d: &str| Action::SetDescription(Some(d.to_owned())),
//!         || Action::SetDescription(None),
//!     ),
//! ]
//! .into_iter()
//! .flatten()
//! .collect();
//!
//! assert_eq!(
//!     actions,
//!     vec![Action::ChangeName("boots".into()), Action::SetDescription(None)]
//! );
//! ```

/// Builds an action when `old` and `new` differ.
///
/// Equality is structural (`PartialEq`), so composite values such as
/// localized strings compare by content.
pub fn build_update_action<T, A, F>(old: &T, new: &T, action: F) -> Option<A>
where
    T: PartialEq + ?Sized,
    F: FnOnce() -> A,
{
    if old == new {
        None
    } else {
        Some(action())
    }
}

/// Builds an action for a field the remote can unset.
///
/// A present new value that differs yields `set(new)`. An absent new value
/// yields `unset()` only when the old value was present.
pub fn build_optional_update_action<T, A, S, U>(
    old: Option<&T>,
    new: Option<&T>,
    set: S,
    unset: U,
) -> Option<A>
where
    T: PartialEq + ?Sized,
    S: FnOnce(&T) -> A,
    U: FnOnce() -> A,
{
    match (old, new) {
        (Some(old), Some(new)) if old == new => None,
        (_, Some(new)) => Some(set(new)),
        (Some(_), None) => Some(unset()),
        (None, None) => None,
    }
}

/// Builds an action for a field the remote cannot unset.
///
/// An absent new value never yields an action.
pub fn build_present_update_action<T, A, S>(old: Option<&T>, new: Option<&T>, set: S) -> Option<A>
where
    T: PartialEq + ?Sized,
    S: FnOnce(&T) -> A,
{
    match new {
        Some(new) if old != Some(new) => Some(set(new)),
        _ => None,
    }
}
