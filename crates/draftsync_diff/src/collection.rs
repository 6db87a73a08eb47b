//! Ordered-collection reconciliation.
//!
//! Reconciles an old ordered list of keyed elements against a new one. Elements
//! are matched by key, never by position. The emitted actions are, in order:
//!
//! 1. removals for keys only present in the old list
//! 2. one add per key only present in the new list
//! 3. element changes for keys present in both
//! 4. a single reorder carrying the complete new order, if needed
//!
//! What each step produces is decided by a [`CollectionPolicy`], so one
//! algorithm serves every resource family.

use crate::error::{DiffError, DiffResult};
use std::collections::HashMap;

/// An element of an ordered collection, identified by a stable key.
pub trait KeyedElement {
    /// Returns the key, unique within the owning list.
    fn key(&self) -> &str;
}

/// How the remote places newly added elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddPlacement {
    /// Added elements are appended to the end of the list.
    #[default]
    Append,
    /// Added elements are inserted at the position they carry.
    AtPosition,
}

/// Builds the actions of one family for one kind of ordered collection.
///
/// `remove` and `change` default to building nothing, for remotes that cannot
/// remove or modify elements of the collection. `reorder` defaults to `None`
/// for collections the remote keeps unordered.
pub trait CollectionPolicy {
    /// The element type of the collection.
    type Element: KeyedElement;
    /// The action type of the family.
    type Action;

    /// Describes the collection in error messages.
    fn collection_name(&self) -> String;

    /// Returns where the remote places added elements.
    fn placement(&self) -> AddPlacement {
        AddPlacement::Append
    }

    /// Builds the removal of `removed`, one action per element or a single
    /// batched action.
    fn remove(&self, removed: &[&Self::Element]) -> Vec<Self::Action> {
        let _ = removed;
        Vec::new()
    }

    /// Builds the actions turning `old` into `new`; both share a key.
    fn change(&self, old: &Self::Element, new: &Self::Element) -> DiffResult<Vec<Self::Action>> {
        let _ = (old, new);
        Ok(Vec::new())
    }

    /// Builds the addition of `element` at `position` of the new list.
    fn add(&self, element: &Self::Element, position: usize) -> Self::Action;

    /// Builds a reorder to the complete new order.
    fn reorder(&self, new_order: &[&Self::Element]) -> Option<Self::Action> {
        let _ = new_order;
        None
    }
}

/// Reconciles `old` against `new` using `policy`.
///
/// An absent `new` list removes every old element. Duplicate keys in either
/// list fail before any action is built.
pub fn reconcile<P: CollectionPolicy>(
    policy: &P,
    old: &[P::Element],
    new: Option<&[P::Element]>,
) -> DiffResult<Vec<P::Action>> {
    let old_index = index_by_key(policy, old)?;

    let Some(new) = new else {
        if old.is_empty() {
            return Ok(Vec::new());
        }
        let removed: Vec<&P::Element> = old.iter().collect();
        return Ok(policy.remove(&removed));
    };

    let new_index = index_by_key(policy, new)?;
    let mut actions = Vec::new();

    let removed: Vec<&P::Element> = old
        .iter()
        .filter(|element| !new_index.contains_key(element.key()))
        .collect();
    if !removed.is_empty() {
        actions.extend(policy.remove(&removed));
    }

    for (position, element) in new.iter().enumerate() {
        if !old_index.contains_key(element.key()) {
            actions.push(policy.add(element, position));
        }
    }

    for element in new {
        if let Some(old_element) = old_index.get(element.key()) {
            actions.extend(policy.change(old_element, element)?);
        }
    }

    if needs_reorder(policy.placement(), old, new, &old_index, &new_index) {
        let new_order: Vec<&P::Element> = new.iter().collect();
        actions.extend(policy.reorder(&new_order));
    }

    Ok(actions)
}

fn index_by_key<'a, P: CollectionPolicy>(
    policy: &P,
    elements: &'a [P::Element],
) -> DiffResult<HashMap<&'a str, &'a P::Element>> {
    let mut index = HashMap::with_capacity(elements.len());
    for element in elements {
        if index.insert(element.key(), element).is_some() {
            return Err(DiffError::duplicate_key(
                policy.collection_name(),
                element.key(),
            ));
        }
    }
    Ok(index)
}

/// Compares the order the remote ends up with after removals and adds against
/// the new order. Keys removed from the old list are ignored.
fn needs_reorder<E: KeyedElement>(
    placement: AddPlacement,
    old: &[E],
    new: &[E],
    old_index: &HashMap<&str, &E>,
    new_index: &HashMap<&str, &E>,
) -> bool {
    let retained = old
        .iter()
        .map(KeyedElement::key)
        .filter(|key| new_index.contains_key(key));

    match placement {
        AddPlacement::Append => {
            let added = new
                .iter()
                .map(KeyedElement::key)
                .filter(|key| !old_index.contains_key(key));
            !retained.chain(added).eq(new.iter().map(KeyedElement::key))
        }
        AddPlacement::AtPosition => {
            let common = new
                .iter()
                .map(KeyedElement::key)
                .filter(|key| old_index.contains_key(key));
            !retained.eq(common)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Value {
        key: String,
        label: String,
    }

    impl KeyedElement for Value {
        fn key(&self) -> &str {
            &self.key
        }
    }

    fn value(key: &str, label: &str) -> Value {
        Value {
            key: key.into(),
            label: label.into(),
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Action {
        Remove(Vec<String>),
        Add(String, usize),
        ChangeLabel(String, String),
        Reorder(Vec<String>),
    }

    struct Policy {
        placement: AddPlacement,
        batched_remove: bool,
    }

    impl Policy {
        fn appending() -> Self {
            Self {
                placement: AddPlacement::Append,
                batched_remove: true,
            }
        }
    }

    impl CollectionPolicy for Policy {
        type Element = Value;
        type Action = Action;

        fn collection_name(&self) -> String {
            "test values".into()
        }

        fn placement(&self) -> AddPlacement {
            self.placement
        }

        fn remove(&self, removed: &[&Value]) -> Vec<Action> {
            if self.batched_remove {
                vec![Action::Remove(
                    removed.iter().map(|v| v.key.clone()).collect(),
                )]
            } else {
                removed
                    .iter()
                    .map(|v| Action::Remove(vec![v.key.clone()]))
                    .collect()
            }
        }

        fn change(&self, old: &Value, new: &Value) -> DiffResult<Vec<Action>> {
            Ok(crate::build_update_action(&old.label, &new.label, || {
                Action::ChangeLabel(new.key.clone(), new.label.clone())
            })
            .into_iter()
            .collect())
        }

        fn add(&self, element: &Value, position: usize) -> Action {
            Action::Add(element.key.clone(), position)
        }

        fn reorder(&self, new_order: &[&Value]) -> Option<Action> {
            Some(Action::Reorder(new_order.iter().map(|v| v.key.clone()).collect()))
        }
    }

    /// Adds and reorders only.
    struct AddOnlyPolicy;

    impl CollectionPolicy for AddOnlyPolicy {
        type Element = Value;
        type Action = Action;

        fn collection_name(&self) -> String {
            "add-only values".into()
        }

        fn add(&self, element: &Value, position: usize) -> Action {
            Action::Add(element.key.clone(), position)
        }

        fn reorder(&self, new_order: &[&Value]) -> Option<Action> {
            Some(Action::Reorder(new_order.iter().map(|v| v.key.clone()).collect()))
        }
    }

    /// Uses only the required methods.
    struct UnorderedPolicy;

    impl CollectionPolicy for UnorderedPolicy {
        type Element = Value;
        type Action = Action;

        fn collection_name(&self) -> String {
            "unordered values".into()
        }

        fn add(&self, element: &Value, position: usize) -> Action {
            Action::Add(element.key.clone(), position)
        }
    }

    fn keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| (*k).to_owned()).collect()
    }

    #[test]
    fn identical_lists_build_nothing() {
        let old = vec![value("a", "A"), value("b", "B")];
        let actions = reconcile(&Policy::appending(), &old, Some(old.as_slice())).unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn empty_lists_build_nothing() {
        let actions = reconcile(&Policy::appending(), &[], Some(&[][..])).unwrap();
        assert!(actions.is_empty());
        let actions = reconcile(&Policy::appending(), &[], None).unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn absent_new_list_removes_everything() {
        let old = vec![value("a", "A"), value("b", "B")];

        let batched = reconcile(&Policy::appending(), &old, None).unwrap();
        assert_eq!(batched, vec![Action::Remove(keys(&["a", "b"]))]);

        let per_element = Policy {
            placement: AddPlacement::Append,
            batched_remove: false,
        };
        let actions = reconcile(&per_element, &old, None).unwrap();
        assert_eq!(
            actions,
            vec![Action::Remove(keys(&["a"])), Action::Remove(keys(&["b"]))]
        );
    }

    #[test]
    fn removed_element_does_not_trigger_reorder() {
        let old = vec![value("a", "A"), value("b", "B"), value("c", "C")];
        let new = vec![value("a", "A"), value("c", "C")];

        let actions = reconcile(&Policy::appending(), &old, Some(new.as_slice())).unwrap();
        assert_eq!(actions, vec![Action::Remove(keys(&["b"]))]);
    }

    #[test]
    fn appended_element_does_not_trigger_reorder() {
        let old = vec![value("a", "A")];
        let new = vec![value("a", "A"), value("b", "B")];

        let actions = reconcile(&Policy::appending(), &old, Some(new.as_slice())).unwrap();
        assert_eq!(actions, vec![Action::Add("b".into(), 1)]);
    }

    #[test]
    fn element_added_in_the_middle_is_reordered_when_appending() {
        let old = vec![value("a", "A"), value("c", "C")];
        let new = vec![value("a", "A"), value("b", "B"), value("c", "C")];

        let actions = reconcile(&Policy::appending(), &old, Some(new.as_slice())).unwrap();
        assert_eq!(
            actions,
            vec![
                Action::Add("b".into(), 1),
                Action::Reorder(keys(&["a", "b", "c"])),
            ]
        );
    }

    #[test]
    fn element_added_in_the_middle_is_placed_when_position_aware() {
        let policy = Policy {
            placement: AddPlacement::AtPosition,
            batched_remove: true,
        };
        let old = vec![value("a", "A"), value("c", "C")];
        let new = vec![value("a", "A"), value("b", "B"), value("c", "C")];

        let actions = reconcile(&policy, &old, Some(new.as_slice())).unwrap();
        assert_eq!(actions, vec![Action::Add("b".into(), 1)]);
    }

    #[test]
    fn swapped_elements_build_full_reorder() {
        let old = vec![value("a", "A"), value("b", "B"), value("c", "C")];
        let new = vec![value("c", "C"), value("a", "A"), value("b", "B")];

        let actions = reconcile(&Policy::appending(), &old, Some(new.as_slice())).unwrap();
        assert_eq!(actions, vec![Action::Reorder(keys(&["c", "a", "b"]))]);
    }

    #[test]
    fn mixed_changes_keep_step_order() {
        let old = vec![value("a", "A"), value("b", "B"), value("c", "C")];
        let new = vec![value("c", "C"), value("d", "D"), value("a", "Alpha")];

        let actions = reconcile(&Policy::appending(), &old, Some(new.as_slice())).unwrap();
        assert_eq!(
            actions,
            vec![
                Action::Remove(keys(&["b"])),
                Action::Add("d".into(), 1),
                Action::ChangeLabel("a".into(), "Alpha".into()),
                Action::Reorder(keys(&["c", "d", "a"])),
            ]
        );
    }

    #[test]
    fn duplicate_keys_fail_before_building() {
        let old = vec![value("a", "A"), value("a", "B")];
        let new = vec![value("b", "B")];

        let err = reconcile(&Policy::appending(), &old, Some(new.as_slice())).unwrap_err();
        assert_eq!(err, DiffError::duplicate_key("test values", "a"));

        let old = vec![value("a", "A")];
        let new = vec![value("b", "B"), value("b", "C")];
        let err = reconcile(&Policy::appending(), &old, Some(new.as_slice())).unwrap_err();
        assert_eq!(err, DiffError::duplicate_key("test values", "b"));

        let old = vec![value("a", "A"), value("a", "A")];
        assert!(reconcile(&Policy::appending(), &old, None).is_err());
    }

    #[test]
    fn default_policy_methods_skip_removal_and_change() {
        let old = vec![value("a", "A"), value("b", "B")];
        let new = vec![value("a", "Alpha"), value("c", "C")];

        let actions = reconcile(&AddOnlyPolicy, &old, Some(new.as_slice())).unwrap();
        assert_eq!(actions, vec![Action::Add("c".into(), 1)]);

        assert!(reconcile(&AddOnlyPolicy, &old, None).unwrap().is_empty());
    }

    #[test]
    fn unordered_collection_never_reorders() {
        let old = vec![value("a", "A"), value("b", "B")];
        let new = vec![value("c", "C"), value("b", "B"), value("a", "A")];

        let actions = reconcile(&UnorderedPolicy, &old, Some(new.as_slice())).unwrap();
        assert_eq!(actions, vec![Action::Add("c".into(), 0)]);
    }
}
