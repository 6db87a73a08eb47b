//! Reference model of a remote list.
//!
//! Applies the actions a [`ListPolicy`] builds to a plain vector the way a
//! remote would, so reconciler output can be checked against the new list.

use draftsync_diff::{AddPlacement, CollectionPolicy, DiffResult, KeyedElement};
use std::collections::HashMap;

/// A keyed element carrying one comparable value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestElement {
    /// Unique key.
    pub key: String,
    /// Payload compared by `change`.
    pub value: u8,
}

impl TestElement {
    /// Creates an element.
    pub fn new(key: impl Into<String>, value: u8) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

impl KeyedElement for TestElement {
    fn key(&self) -> &str {
        &self.key
    }
}

/// An action on a remote list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListAction {
    /// Removes the elements with these keys.
    Remove(Vec<String>),
    /// Adds an element; `position` is only honored by position-aware remotes.
    Add {
        /// The added element.
        element: TestElement,
        /// Index in the new list.
        position: usize,
    },
    /// Replaces the value of an element.
    SetValue {
        /// Key of the element.
        key: String,
        /// New value.
        value: u8,
    },
    /// Reorders the list to these keys.
    Reorder(Vec<String>),
}

/// Policy building [`ListAction`]s.
#[derive(Debug, Clone, Copy)]
pub struct ListPolicy {
    /// Where added elements land.
    pub placement: AddPlacement,
    /// Whether removals are one batched action.
    pub batched_remove: bool,
    /// Whether the remote can remove or change elements at all.
    pub add_only: bool,
}

impl ListPolicy {
    /// A policy appending added elements with per-element removals.
    pub fn append() -> Self {
        Self {
            placement: AddPlacement::Append,
            batched_remove: false,
            add_only: false,
        }
    }

    /// A policy inserting added elements at their position with a batched
    /// removal.
    pub fn at_position() -> Self {
        Self {
            placement: AddPlacement::AtPosition,
            batched_remove: true,
            add_only: false,
        }
    }

    /// A policy that can only add and reorder.
    pub fn add_only() -> Self {
        Self {
            add_only: true,
            ..Self::append()
        }
    }
}

impl CollectionPolicy for ListPolicy {
    type Element = TestElement;
    type Action = ListAction;

    fn collection_name(&self) -> String {
        "test elements".into()
    }

    fn placement(&self) -> AddPlacement {
        self.placement
    }

    fn remove(&self, removed: &[&TestElement]) -> Vec<ListAction> {
        let keys = removed.iter().map(|element| element.key.clone());
        match (self.add_only, self.batched_remove) {
            (true, _) => Vec::new(),
            (false, true) => vec![ListAction::Remove(keys.collect())],
            (false, false) => keys.map(|key| ListAction::Remove(vec![key])).collect(),
        }
    }

    fn change(&self, old: &TestElement, new: &TestElement) -> DiffResult<Vec<ListAction>> {
        if self.add_only || old.value == new.value {
            return Ok(Vec::new());
        }
        Ok(vec![ListAction::SetValue {
            key: new.key.clone(),
            value: new.value,
        }])
    }

    fn add(&self, element: &TestElement, position: usize) -> ListAction {
        ListAction::Add {
            element: element.clone(),
            position,
        }
    }

    fn reorder(&self, new_order: &[&TestElement]) -> Option<ListAction> {
        Some(ListAction::Reorder(new_order.iter().map(|element| element.key.clone()).collect()))
    }
}

/// Applies `actions` to `list` as a remote with `placement` would.
///
/// A reorder keeps elements it does not name at the end, in their current
/// order.
pub fn apply_actions(
    list: &[TestElement],
    actions: &[ListAction],
    placement: AddPlacement,
) -> Vec<TestElement> {
    let mut current = list.to_vec();
    for action in actions {
        match action {
            ListAction::Remove(keys) => current.retain(|element| !keys.contains(&element.key)),
            ListAction::Add { element, position } => match placement {
                AddPlacement::Append => current.push(element.clone()),
                AddPlacement::AtPosition => {
                    let index = (*position).min(current.len());
                    current.insert(index, element.clone());
                }
            },
            ListAction::SetValue { key, value } => {
                if let Some(element) = current.iter_mut().find(|element| &element.key == key) {
                    element.value = *value;
                }
            }
            ListAction::Reorder(keys) => {
                let rank: HashMap<&str, usize> = keys
                    .iter()
                    .enumerate()
                    .map(|(index, key)| (key.as_str(), index))
                    .collect();
                current.sort_by_key(|element| {
                    rank.get(element.key.as_str()).copied().unwrap_or(keys.len())
                });
            }
        }
    }
    current
}

/// Returns the keys of `list` in order.
pub fn keys_of(list: &[TestElement]) -> Vec<&str> {
    list.iter().map(|element| element.key.as_str()).collect()
}
