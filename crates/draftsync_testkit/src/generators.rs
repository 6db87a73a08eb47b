//! Property-based test generators using proptest.
//!
//! Provides strategies for generating keyed collections with unique keys
//! and family drafts that pass validation.

use crate::model::TestElement;
use draftsync_families::{
    AttributeDefinition, LocalizedString, PlainEnumValue, ProductTypeDraft, ValueType,
};
use proptest::prelude::*;

/// Strategy for generating element keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9-]{0,5}").expect("Invalid regex")
}

/// Strategy for generating a list of elements with unique keys in random
/// order.
pub fn keyed_list_strategy(max_len: usize) -> impl Strategy<Value = Vec<TestElement>> {
    (
        prop::collection::btree_set(key_strategy(), 0..max_len),
        any::<u8>(),
    )
        .prop_flat_map(|(keys, value)| {
            let list: Vec<TestElement> = keys
                .into_iter()
                .map(|key| TestElement::new(key, value))
                .collect();
            Just(list).prop_shuffle()
        })
}

/// Strategy for generating an old and a new list over a shared key space.
///
/// Each key lands in the old list, the new list, both or neither, with a
/// value from a small range so both equal and changed elements occur.
pub fn collection_pair_strategy(
    max_len: usize,
) -> impl Strategy<Value = (Vec<TestElement>, Vec<TestElement>)> {
    prop::collection::btree_set(key_strategy(), 0..max_len)
        .prop_flat_map(|keys| {
            let picks = prop::collection::vec(
                (any::<bool>(), any::<bool>(), 0u8..3, 0u8..3),
                keys.len(),
            );
            (Just(keys), picks)
        })
        .prop_flat_map(|(keys, picks)| {
            let mut old = Vec::new();
            let mut new = Vec::new();
            for (key, (in_old, in_new, old_value, new_value)) in keys.into_iter().zip(picks) {
                if in_old {
                    old.push(TestElement::new(key.clone(), old_value));
                }
                if in_new {
                    new.push(TestElement::new(key, new_value));
                }
            }
            (Just(old).prop_shuffle(), Just(new).prop_shuffle())
        })
}

/// Strategy for generating plain enum values with unique keys.
pub fn plain_enum_values_strategy(max_len: usize) -> impl Strategy<Value = Vec<PlainEnumValue>> {
    keyed_list_strategy(max_len).prop_map(|elements| {
        elements
            .into_iter()
            .map(|element| PlainEnumValue::new(element.key, format!("label {}", element.value % 3)))
            .collect()
    })
}

/// Strategy for generating product type drafts with one enum attribute.
pub fn product_type_draft_strategy() -> impl Strategy<Value = ProductTypeDraft> {
    (
        prop::sample::select(vec!["Apparel", "Shoes"]),
        plain_enum_values_strategy(8),
    )
        .prop_map(|(name, values)| {
            ProductTypeDraft::new("product-type", name, "generated").with_attributes(vec![
                AttributeDefinition::new(
                    "size",
                    LocalizedString::of("en", "Size"),
                    ValueType::Enum { values },
                ),
            ])
        })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
