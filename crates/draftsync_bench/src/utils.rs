//! Benchmark utilities.

use draftsync_families::{
    AttributeDefinition, CategoryDraft, LocalizedString, PlainEnumValue, ProductTypeDraft,
    ValueType,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Seed shared by every benchmark so inputs are stable across runs.
pub const SEED: u64 = 0x5eed;

/// Returns a seeded random number generator.
pub fn rng() -> StdRng {
    StdRng::seed_from_u64(SEED)
}

/// Generate `count` plain enum values keyed `v0..`.
pub fn enum_values(count: usize) -> Vec<PlainEnumValue> {
    (0..count)
        .map(|i| PlainEnumValue::new(format!("v{i}"), format!("Value {i}")))
        .collect()
}

/// Derive a new enum list from `old`: drops about a tenth, relabels about a
/// tenth, adds `count / 10` values and shuffles when `shuffle` is set.
pub fn mutate_enum_values(
    old: &[PlainEnumValue],
    shuffle: bool,
    rng: &mut StdRng,
) -> Vec<PlainEnumValue> {
    let mut new = Vec::with_capacity(old.len());
    for value in old {
        if rng.gen_ratio(1, 10) {
            continue;
        }
        if rng.gen_ratio(1, 10) {
            new.push(PlainEnumValue::new(value.key.clone(), format!("{} (new)", value.label)));
        } else {
            new.push(value.clone());
        }
    }
    let added = old.len() / 10;
    new.extend((0..added).map(|i| PlainEnumValue::new(format!("added{i}"), "Added")));
    if shuffle {
        new.shuffle(rng);
    }
    new
}

/// Generate a product type draft whose single enum attribute holds `values`.
pub fn product_type_draft(values: Vec<PlainEnumValue>) -> ProductTypeDraft {
    ProductTypeDraft::new("bench", "Bench", "Benchmark product type").with_attributes(vec![
        AttributeDefinition::new(
            "size",
            LocalizedString::of("en", "Size"),
            ValueType::Enum { values },
        ),
    ])
}

/// Generate `count` category drafts; every other one references the
/// previous category as its parent.
pub fn category_drafts(count: usize) -> Vec<CategoryDraft> {
    (0..count)
        .map(|i| {
            let key = format!("category-{i}");
            let draft = CategoryDraft::new(
                key.clone(),
                LocalizedString::of("en", &key),
                LocalizedString::of("en", &key),
            );
            if i % 2 == 1 {
                draft.with_parent(format!("category-{}", i - 1))
            } else {
                draft
            }
        })
        .collect()
}
