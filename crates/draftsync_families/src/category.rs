//! Categories.
//!
//! A category may name a parent category by key. The parent is a reference:
//! a category whose parent does not exist yet waits in deferred staging until
//! the parent is created.

use crate::common::LocalizedString;
use draftsync_diff::{
    build_optional_update_action, build_present_update_action, build_update_action, DiffResult,
    ResourceDiff,
};
use draftsync_engine::{MemoryResourceService, RemoteResource, ResourceFamily, SyncDraft};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Desired state of a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDraft {
    /// Key identifying the category.
    pub key: Option<String>,
    /// Name.
    pub name: LocalizedString,
    /// URL slug.
    pub slug: LocalizedString,
    /// Description; `None` removes it.
    pub description: Option<LocalizedString>,
    /// Key of the parent category. A category cannot be detached from its
    /// parent, so `None` keeps the current parent.
    pub parent: Option<String>,
    /// Sort position among siblings; `None` keeps the current one.
    pub order_hint: Option<String>,
    /// Id in an external system; `None` removes it.
    pub external_id: Option<String>,
}

impl CategoryDraft {
    /// Creates a draft with the mandatory fields.
    pub fn new(key: impl Into<String>, name: LocalizedString, slug: LocalizedString) -> Self {
        Self {
            key: Some(key.into()),
            name,
            slug,
            description: None,
            parent: None,
            order_hint: None,
            external_id: None,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: LocalizedString) -> Self {
        self.description = Some(description);
        self
    }

    /// Sets the parent key.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Sets the order hint.
    pub fn with_order_hint(mut self, order_hint: impl Into<String>) -> Self {
        self.order_hint = Some(order_hint.into());
        self
    }

    /// Sets the external id.
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }
}

impl SyncDraft for CategoryDraft {
    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn references(&self) -> BTreeSet<String> {
        self.parent.iter().cloned().collect()
    }
}

/// A category stored by the remote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Remote id.
    pub id: String,
    /// Key.
    pub key: String,
    /// Optimistic concurrency version.
    pub version: u64,
    /// Name.
    pub name: LocalizedString,
    /// URL slug.
    pub slug: LocalizedString,
    /// Description.
    pub description: Option<LocalizedString>,
    /// Key of the parent category.
    pub parent: Option<String>,
    /// Sort position among siblings.
    pub order_hint: Option<String>,
    /// Id in an external system.
    pub external_id: Option<String>,
}

impl Category {
    /// Creates the category a remote would store for `draft`.
    pub fn from_draft(draft: &CategoryDraft, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: draft.key.clone().unwrap_or_default(),
            version: 1,
            name: draft.name.clone(),
            slug: draft.slug.clone(),
            description: draft.description.clone(),
            parent: draft.parent.clone(),
            order_hint: draft.order_hint.clone(),
            external_id: draft.external_id.clone(),
        }
    }

    /// Returns the category after applying `actions`, with the next version.
    pub fn apply(&self, actions: &[CategoryAction]) -> Self {
        let mut next = self.clone();
        for action in actions {
            match action {
                CategoryAction::ChangeName { name } => next.name = name.clone(),
                CategoryAction::ChangeSlug { slug } => next.slug = slug.clone(),
                CategoryAction::SetDescription { description } => {
                    next.description = description.clone()
                }
                CategoryAction::ChangeParent { parent } => next.parent = Some(parent.clone()),
                CategoryAction::ChangeOrderHint { order_hint } => {
                    next.order_hint = Some(order_hint.clone())
                }
                CategoryAction::SetExternalId { external_id } => {
                    next.external_id = external_id.clone()
                }
            }
        }
        next.version += 1;
        next
    }
}

impl RemoteResource for Category {
    fn id(&self) -> &str {
        &self.id
    }

    fn key(&self) -> &str {
        &self.key
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// An update action on a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CategoryAction {
    /// Replaces the name.
    ChangeName {
        /// New name.
        name: LocalizedString,
    },
    /// Replaces the slug.
    ChangeSlug {
        /// New slug.
        slug: LocalizedString,
    },
    /// Sets or removes the description.
    SetDescription {
        /// New description.
        description: Option<LocalizedString>,
    },
    /// Moves the category under another parent.
    ChangeParent {
        /// Key of the new parent.
        parent: String,
    },
    /// Replaces the order hint.
    ChangeOrderHint {
        /// New order hint.
        order_hint: String,
    },
    /// Sets or removes the external id.
    SetExternalId {
        /// New external id.
        external_id: Option<String>,
    },
}

/// The category family.
#[derive(Debug, Clone, Copy, Default)]
pub struct Categories;

impl Categories {
    /// Creates an in-memory category service.
    pub fn memory_service() -> MemoryResourceService<Self> {
        MemoryResourceService::new(
            |draft: &CategoryDraft, id: String| Category::from_draft(draft, id),
            |category: &Category, actions: &[CategoryAction]| category.apply(actions),
        )
    }
}

impl ResourceDiff for Categories {
    type Resource = Category;
    type Draft = CategoryDraft;
    type Action = CategoryAction;

    fn build_actions(old: &Category, new: &CategoryDraft) -> DiffResult<Vec<CategoryAction>> {
        Ok([
            build_update_action(&old.name, &new.name, || CategoryAction::ChangeName {
                name: new.name.clone(),
            }),
            build_update_action(&old.slug, &new.slug, || CategoryAction::ChangeSlug {
                slug: new.slug.clone(),
            }),
            build_optional_update_action(
                old.description.as_ref(),
                new.description.as_ref(),
                |description| CategoryAction::SetDescription {
                    description: Some(description.clone()),
                },
                || CategoryAction::SetDescription { description: None },
            ),
            build_present_update_action(old.parent.as_deref(), new.parent.as_deref(), |parent| {
                CategoryAction::ChangeParent {
                    parent: parent.to_owned(),
                }
            }),
            build_present_update_action(
                old.order_hint.as_deref(),
                new.order_hint.as_deref(),
                |order_hint| CategoryAction::ChangeOrderHint {
                    order_hint: order_hint.to_owned(),
                },
            ),
            build_optional_update_action(
                old.external_id.as_deref(),
                new.external_id.as_deref(),
                |external_id| CategoryAction::SetExternalId {
                    external_id: Some(external_id.to_owned()),
                },
                || CategoryAction::SetExternalId { external_id: None },
            ),
        ]
        .into_iter()
        .flatten()
        .collect())
    }
}

impl ResourceFamily for Categories {
    const NAME: &'static str = "category";
    const PLURAL: &'static str = "categories";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> CategoryDraft {
        CategoryDraft::new(
            "shoes",
            LocalizedString::of("en", "Shoes"),
            LocalizedString::of("en", "shoes"),
        )
    }

    fn stored(draft: &CategoryDraft) -> Category {
        Category::from_draft(draft, "id-1")
    }

    #[test]
    fn same_category_builds_nothing() {
        let draft = draft()
            .with_description(LocalizedString::of("en", "All shoes"))
            .with_parent("fashion")
            .with_order_hint("0.1")
            .with_external_id("ext-1");
        assert!(Categories::build_actions(&stored(&draft), &draft)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn actions_follow_field_order() {
        let old = stored(
            &draft()
                .with_description(LocalizedString::of("en", "Old"))
                .with_external_id("ext-1"),
        );
        let new = CategoryDraft {
            name: LocalizedString::of("en", "Boots"),
            slug: LocalizedString::of("en", "boots"),
            ..draft()
        }
        .with_parent("fashion")
        .with_order_hint("0.5");

        let actions = Categories::build_actions(&old, &new).unwrap();
        assert_eq!(
            actions,
            vec![
                CategoryAction::ChangeName {
                    name: LocalizedString::of("en", "Boots")
                },
                CategoryAction::ChangeSlug {
                    slug: LocalizedString::of("en", "boots")
                },
                CategoryAction::SetDescription { description: None },
                CategoryAction::ChangeParent {
                    parent: "fashion".into()
                },
                CategoryAction::ChangeOrderHint {
                    order_hint: "0.5".into()
                },
                CategoryAction::SetExternalId { external_id: None },
            ]
        );
    }

    #[test]
    fn absent_parent_and_order_hint_are_kept() {
        let old = stored(&draft().with_parent("fashion").with_order_hint("0.1"));
        assert!(Categories::build_actions(&old, &draft()).unwrap().is_empty());
    }

    #[test]
    fn parent_is_a_reference() {
        assert!(draft().references().is_empty());
        assert_eq!(
            draft().with_parent("fashion").references(),
            BTreeSet::from(["fashion".to_owned()])
        );
    }

    #[test]
    fn applying_actions_converges() {
        let old = stored(&draft().with_description(LocalizedString::of("en", "Old")));
        let new = draft()
            .with_parent("fashion")
            .with_external_id("ext-2");

        let actions = Categories::build_actions(&old, &new).unwrap();
        let updated = old.apply(&actions);

        assert_eq!(updated.version, 2);
        assert!(Categories::build_actions(&updated, &new).unwrap().is_empty());
    }

    #[test]
    fn actions_are_tagged_on_the_wire() {
        let action = CategoryAction::ChangeOrderHint {
            order_hint: "0.5".into(),
        };
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            serde_json::json!({ "action": "changeOrderHint", "orderHint": "0.5" })
        );
    }
}
