//! A minimal family used by the unit tests of this crate.

use crate::family::{RemoteResource, ResourceFamily, SyncDraft};
use crate::service::MemoryResourceService;
use draftsync_diff::{build_update_action, DiffError, DiffResult, ResourceDiff};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub key: Option<String>,
    pub name: String,
    pub requires: BTreeSet<String>,
}

impl ItemDraft {
    pub fn new(key: &str, name: &str) -> Self {
        Self {
            key: Some(key.to_owned()),
            name: name.to_owned(),
            requires: BTreeSet::new(),
        }
    }

    pub fn without_key(name: &str) -> Self {
        Self {
            key: None,
            name: name.to_owned(),
            requires: BTreeSet::new(),
        }
    }

    pub fn requiring<const N: usize>(mut self, keys: [&str; N]) -> Self {
        self.requires = keys.iter().map(|k| (*k).to_owned()).collect();
        self
    }
}

impl SyncDraft for ItemDraft {
    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn references(&self) -> BTreeSet<String> {
        self.requires.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: String,
    pub key: String,
    pub version: u64,
    pub name: String,
}

impl Item {
    pub fn new(id: &str, key: &str, name: &str) -> Self {
        Self {
            id: id.to_owned(),
            key: key.to_owned(),
            version: 1,
            name: name.to_owned(),
        }
    }
}

impl RemoteResource for Item {
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

#[derive(Debug, Clone, PartialEq)]
pub enum ItemAction {
    Rename(String),
}

pub struct Items;

impl ResourceDiff for Items {
    type Resource = Item;
    type Draft = ItemDraft;
    type Action = ItemAction;

    fn build_actions(old: &Item, new: &ItemDraft) -> DiffResult<Vec<ItemAction>> {
        if new.name.starts_with('!') {
            return Err(DiffError::unsupported_change("name", "reserved prefix"));
        }
        Ok(build_update_action(&old.name, &new.name, || {
            ItemAction::Rename(new.name.clone())
        })
        .into_iter()
        .collect())
    }
}

impl ResourceFamily for Items {
    const NAME: &'static str = "item";
    const PLURAL: &'static str = "items";
}

pub fn memory_service() -> MemoryResourceService<Items> {
    MemoryResourceService::new(
        |draft: &ItemDraft, id: String| Item {
            id,
            key: draft.key.clone().unwrap_or_default(),
            version: 1,
            name: draft.name.clone(),
        },
        |item: &Item, actions: &[ItemAction]| {
            let mut next = item.clone();
            for action in actions {
                match action {
                    ItemAction::Rename(name) => next.name = name.clone(),
                }
            }
            next.version += 1;
            next
        },
    )
}
