//! Tax categories.
//!
//! A tax category holds rates keyed by their key. The remote keeps rates
//! unordered: a changed rate is replaced whole and order never produces an
//! action.

use draftsync_diff::{
    build_optional_update_action, build_update_action, reconcile, CollectionPolicy, DiffResult,
    KeyedElement, ResourceDiff,
};
use draftsync_engine::{MemoryResourceService, RemoteResource, ResourceFamily, SyncDraft};
use serde::{Deserialize, Serialize};

/// One tax rate of a tax category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxRate {
    /// Key, unique within the tax category.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Rate between 0 and 1.
    pub amount: f64,
    /// Whether prices already include the tax.
    pub included_in_price: bool,
    /// Two-letter country code.
    pub country: String,
    /// State within the country.
    pub state: Option<String>,
}

impl TaxRate {
    /// Creates a rate not included in the price.
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        amount: f64,
        country: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            amount,
            included_in_price: false,
            country: country.into(),
            state: None,
        }
    }

    /// Marks the rate as included in the price.
    pub fn included_in_price(mut self) -> Self {
        self.included_in_price = true;
        self
    }

    /// Sets the state.
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }
}

impl KeyedElement for TaxRate {
    fn key(&self) -> &str {
        &self.key
    }
}

/// Desired state of a tax category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxCategoryDraft {
    /// Key identifying the tax category.
    pub key: Option<String>,
    /// Name.
    pub name: String,
    /// Description; `None` removes it.
    pub description: Option<String>,
    /// Rates; `None` removes every rate.
    pub rates: Option<Vec<TaxRate>>,
}

impl TaxCategoryDraft {
    /// Creates a draft without description or rates.
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            name: name.into(),
            description: None,
            rates: None,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the rates.
    pub fn with_rates(mut self, rates: Vec<TaxRate>) -> Self {
        self.rates = Some(rates);
        self
    }
}

impl SyncDraft for TaxCategoryDraft {
    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

/// A tax category stored by the remote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxCategory {
    /// Remote id.
    pub id: String,
    /// Key.
    pub key: String,
    /// Optimistic concurrency version.
    pub version: u64,
    /// Name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Rates.
    pub rates: Vec<TaxRate>,
}

impl TaxCategory {
    /// Creates the tax category a remote would store for `draft`.
    pub fn from_draft(draft: &TaxCategoryDraft, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: draft.key.clone().unwrap_or_default(),
            version: 1,
            name: draft.name.clone(),
            description: draft.description.clone(),
            rates: draft.rates.clone().unwrap_or_default(),
        }
    }

    /// Returns the tax category after applying `actions`, with the next
    /// version.
    pub fn apply(&self, actions: &[TaxCategoryAction]) -> Self {
        let mut next = self.clone();
        for action in actions {
            match action {
                TaxCategoryAction::ChangeName { name } => next.name = name.clone(),
                TaxCategoryAction::SetDescription { description } => {
                    next.description = description.clone()
                }
                TaxCategoryAction::RemoveTaxRate { tax_rate_key } => {
                    next.rates.retain(|rate| &rate.key != tax_rate_key)
                }
                TaxCategoryAction::AddTaxRate { tax_rate } => next.rates.push(tax_rate.clone()),
                TaxCategoryAction::ReplaceTaxRate {
                    tax_rate_key,
                    tax_rate,
                } => {
                    if let Some(rate) = next.rates.iter_mut().find(|rate| &rate.key == tax_rate_key)
                    {
                        *rate = tax_rate.clone();
                    }
                }
            }
        }
        next.version += 1;
        next
    }
}

impl RemoteResource for TaxCategory {
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

/// An update action on a tax category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TaxCategoryAction {
    /// Replaces the name.
    ChangeName {
        /// New name.
        name: String,
    },
    /// Sets or removes the description.
    SetDescription {
        /// New description.
        description: Option<String>,
    },
    /// Removes a rate.
    RemoveTaxRate {
        /// Key of the removed rate.
        tax_rate_key: String,
    },
    /// Adds a rate.
    AddTaxRate {
        /// The added rate.
        tax_rate: TaxRate,
    },
    /// Replaces a rate with the same key.
    ReplaceTaxRate {
        /// Key of the replaced rate.
        tax_rate_key: String,
        /// The new rate.
        tax_rate: TaxRate,
    },
}

struct TaxRatePolicy;

impl CollectionPolicy for TaxRatePolicy {
    type Element = TaxRate;
    type Action = TaxCategoryAction;

    fn collection_name(&self) -> String {
        "tax rates".into()
    }

    fn remove(&self, removed: &[&TaxRate]) -> Vec<TaxCategoryAction> {
        removed
            .iter()
            .map(|rate| TaxCategoryAction::RemoveTaxRate {
                tax_rate_key: rate.key.clone(),
            })
            .collect()
    }

    fn change(&self, old: &TaxRate, new: &TaxRate) -> DiffResult<Vec<TaxCategoryAction>> {
        if old == new {
            return Ok(Vec::new());
        }
        Ok(vec![TaxCategoryAction::ReplaceTaxRate {
            tax_rate_key: new.key.clone(),
            tax_rate: new.clone(),
        }])
    }

    fn add(&self, rate: &TaxRate, _position: usize) -> TaxCategoryAction {
        TaxCategoryAction::AddTaxRate {
            tax_rate: rate.clone(),
        }
    }
}

/// Builds the actions turning the `old` rates into `new`.
///
/// An absent new list removes every old rate.
pub fn build_tax_rate_actions(
    old: &[TaxRate],
    new: Option<&[TaxRate]>,
) -> DiffResult<Vec<TaxCategoryAction>> {
    reconcile(&TaxRatePolicy, old, new)
}

/// The tax category family.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaxCategories;

impl TaxCategories {
    /// Creates an in-memory tax category service.
    pub fn memory_service() -> MemoryResourceService<Self> {
        MemoryResourceService::new(
            |draft: &TaxCategoryDraft, id: String| TaxCategory::from_draft(draft, id),
            |tax_category: &TaxCategory, actions: &[TaxCategoryAction]| {
                tax_category.apply(actions)
            },
        )
    }
}

impl ResourceDiff for TaxCategories {
    type Resource = TaxCategory;
    type Draft = TaxCategoryDraft;
    type Action = TaxCategoryAction;

    fn build_actions(
        old: &TaxCategory,
        new: &TaxCategoryDraft,
    ) -> DiffResult<Vec<TaxCategoryAction>> {
        let mut actions: Vec<TaxCategoryAction> = [
            build_update_action(&old.name, &new.name, || TaxCategoryAction::ChangeName {
                name: new.name.clone(),
            }),
            build_optional_update_action(
                old.description.as_deref(),
                new.description.as_deref(),
                |description| TaxCategoryAction::SetDescription {
                    description: Some(description.to_owned()),
                },
                || TaxCategoryAction::SetDescription { description: None },
            ),
        ]
        .into_iter()
        .flatten()
        .collect();
        actions.extend(build_tax_rate_actions(&old.rates, new.rates.as_deref())?);
        Ok(actions)
    }
}

impl ResourceFamily for TaxCategories {
    const NAME: &'static str = "tax category";
    const PLURAL: &'static str = "tax categories";
}
