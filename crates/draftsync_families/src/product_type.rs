//! Product types.
//!
//! A product type carries an ordered list of attribute definitions. Enum
//! attributes carry an ordered list of enum values, reconciled by key with
//! batched removal, label changes, appends and a reorder carrying the values.

use crate::common::{reorder_by_keys, LocalizedEnumValue, LocalizedString, PlainEnumValue, ValueType};
use draftsync_diff::{
    build_update_action, reconcile, CollectionPolicy, DiffError, DiffResult, KeyedElement,
    ResourceDiff,
};
use draftsync_engine::{MemoryResourceService, RemoteResource, ResourceFamily, SyncDraft};
use serde::{Deserialize, Serialize};

/// An attribute of the products of one type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDefinition {
    /// Name, unique within the product type.
    pub name: String,
    /// Display label.
    pub label: LocalizedString,
    /// Value type.
    pub attribute_type: ValueType,
}

impl AttributeDefinition {
    /// Creates an attribute definition.
    pub fn new(name: impl Into<String>, label: LocalizedString, attribute_type: ValueType) -> Self {
        Self {
            name: name.into(),
            label,
            attribute_type,
        }
    }
}

impl KeyedElement for AttributeDefinition {
    fn key(&self) -> &str {
        &self.name
    }
}

/// Desired state of a product type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductTypeDraft {
    /// Key identifying the product type.
    pub key: Option<String>,
    /// Name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Attribute definitions in display order; `None` removes all of them.
    pub attributes: Option<Vec<AttributeDefinition>>,
}

impl ProductTypeDraft {
    /// Creates a draft without attributes.
    pub fn new(key: impl Into<String>, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            name: name.into(),
            description: description.into(),
            attributes: Some(Vec::new()),
        }
    }

    /// Sets the attribute definitions.
    pub fn with_attributes(mut self, attributes: Vec<AttributeDefinition>) -> Self {
        self.attributes = Some(attributes);
        self
    }
}

impl SyncDraft for ProductTypeDraft {
    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

/// A product type stored by the remote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductType {
    /// Remote id.
    pub id: String,
    /// Key.
    pub key: String,
    /// Optimistic concurrency version.
    pub version: u64,
    /// Name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Attribute definitions in display order.
    pub attributes: Vec<AttributeDefinition>,
}

impl ProductType {
    /// Creates the product type a remote would store for `draft`.
    pub fn from_draft(draft: &ProductTypeDraft, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: draft.key.clone().unwrap_or_default(),
            version: 1,
            name: draft.name.clone(),
            description: draft.description.clone(),
            attributes: draft.attributes.clone().unwrap_or_default(),
        }
    }

    /// Returns the product type after applying `actions`, with the next
    /// version. Actions naming unknown attributes are ignored.
    pub fn apply(&self, actions: &[ProductTypeAction]) -> Self {
        let mut next = self.clone();
        for action in actions {
            next.apply_one(action);
        }
        next.version += 1;
        next
    }

    fn apply_one(&mut self, action: &ProductTypeAction) {
        match action {
            ProductTypeAction::ChangeName { name } => self.name = name.clone(),
            ProductTypeAction::ChangeDescription { description } => {
                self.description = description.clone()
            }
            ProductTypeAction::RemoveAttributeDefinition { name } => {
                self.attributes.retain(|attribute| &attribute.name != name)
            }
            ProductTypeAction::AddAttributeDefinition { attribute } => {
                self.attributes.push(attribute.clone())
            }
            ProductTypeAction::ChangeAttributeDefinitionLabel {
                attribute_name,
                label,
            } => {
                if let Some(attribute) = self.attribute_mut(attribute_name) {
                    attribute.label = label.clone();
                }
            }
            ProductTypeAction::ChangeAttributeOrder { attributes } => {
                let names: Vec<&str> = attributes.iter().map(|a| a.name.as_str()).collect();
                reorder_by_keys(&mut self.attributes, &names, |a| a.name.as_str());
            }
            ProductTypeAction::RemoveEnumValues {
                attribute_name,
                keys,
            } => match self.value_type_mut(attribute_name) {
                Some(ValueType::Enum { values }) => values.retain(|v| !keys.contains(&v.key)),
                Some(ValueType::LocalizedEnum { values }) => {
                    values.retain(|v| !keys.contains(&v.key))
                }
                _ => {}
            },
            ProductTypeAction::AddPlainEnumValue {
                attribute_name,
                value,
            } => {
                if let Some(ValueType::Enum { values }) = self.value_type_mut(attribute_name) {
                    values.push(value.clone());
                }
            }
            ProductTypeAction::ChangePlainEnumValueLabel {
                attribute_name,
                new_value,
            } => {
                if let Some(ValueType::Enum { values }) = self.value_type_mut(attribute_name) {
                    for value in values.iter_mut().filter(|v| v.key == new_value.key) {
                        value.label = new_value.label.clone();
                    }
                }
            }
            ProductTypeAction::ChangePlainEnumValueOrder {
                attribute_name,
                values: order,
            } => {
                if let Some(ValueType::Enum { values }) = self.value_type_mut(attribute_name) {
                    let keys: Vec<&str> = order.iter().map(|v| v.key.as_str()).collect();
                    reorder_by_keys(values, &keys, |v| v.key.as_str());
                }
            }
            ProductTypeAction::AddLocalizedEnumValue {
                attribute_name,
                value,
            } => {
                if let Some(ValueType::LocalizedEnum { values }) = self.value_type_mut(attribute_name) {
                    values.push(value.clone());
                }
            }
            ProductTypeAction::ChangeLocalizedEnumValueLabel {
                attribute_name,
                new_value,
            } => {
                if let Some(ValueType::LocalizedEnum { values }) = self.value_type_mut(attribute_name) {
                    for value in values.iter_mut().filter(|v| v.key == new_value.key) {
                        value.label = new_value.label.clone();
                    }
                }
            }
            ProductTypeAction::ChangeLocalizedEnumValueOrder {
                attribute_name,
                values: order,
            } => {
                if let Some(ValueType::LocalizedEnum { values }) = self.value_type_mut(attribute_name) {
                    let keys: Vec<&str> = order.iter().map(|v| v.key.as_str()).collect();
                    reorder_by_keys(values, &keys, |v| v.key.as_str());
                }
            }
        }
    }

    fn attribute_mut(&mut self, name: &str) -> Option<&mut AttributeDefinition> {
        self.attributes.iter_mut().find(|a| a.name == name)
    }

    fn value_type_mut(&mut self, name: &str) -> Option<&mut ValueType> {
        self.attribute_mut(name).map(|a| &mut a.attribute_type)
    }
}

impl RemoteResource for ProductType {
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

/// An update action on a product type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ProductTypeAction {
    /// Replaces the name.
    ChangeName {
        /// New name.
        name: String,
    },
    /// Replaces the description.
    ChangeDescription {
        /// New description.
        description: String,
    },
    /// Removes an attribute definition.
    RemoveAttributeDefinition {
        /// Attribute name.
        name: String,
    },
    /// Appends an attribute definition.
    AddAttributeDefinition {
        /// The new attribute.
        attribute: AttributeDefinition,
    },
    /// Replaces the label of an attribute definition.
    ChangeAttributeDefinitionLabel {
        /// Attribute name.
        attribute_name: String,
        /// New label.
        label: LocalizedString,
    },
    /// Reorders the attribute definitions.
    ChangeAttributeOrder {
        /// Every attribute definition in the new order.
        attributes: Vec<AttributeDefinition>,
    },
    /// Removes enum values of either kind.
    RemoveEnumValues {
        /// Attribute name.
        attribute_name: String,
        /// Keys of the removed values.
        keys: Vec<String>,
    },
    /// Appends a plain enum value.
    AddPlainEnumValue {
        /// Attribute name.
        attribute_name: String,
        /// The new value.
        value: PlainEnumValue,
    },
    /// Replaces the label of a plain enum value.
    ChangePlainEnumValueLabel {
        /// Attribute name.
        attribute_name: String,
        /// The value with its new label.
        new_value: PlainEnumValue,
    },
    /// Reorders the plain enum values.
    ChangePlainEnumValueOrder {
        /// Attribute name.
        attribute_name: String,
        /// Every value in the new order.
        values: Vec<PlainEnumValue>,
    },
    /// Appends a localized enum value.
    AddLocalizedEnumValue {
        /// Attribute name.
        attribute_name: String,
        /// The new value.
        value: LocalizedEnumValue,
    },
    /// Replaces the label of a localized enum value.
    ChangeLocalizedEnumValueLabel {
        /// Attribute name.
        attribute_name: String,
        /// The value with its new label.
        new_value: LocalizedEnumValue,
    },
    /// Reorders the localized enum values.
    ChangeLocalizedEnumValueOrder {
        /// Attribute name.
        attribute_name: String,
        /// Every value in the new order.
        values: Vec<LocalizedEnumValue>,
    },
}

struct AttributePolicy;

impl CollectionPolicy for AttributePolicy {
    type Element = AttributeDefinition;
    type Action = ProductTypeAction;

    fn collection_name(&self) -> String {
        "attribute definitions".into()
    }

    fn remove(&self, removed: &[&AttributeDefinition]) -> Vec<ProductTypeAction> {
        removed
            .iter()
            .map(|attribute| ProductTypeAction::RemoveAttributeDefinition {
                name: attribute.name.clone(),
            })
            .collect()
    }

    fn change(
        &self,
        old: &AttributeDefinition,
        new: &AttributeDefinition,
    ) -> DiffResult<Vec<ProductTypeAction>> {
        let mut actions: Vec<ProductTypeAction> = build_update_action(&old.label, &new.label, || {
            ProductTypeAction::ChangeAttributeDefinitionLabel {
                attribute_name: new.name.clone(),
                label: new.label.clone(),
            }
        })
        .into_iter()
        .collect();

        let attribute_name = new.name.as_str();
        match (&old.attribute_type, &new.attribute_type) {
            (ValueType::Enum { values: old_values }, ValueType::Enum { values: new_values }) => {
                actions.extend(reconcile(
                    &PlainEnumPolicy { attribute_name },
                    old_values,
                    Some(new_values.as_slice()),
                )?);
            }
            (
                ValueType::LocalizedEnum { values: old_values },
                ValueType::LocalizedEnum { values: new_values },
            ) => {
                actions.extend(reconcile(
                    &LocalizedEnumPolicy { attribute_name },
                    old_values,
                    Some(new_values.as_slice()),
                )?);
            }
            (old_type, new_type) if old_type.kind() != new_type.kind() => {
                return Err(DiffError::unsupported_change(
                    format!("attribute '{attribute_name}'"),
                    format!("type changed from {} to {}", old_type.kind(), new_type.kind()),
                ));
            }
            _ => {}
        }
        Ok(actions)
    }

    fn add(&self, attribute: &AttributeDefinition, _position: usize) -> ProductTypeAction {
        ProductTypeAction::AddAttributeDefinition {
            attribute: attribute.clone(),
        }
    }

    fn reorder(&self, new_order: &[&AttributeDefinition]) -> Option<ProductTypeAction> {
        Some(ProductTypeAction::ChangeAttributeOrder {
            attributes: new_order.iter().map(|a| (*a).clone()).collect(),
        })
    }
}

struct PlainEnumPolicy<'a> {
    attribute_name: &'a str,
}

impl CollectionPolicy for PlainEnumPolicy<'_> {
    type Element = PlainEnumValue;
    type Action = ProductTypeAction;

    fn collection_name(&self) -> String {
        format!("enum values of attribute '{}'", self.attribute_name)
    }

    fn remove(&self, removed: &[&PlainEnumValue]) -> Vec<ProductTypeAction> {
        vec![ProductTypeAction::RemoveEnumValues {
            attribute_name: self.attribute_name.to_owned(),
            keys: removed.iter().map(|v| v.key.clone()).collect(),
        }]
    }

    fn change(&self, old: &PlainEnumValue, new: &PlainEnumValue) -> DiffResult<Vec<ProductTypeAction>> {
        Ok(build_update_action(&old.label, &new.label, || {
            ProductTypeAction::ChangePlainEnumValueLabel {
                attribute_name: self.attribute_name.to_owned(),
                new_value: new.clone(),
            }
        })
        .into_iter()
        .collect())
    }

    fn add(&self, value: &PlainEnumValue, _position: usize) -> ProductTypeAction {
        ProductTypeAction::AddPlainEnumValue {
            attribute_name: self.attribute_name.to_owned(),
            value: value.clone(),
        }
    }

    fn reorder(&self, new_order: &[&PlainEnumValue]) -> Option<ProductTypeAction> {
        Some(ProductTypeAction::ChangePlainEnumValueOrder {
            attribute_name: self.attribute_name.to_owned(),
            values: new_order.iter().map(|v| (*v).clone()).collect(),
        })
    }
}

struct LocalizedEnumPolicy<'a> {
    attribute_name: &'a str,
}

impl CollectionPolicy for LocalizedEnumPolicy<'_> {
    type Element = LocalizedEnumValue;
    type Action = ProductTypeAction;

    fn collection_name(&self) -> String {
        format!("localized enum values of attribute '{}'", self.attribute_name)
    }

    fn remove(&self, removed: &[&LocalizedEnumValue]) -> Vec<ProductTypeAction> {
        vec![ProductTypeAction::RemoveEnumValues {
            attribute_name: self.attribute_name.to_owned(),
            keys: removed.iter().map(|v| v.key.clone()).collect(),
        }]
    }

    fn change(
        &self,
        old: &LocalizedEnumValue,
        new: &LocalizedEnumValue,
    ) -> DiffResult<Vec<ProductTypeAction>> {
        Ok(build_update_action(&old.label, &new.label, || {
            ProductTypeAction::ChangeLocalizedEnumValueLabel {
                attribute_name: self.attribute_name.to_owned(),
                new_value: new.clone(),
            }
        })
        .into_iter()
        .collect())
    }

    fn add(&self, value: &LocalizedEnumValue, _position: usize) -> ProductTypeAction {
        ProductTypeAction::AddLocalizedEnumValue {
            attribute_name: self.attribute_name.to_owned(),
            value: value.clone(),
        }
    }

    fn reorder(&self, new_order: &[&LocalizedEnumValue]) -> Option<ProductTypeAction> {
        Some(ProductTypeAction::ChangeLocalizedEnumValueOrder {
            attribute_name: self.attribute_name.to_owned(),
            values: new_order.iter().map(|v| (*v).clone()).collect(),
        })
    }
}

/// Builds the actions for the plain enum values of one attribute.
///
/// An absent new list removes every old value.
pub fn build_plain_enum_value_actions(
    attribute_name: &str,
    old: &[PlainEnumValue],
    new: Option<&[PlainEnumValue]>,
) -> DiffResult<Vec<ProductTypeAction>> {
    reconcile(&PlainEnumPolicy { attribute_name }, old, new)
}

/// Builds the actions for the localized enum values of one attribute.
///
/// An absent new list removes every old value.
pub fn build_localized_enum_value_actions(
    attribute_name: &str,
    old: &[LocalizedEnumValue],
    new: Option<&[LocalizedEnumValue]>,
) -> DiffResult<Vec<ProductTypeAction>> {
    reconcile(&LocalizedEnumPolicy { attribute_name }, old, new)
}

/// The product type family.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductTypes;

impl ProductTypes {
    /// Creates an in-memory product type service.
    pub fn memory_service() -> MemoryResourceService<Self> {
        MemoryResourceService::new(
            |draft: &ProductTypeDraft, id: String| ProductType::from_draft(draft, id),
            |product_type: &ProductType, actions: &[ProductTypeAction]| product_type.apply(actions),
        )
    }
}

impl ResourceDiff for ProductTypes {
    type Resource = ProductType;
    type Draft = ProductTypeDraft;
    type Action = ProductTypeAction;

    fn build_actions(old: &ProductType, new: &ProductTypeDraft) -> DiffResult<Vec<ProductTypeAction>> {
        let mut actions: Vec<ProductTypeAction> = [
            build_update_action(&old.name, &new.name, || ProductTypeAction::ChangeName {
                name: new.name.clone(),
            }),
            build_update_action(&old.description, &new.description, || {
                ProductTypeAction::ChangeDescription {
                    description: new.description.clone(),
                }
            }),
        ]
        .into_iter()
        .flatten()
        .collect();

        actions.extend(reconcile(
            &AttributePolicy,
            &old.attributes,
            new.attributes.as_deref(),
        )?);
        Ok(actions)
    }
}

impl ResourceFamily for ProductTypes {
    const NAME: &'static str = "product type";
    const PLURAL: &'static str = "product types";
}
