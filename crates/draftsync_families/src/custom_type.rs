//! Custom types.
//!
//! A custom type carries an ordered list of field definitions. The remote
//! cannot remove enum values of a field or change their labels, so enum
//! values are only ever added and reordered by key.

use crate::common::{reorder_by_keys, LocalizedEnumValue, LocalizedString, PlainEnumValue, ValueType};
use draftsync_diff::{
    build_optional_update_action, build_update_action, reconcile, CollectionPolicy, DiffError,
    DiffResult, KeyedElement, ResourceDiff,
};
use draftsync_engine::{MemoryResourceService, RemoteResource, ResourceFamily, SyncDraft};
use serde::{Deserialize, Serialize};

/// A custom field of the resources using one type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    /// Name, unique within the custom type.
    pub name: String,
    /// Display label.
    pub label: LocalizedString,
    /// Value type.
    pub field_type: ValueType,
}

impl FieldDefinition {
    /// Creates a field definition.
    pub fn new(name: impl Into<String>, label: LocalizedString, field_type: ValueType) -> Self {
        Self {
            name: name.into(),
            label,
            field_type,
        }
    }
}

impl KeyedElement for FieldDefinition {
    fn key(&self) -> &str {
        &self.name
    }
}

/// Desired state of a custom type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDraft {
    /// Key identifying the custom type.
    pub key: Option<String>,
    /// Name.
    pub name: LocalizedString,
    /// Description; `None` removes it.
    pub description: Option<LocalizedString>,
    /// Field definitions in display order.
    pub field_definitions: Vec<FieldDefinition>,
}

impl TypeDraft {
    /// Creates a draft without fields.
    pub fn new(key: impl Into<String>, name: LocalizedString) -> Self {
        Self {
            key: Some(key.into()),
            name,
            description: None,
            field_definitions: Vec::new(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: LocalizedString) -> Self {
        self.description = Some(description);
        self
    }

    /// Sets the field definitions.
    pub fn with_field_definitions(mut self, field_definitions: Vec<FieldDefinition>) -> Self {
        self.field_definitions = field_definitions;
        self
    }
}

impl SyncDraft for TypeDraft {
    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

/// A custom type stored by the remote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomType {
    /// Remote id.
    pub id: String,
    /// Key.
    pub key: String,
    /// Optimistic concurrency version.
    pub version: u64,
    /// Name.
    pub name: LocalizedString,
    /// Description.
    pub description: Option<LocalizedString>,
    /// Field definitions in display order.
    pub field_definitions: Vec<FieldDefinition>,
}

impl CustomType {
    /// Creates the custom type a remote would store for `draft`.
    pub fn from_draft(draft: &TypeDraft, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: draft.key.clone().unwrap_or_default(),
            version: 1,
            name: draft.name.clone(),
            description: draft.description.clone(),
            field_definitions: draft.field_definitions.clone(),
        }
    }

    /// Returns the custom type after applying `actions`, with the next
    /// version.
    pub fn apply(&self, actions: &[TypeAction]) -> Self {
        let mut next = self.clone();
        for action in actions {
            match action {
                TypeAction::ChangeName { name } => next.name = name.clone(),
                TypeAction::SetDescription { description } => {
                    next.description = description.clone()
                }
                TypeAction::RemoveFieldDefinition { field_name } => next
                    .field_definitions
                    .retain(|field| &field.name != field_name),
                TypeAction::AddFieldDefinition { field_definition } => {
                    next.field_definitions.push(field_definition.clone())
                }
                TypeAction::ChangeFieldDefinitionLabel { field_name, label } => {
                    if let Some(field) = next.field_mut(field_name) {
                        field.label = label.clone();
                    }
                }
                TypeAction::ChangeFieldDefinitionOrder { field_names } => {
                    reorder_by_keys(&mut next.field_definitions, field_names, |f| f.name.as_str())
                }
                TypeAction::AddEnumValue { field_name, value } => {
                    if let Some(ValueType::Enum { values }) = next.field_type_mut(field_name) {
                        values.push(value.clone());
                    }
                }
                TypeAction::ChangeEnumValueOrder { field_name, keys } => {
                    if let Some(ValueType::Enum { values }) = next.field_type_mut(field_name) {
                        reorder_by_keys(values, keys, |v| v.key.as_str());
                    }
                }
                TypeAction::AddLocalizedEnumValue { field_name, value } => {
                    if let Some(ValueType::LocalizedEnum { values }) = next.field_type_mut(field_name)
                    {
                        values.push(value.clone());
                    }
                }
                TypeAction::ChangeLocalizedEnumValueOrder { field_name, keys } => {
                    if let Some(ValueType::LocalizedEnum { values }) = next.field_type_mut(field_name)
                    {
                        reorder_by_keys(values, keys, |v| v.key.as_str());
                    }
                }
            }
        }
        next.version += 1;
        next
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut FieldDefinition> {
        self.field_definitions.iter_mut().find(|f| f.name == name)
    }

    fn field_type_mut(&mut self, name: &str) -> Option<&mut ValueType> {
        self.field_mut(name).map(|f| &mut f.field_type)
    }
}

impl RemoteResource for CustomType {
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

/// An update action on a custom type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TypeAction {
    /// Replaces the name.
    ChangeName {
        /// New name.
        name: LocalizedString,
    },
    /// Sets or removes the description.
    SetDescription {
        /// New description.
        description: Option<LocalizedString>,
    },
    /// Removes a field definition.
    RemoveFieldDefinition {
        /// Field name.
        field_name: String,
    },
    /// Appends a field definition.
    AddFieldDefinition {
        /// The new field.
        field_definition: FieldDefinition,
    },
    /// Replaces the label of a field definition.
    ChangeFieldDefinitionLabel {
        /// Field name.
        field_name: String,
        /// New label.
        label: LocalizedString,
    },
    /// Reorders the field definitions.
    ChangeFieldDefinitionOrder {
        /// Every field name in the new order.
        field_names: Vec<String>,
    },
    /// Appends a plain enum value.
    AddEnumValue {
        /// Field name.
        field_name: String,
        /// The new value.
        value: PlainEnumValue,
    },
    /// Reorders the plain enum values.
    ChangeEnumValueOrder {
        /// Field name.
        field_name: String,
        /// Every value key in the new order.
        keys: Vec<String>,
    },
    /// Appends a localized enum value.
    AddLocalizedEnumValue {
        /// Field name.
        field_name: String,
        /// The new value.
        value: LocalizedEnumValue,
    },
    /// Reorders the localized enum values.
    ChangeLocalizedEnumValueOrder {
        /// Field name.
        field_name: String,
        /// Every value key in the new order.
        keys: Vec<String>,
    },
}

struct FieldPolicy;

impl CollectionPolicy for FieldPolicy {
    type Element = FieldDefinition;
    type Action = TypeAction;

    fn collection_name(&self) -> String {
        "field definitions".into()
    }

    fn remove(&self, removed: &[&FieldDefinition]) -> Vec<TypeAction> {
        removed
            .iter()
            .map(|field| TypeAction::RemoveFieldDefinition {
                field_name: field.name.clone(),
            })
            .collect()
    }

    fn change(&self, old: &FieldDefinition, new: &FieldDefinition) -> DiffResult<Vec<TypeAction>> {
        let mut actions: Vec<TypeAction> = build_update_action(&old.label, &new.label, || {
            TypeAction::ChangeFieldDefinitionLabel {
                field_name: new.name.clone(),
                label: new.label.clone(),
            }
        })
        .into_iter()
        .collect();

        let field_name = new.name.as_str();
        match (&old.field_type, &new.field_type) {
            (ValueType::Enum { values: old_values }, ValueType::Enum { values: new_values }) => {
                actions.extend(reconcile(
                    &PlainEnumPolicy { field_name },
                    old_values,
                    Some(new_values.as_slice()),
                )?);
            }
            (
                ValueType::LocalizedEnum { values: old_values },
                ValueType::LocalizedEnum { values: new_values },
            ) => {
                actions.extend(reconcile(
                    &LocalizedEnumPolicy { field_name },
                    old_values,
                    Some(new_values.as_slice()),
                )?);
            }
            (old_type, new_type) if old_type.kind() != new_type.kind() => {
                return Err(DiffError::unsupported_change(
                    format!("field '{field_name}'"),
                    format!("type changed from {} to {}", old_type.kind(), new_type.kind()),
                ));
            }
            _ => {}
        }
        Ok(actions)
    }

    fn add(&self, field: &FieldDefinition, _position: usize) -> TypeAction {
        TypeAction::AddFieldDefinition {
            field_definition: field.clone(),
        }
    }

    fn reorder(&self, new_order: &[&FieldDefinition]) -> Option<TypeAction> {
        Some(TypeAction::ChangeFieldDefinitionOrder {
            field_names: new_order.iter().map(|f| f.name.clone()).collect(),
        })
    }
}

struct PlainEnumPolicy<'a> {
    field_name: &'a str,
}

impl CollectionPolicy for PlainEnumPolicy<'_> {
    type Element = PlainEnumValue;
    type Action = TypeAction;

    fn collection_name(&self) -> String {
        format!("enum values of field '{}'", self.field_name)
    }

    fn add(&self, value: &PlainEnumValue, _position: usize) -> TypeAction {
        TypeAction::AddEnumValue {
            field_name: self.field_name.to_owned(),
            value: value.clone(),
        }
    }

    fn reorder(&self, new_order: &[&PlainEnumValue]) -> Option<TypeAction> {
        Some(TypeAction::ChangeEnumValueOrder {
            field_name: self.field_name.to_owned(),
            keys: new_order.iter().map(|v| v.key.clone()).collect(),
        })
    }
}

struct LocalizedEnumPolicy<'a> {
    field_name: &'a str,
}

impl CollectionPolicy for LocalizedEnumPolicy<'_> {
    type Element = LocalizedEnumValue;
    type Action = TypeAction;

    fn collection_name(&self) -> String {
        format!("localized enum values of field '{}'", self.field_name)
    }

    fn add(&self, value: &LocalizedEnumValue, _position: usize) -> TypeAction {
        TypeAction::AddLocalizedEnumValue {
            field_name: self.field_name.to_owned(),
            value: value.clone(),
        }
    }

    fn reorder(&self, new_order: &[&LocalizedEnumValue]) -> Option<TypeAction> {
        Some(TypeAction::ChangeLocalizedEnumValueOrder {
            field_name: self.field_name.to_owned(),
            keys: new_order.iter().map(|v| v.key.clone()).collect(),
        })
    }
}

/// Builds the actions for the plain enum values of one field.
///
/// Removed values and label changes produce no actions.
pub fn build_enum_value_actions(
    field_name: &str,
    old: &[PlainEnumValue],
    new: Option<&[PlainEnumValue]>,
) -> DiffResult<Vec<TypeAction>> {
    reconcile(&PlainEnumPolicy { field_name }, old, new)
}

/// Builds the actions for the localized enum values of one field.
///
/// Removed values and label changes produce no actions.
pub fn build_localized_enum_value_actions(
    field_name: &str,
    old: &[LocalizedEnumValue],
    new: Option<&[LocalizedEnumValue]>,
) -> DiffResult<Vec<TypeAction>> {
    reconcile(&LocalizedEnumPolicy { field_name }, old, new)
}

/// The custom type family.
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomTypes;

impl CustomTypes {
    /// Creates an in-memory custom type service.
    pub fn memory_service() -> MemoryResourceService<Self> {
        MemoryResourceService::new(
            |draft: &TypeDraft, id: String| CustomType::from_draft(draft, id),
            |custom_type: &CustomType, actions: &[TypeAction]| custom_type.apply(actions),
        )
    }
}

impl ResourceDiff for CustomTypes {
    type Resource = CustomType;
    type Draft = TypeDraft;
    type Action = TypeAction;

    fn build_actions(old: &CustomType, new: &TypeDraft) -> DiffResult<Vec<TypeAction>> {
        let mut actions: Vec<TypeAction> = [
            build_update_action(&old.name, &new.name, || TypeAction::ChangeName {
                name: new.name.clone(),
            }),
            build_optional_update_action(
                old.description.as_ref(),
                new.description.as_ref(),
                |description| TypeAction::SetDescription {
                    description: Some(description.clone()),
                },
                || TypeAction::SetDescription { description: None },
            ),
        ]
        .into_iter()
        .flatten()
        .collect();

        actions.extend(reconcile(
            &FieldPolicy,
            &old.field_definitions,
            Some(new.field_definitions.as_slice()),
        )?);
        Ok(actions)
    }
}

impl ResourceFamily for CustomTypes {
    const NAME: &'static str = "type";
    const PLURAL: &'static str = "types";
}
