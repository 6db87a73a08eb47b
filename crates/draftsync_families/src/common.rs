//! Value types shared by the families.

use draftsync_diff::KeyedElement;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A text with one value per locale.
///
/// Compares by content; locale order is irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedString(BTreeMap<String, String>);

impl LocalizedString {
    /// Creates an empty localized string.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a localized string with a single locale.
    pub fn of(locale: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new().with(locale, value)
    }

    /// Adds or replaces the value for `locale`.
    pub fn with(mut self, locale: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(locale.into(), value.into());
        self
    }

    /// Returns the value for `locale`.
    pub fn get(&self, locale: &str) -> Option<&str> {
        self.0.get(locale).map(String::as_str)
    }

    /// Returns true if no locale has a value.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for LocalizedString {
    fn from(values: [(&str, &str); N]) -> Self {
        values
            .into_iter()
            .fold(Self::new(), |text, (locale, value)| text.with(locale, value))
    }
}

/// An enum value with a plain label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlainEnumValue {
    /// Stable key.
    pub key: String,
    /// Display label.
    pub label: String,
}

impl PlainEnumValue {
    /// Creates an enum value.
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }
}

impl KeyedElement for PlainEnumValue {
    fn key(&self) -> &str {
        &self.key
    }
}

/// An enum value with a localized label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalizedEnumValue {
    /// Stable key.
    pub key: String,
    /// Display label per locale.
    pub label: LocalizedString,
}

impl LocalizedEnumValue {
    /// Creates an enum value.
    pub fn new(key: impl Into<String>, label: LocalizedString) -> Self {
        Self {
            key: key.into(),
            label,
        }
    }
}

impl KeyedElement for LocalizedEnumValue {
    fn key(&self) -> &str {
        &self.key
    }
}

/// The type of an attribute or custom field.
///
/// Enum value lists are always present here: a draft cannot ask for an
/// absent list. Callers holding a nullable list diff it with the family's
/// `build_*_enum_value_actions` functions, where `None` removes every value
/// the remote allows removing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "camelCase")]
pub enum ValueType {
    /// Free text.
    Text,
    /// A number.
    Number,
    /// A boolean.
    Boolean,
    /// One of an ordered list of plain enum values.
    Enum {
        /// The allowed values.
        values: Vec<PlainEnumValue>,
    },
    /// One of an ordered list of localized enum values.
    LocalizedEnum {
        /// The allowed values.
        values: Vec<LocalizedEnumValue>,
    },
}

impl ValueType {
    /// Returns the name of the type kind, ignoring enum values.
    pub fn kind(&self) -> &'static str {
        match self {
            ValueType::Text => "text",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::Enum { .. } => "enum",
            ValueType::LocalizedEnum { .. } => "localized enum",
        }
    }
}

/// Reorders `items` to follow `keys`. Items whose key is not listed keep
/// their relative order at the end.
pub(crate) fn reorder_by_keys<T, K>(items: &mut Vec<T>, keys: &[K], key_of: impl Fn(&T) -> &str)
where
    K: AsRef<str>,
{
    let position = |item: &T| {
        keys.iter()
            .position(|key| key.as_ref() == key_of(item))
            .unwrap_or(keys.len())
    };
    items.sort_by_key(|item| position(item));
}
