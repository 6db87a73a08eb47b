//! # draftsync families
//!
//! Resource families for draftsync.
//!
//! This crate provides:
//! - Categories with parent references
//! - Product types with attribute definitions and enum values
//! - Custom types with field definitions
//! - Tax categories with unordered tax rates
//! - Localized strings and enum value types shared by the families
//!
//! Each family implements `ResourceDiff` and `ResourceFamily`, and exposes an
//! in-memory service through `memory_service()`.
//!
//! ## Key Invariants
//!
//! - Applying the built actions to a resource yields a resource that
//!   produces no further actions against the same draft
//! - Product type enum values may be removed, relabeled, added and
//!   reordered; custom type enum values may only be added and reordered
//! - Tax rates are matched by key and never reordered
//! - A changed value type is an unsupported change, never a silent rewrite

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod category;
pub mod common;
pub mod custom_type;
pub mod product_type;
pub mod tax_category;

pub use category::{Categories, Category, CategoryAction, CategoryDraft};
pub use common::{LocalizedEnumValue, LocalizedString, PlainEnumValue, ValueType};
pub use custom_type::{CustomType, CustomTypes, FieldDefinition, TypeAction, TypeDraft};
pub use product_type::{
    AttributeDefinition, ProductType, ProductTypeAction, ProductTypeDraft, ProductTypes,
};
pub use tax_category::{TaxCategories, TaxCategory, TaxCategoryAction, TaxCategoryDraft, TaxRate};
