//! Catalog domain module: product categories and product definitions.
//!
//! Pure validation and ordering rules (no IO, no HTTP, no storage). Uniqueness
//! of SKUs and labels is a storage constraint; this crate only guarantees that
//! values reaching the store are already normalized.

pub mod category;
pub mod product;

pub use category::{Category, CategoryLabel, DEFAULT_CATEGORIES, missing_defaults};
pub use product::{CreateProduct, Product, SearchTerm, Sku};
