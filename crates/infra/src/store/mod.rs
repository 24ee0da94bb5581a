//! Storage boundary for the inventory.
//!
//! Every method is one atomic unit of work. Uniqueness (`sku`, serial `code`,
//! case-folded category `label`) and referential integrity are enforced here,
//! not by callers: services may pre-check, but only as an early exit.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use serialtrack_catalog::{Category, Product, SearchTerm};
use serialtrack_core::{CategoryId, DomainError, ProductId, SerialId};
use serialtrack_serials::{
    ProvisionPlan, SerialCode, SerialHistoryEntry, SerialState, SerialUnit, TransitionSerial,
};
use serialtrack_stock::StockSnapshot;

pub use in_memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;

/// Constraint names shared by both stores (they match the migration).
pub mod constraints {
    pub const CATEGORY_LABEL: &str = "categories_label_lower_key";
    pub const PRODUCT_SKU: &str = "products_sku_key";
    pub const PRODUCT_CATEGORY: &str = "products_category_id_fkey";
    pub const SERIAL_CODE: &str = "serials_code_key";
    pub const SERIAL_PRODUCT: &str = "serials_product_id_fkey";
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A unique constraint rejected the write. `key` is the offending value
    /// when the backend reports it.
    #[error("unique constraint violated: {constraint}")]
    Unique {
        constraint: String,
        key: Option<String>,
    },

    #[error("foreign key constraint violated: {constraint}")]
    ForeignKey { constraint: String },

    /// The row an update or delete targets does not exist.
    #[error("row not found")]
    NotFound,

    /// A domain rule rejected the change inside the unit of work.
    #[error(transparent)]
    Rejected(#[from] DomainError),

    /// Connection or pool failure; the only retryable class.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn unique(constraint: &str, key: impl Into<String>) -> Self {
        Self::Unique {
            constraint: constraint.to_string(),
            key: Some(key.into()),
        }
    }

    pub fn foreign_key(constraint: &str) -> Self {
        Self::ForeignKey {
            constraint: constraint.to_string(),
        }
    }
}

/// A catalog search hit with its unit counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductMatch {
    pub product: Product,
    pub total: u64,
    pub in_stock: u64,
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn insert_category(&self, category: &Category) -> Result<(), StoreError>;

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError>;

    async fn category_exists(&self, id: CategoryId) -> Result<bool, StoreError>;

    /// Insert every category whose label is not already present
    /// (case-insensitively), atomically. Returns how many were inserted.
    async fn insert_categories_if_absent(
        &self,
        categories: &[Category],
    ) -> Result<usize, StoreError>;

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;

    /// Fails with `ForeignKey` while any unit references the product and with
    /// `NotFound` when there is no such product.
    async fn delete_product(&self, id: ProductId) -> Result<(), StoreError>;

    async fn count_serials_for_product(&self, id: ProductId) -> Result<u64, StoreError>;

    async fn search_products(&self, term: &SearchTerm) -> Result<Vec<ProductMatch>, StoreError>;

    /// Which of `codes` are already registered (to any product).
    async fn existing_codes(&self, codes: &[SerialCode]) -> Result<Vec<String>, StoreError>;

    /// Insert all units and their registration history entries, or none.
    async fn insert_serials(&self, units: &[SerialUnit]) -> Result<(), StoreError>;

    async fn get_serial(&self, id: SerialId) -> Result<Option<SerialUnit>, StoreError>;

    /// Apply a transition and append its history entry in one unit of work.
    async fn transition_serial(&self, cmd: &TransitionSerial) -> Result<SerialUnit, StoreError>;

    /// Remove a unit together with its history.
    async fn delete_serial(&self, id: SerialId) -> Result<(), StoreError>;

    async fn list_serials(
        &self,
        product_id: ProductId,
        state: Option<SerialState>,
    ) -> Result<Vec<SerialUnit>, StoreError>;

    /// History entries oldest first.
    async fn serial_history(&self, id: SerialId) -> Result<Vec<SerialHistoryEntry>, StoreError>;

    /// Lock the product, read its codes, plan the next run and insert it.
    ///
    /// `NotFound` when the product does not exist.
    async fn provision(&self, plan: &ProvisionPlan) -> Result<Vec<SerialUnit>, StoreError>;

    /// Products and grouped unit counts read at one instant.
    async fn stock_snapshot(&self) -> Result<StockSnapshot, StoreError>;
}
