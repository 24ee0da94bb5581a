use std::sync::Arc;

use tracing::{info, instrument, warn};

use serialtrack_catalog::{Category, CategoryLabel, DEFAULT_CATEGORIES, missing_defaults};
use serialtrack_core::CategoryId;

use crate::error::{ServiceError, kinds};
use crate::store::{InventoryStore, StoreError};

/// Category creation, listing and idempotent seeding.
pub struct CategoryRegistry<S: InventoryStore + ?Sized> {
    store: Arc<S>,
}

impl<S: InventoryStore + ?Sized> CategoryRegistry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn create(&self, label: &str) -> Result<CategoryId, ServiceError> {
        let label = CategoryLabel::parse(label)?;
        let category = Category::new(CategoryId::new(), label);

        match self.store.insert_category(&category).await {
            Ok(()) => {
                info!(category_id = %category.id, label = %category.label, "category created");
                Ok(category.id)
            }
            Err(StoreError::Unique { .. }) => {
                warn!(label = %category.label, "duplicate category label");
                Err(ServiceError::duplicate(
                    kinds::CATEGORY_LABEL,
                    vec![category.label.as_str().to_string()],
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// All categories ordered by label.
    pub async fn list(&self) -> Result<Vec<Category>, ServiceError> {
        let mut categories = self.store.list_categories().await?;
        categories.sort_by(|a, b| a.label.as_str().cmp(b.label.as_str()));
        Ok(categories)
    }

    /// Insert the canonical labels not yet present (case-insensitively).
    ///
    /// Returns how many were inserted; a second call returns 0.
    #[instrument(skip(self))]
    pub async fn seed_defaults(&self) -> Result<usize, ServiceError> {
        let existing = self.store.list_categories().await?;
        let missing = missing_defaults(existing.iter().map(|c| c.label.as_str()));
        if missing.is_empty() {
            return Ok(0);
        }

        let candidates = missing
            .into_iter()
            .map(|label| Ok(Category::new(CategoryId::new(), CategoryLabel::parse(label)?)))
            .collect::<Result<Vec<_>, ServiceError>>()?;

        let inserted = self.store.insert_categories_if_absent(&candidates).await?;
        info!(inserted, canonical = DEFAULT_CATEGORIES.len(), "default categories seeded");
        Ok(inserted)
    }
}
