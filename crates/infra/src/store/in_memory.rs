use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use serialtrack_catalog::{Category, Product, SearchTerm};
use serialtrack_core::{CategoryId, ProductId, SerialId};
use serialtrack_serials::{
    ProvisionPlan, SerialCode, SerialHistoryEntry, SerialState, SerialUnit, TransitionSerial,
};
use serialtrack_stock::StockSnapshot;

use super::{InventoryStore, ProductMatch, StoreError, constraints};

#[derive(Debug, Default)]
struct Tables {
    categories: HashMap<CategoryId, Category>,
    products: HashMap<ProductId, Product>,
    serials: HashMap<SerialId, SerialUnit>,
    history: Vec<SerialHistoryEntry>,
}

impl Tables {
    fn label_taken(&self, fold_key: &str) -> bool {
        self.categories
            .values()
            .any(|c| c.label.fold_key() == fold_key)
    }

    fn code_taken(&self, code: &SerialCode) -> bool {
        self.serials.values().any(|u| &u.code == code)
    }

    fn codes_for(&self, product_id: ProductId) -> Vec<&str> {
        self.serials
            .values()
            .filter(|u| u.product_id == product_id)
            .map(|u| u.code.as_str())
            .collect()
    }

    /// Constraint checks for a set of new units, before anything is written.
    fn check_new_units(&self, units: &[SerialUnit]) -> Result<(), StoreError> {
        let mut batch = HashSet::new();
        for unit in units {
            if !self.products.contains_key(&unit.product_id) {
                return Err(StoreError::foreign_key(constraints::SERIAL_PRODUCT));
            }
            if self.code_taken(&unit.code) || !batch.insert(&unit.code) {
                return Err(StoreError::unique(constraints::SERIAL_CODE, unit.code.as_str()));
            }
        }
        Ok(())
    }

    fn insert_units(&mut self, units: &[SerialUnit]) {
        for unit in units {
            self.history.push(SerialHistoryEntry::registered(unit));
            self.serials.insert(unit.id, unit.clone());
        }
    }
}

/// In-memory inventory store for tests/dev.
///
/// Each operation runs under a single lock acquisition, which gives the same
/// atomicity and per-product serialization as the Postgres transactions.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    inner: RwLock<Tables>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".into()))
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn insert_category(&self, category: &Category) -> Result<(), StoreError> {
        let mut t = self.write()?;
        if t.label_taken(&category.label.fold_key()) {
            return Err(StoreError::unique(
                constraints::CATEGORY_LABEL,
                category.label.as_str(),
            ));
        }
        t.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        Ok(self.read()?.categories.values().cloned().collect())
    }

    async fn category_exists(&self, id: CategoryId) -> Result<bool, StoreError> {
        Ok(self.read()?.categories.contains_key(&id))
    }

    async fn insert_categories_if_absent(
        &self,
        categories: &[Category],
    ) -> Result<usize, StoreError> {
        let mut t = self.write()?;
        let mut inserted = 0;
        for category in categories {
            if t.label_taken(&category.label.fold_key()) {
                continue;
            }
            t.categories.insert(category.id, category.clone());
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut t = self.write()?;
        let sku_key = product.sku.fold_key();
        if t.products.values().any(|p| p.sku.fold_key() == sku_key) {
            return Err(StoreError::unique(constraints::PRODUCT_SKU, product.sku.as_str()));
        }
        if !t.categories.contains_key(&product.category_id) {
            return Err(StoreError::foreign_key(constraints::PRODUCT_CATEGORY));
        }
        t.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.read()?.products.get(&id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        Ok(self.read()?.products.values().cloned().collect())
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), StoreError> {
        let mut t = self.write()?;
        if !t.products.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        if t.serials.values().any(|u| u.product_id == id) {
            return Err(StoreError::foreign_key(constraints::SERIAL_PRODUCT));
        }
        t.products.remove(&id);
        Ok(())
    }

    async fn count_serials_for_product(&self, id: ProductId) -> Result<u64, StoreError> {
        let t = self.read()?;
        Ok(t.serials.values().filter(|u| u.product_id == id).count() as u64)
    }

    async fn search_products(&self, term: &SearchTerm) -> Result<Vec<ProductMatch>, StoreError> {
        let t = self.read()?;
        Ok(t.products
            .values()
            .filter(|p| term.matches(p))
            .map(|p| {
                let units = t.serials.values().filter(|u| u.product_id == p.id);
                let (total, in_stock) = units.fold((0, 0), |(total, in_stock), u| {
                    (total + 1, in_stock + u64::from(u.state == SerialState::InStock))
                });
                ProductMatch {
                    product: p.clone(),
                    total,
                    in_stock,
                }
            })
            .collect())
    }

    async fn existing_codes(&self, codes: &[SerialCode]) -> Result<Vec<String>, StoreError> {
        let t = self.read()?;
        Ok(codes
            .iter()
            .filter(|c| t.code_taken(c))
            .map(|c| c.as_str().to_string())
            .collect())
    }

    async fn insert_serials(&self, units: &[SerialUnit]) -> Result<(), StoreError> {
        let mut t = self.write()?;
        t.check_new_units(units)?;
        t.insert_units(units);
        Ok(())
    }

    async fn get_serial(&self, id: SerialId) -> Result<Option<SerialUnit>, StoreError> {
        Ok(self.read()?.serials.get(&id).cloned())
    }

    async fn transition_serial(&self, cmd: &TransitionSerial) -> Result<SerialUnit, StoreError> {
        let mut t = self.write()?;
        let Some(unit) = t.serials.get_mut(&cmd.serial_id) else {
            return Err(StoreError::NotFound);
        };
        let entry = unit.apply_transition(cmd)?;
        let updated = unit.clone();
        t.history.push(entry);
        Ok(updated)
    }

    async fn delete_serial(&self, id: SerialId) -> Result<(), StoreError> {
        let mut t = self.write()?;
        if t.serials.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        t.history.retain(|e| e.serial_id != id);
        Ok(())
    }

    async fn list_serials(
        &self,
        product_id: ProductId,
        state: Option<SerialState>,
    ) -> Result<Vec<SerialUnit>, StoreError> {
        let t = self.read()?;
        Ok(t.serials
            .values()
            .filter(|u| u.product_id == product_id)
            .filter(|u| state.is_none_or(|s| u.state == s))
            .cloned()
            .collect())
    }

    async fn serial_history(&self, id: SerialId) -> Result<Vec<SerialHistoryEntry>, StoreError> {
        let t = self.read()?;
        Ok(t.history
            .iter()
            .filter(|e| e.serial_id == id)
            .cloned()
            .collect())
    }

    async fn provision(&self, plan: &ProvisionPlan) -> Result<Vec<SerialUnit>, StoreError> {
        let mut t = self.write()?;
        if !t.products.contains_key(&plan.product_id) {
            return Err(StoreError::NotFound);
        }
        let units = plan.plan(t.codes_for(plan.product_id));
        t.check_new_units(&units)?;
        t.insert_units(&units);
        Ok(units)
    }

    async fn stock_snapshot(&self) -> Result<StockSnapshot, StoreError> {
        let t = self.read()?;
        Ok(StockSnapshot::from_units(
            t.products.values().cloned().collect(),
            t.serials.values(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serialtrack_catalog::{CategoryLabel, CreateProduct, Sku};

    async fn seeded() -> (InMemoryInventoryStore, Product) {
        let store = InMemoryInventoryStore::new();
        let category = Category::new(CategoryId::new(), CategoryLabel::parse("Monitor").unwrap());
        store.insert_category(&category).await.unwrap();

        let product = CreateProduct {
            name: "Monitor 24".into(),
            description: String::new(),
            category_id: category.id,
            sku: "MON24".into(),
            brand: None,
            model: None,
        }
        .into_product(ProductId::new())
        .unwrap();
        store.insert_product(&product).await.unwrap();
        (store, product)
    }

    fn unit(product: &Product, code: &str) -> SerialUnit {
        SerialUnit::register(
            SerialId::new(),
            product.id,
            SerialCode::parse(code).unwrap(),
            SerialState::InStock,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn category_labels_collide_case_insensitively() {
        let (store, _) = seeded().await;
        let dup = Category::new(CategoryId::new(), CategoryLabel::parse("MONITOR").unwrap());

        let err = store.insert_category(&dup).await.unwrap_err();
        assert!(matches!(err, StoreError::Unique { ref constraint, .. } if constraint == constraints::CATEGORY_LABEL));
        assert_eq!(store.insert_categories_if_absent(&[dup]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn skus_collide_case_insensitively() {
        let (store, product) = seeded().await;
        let mut variant = product.clone();
        variant.id = ProductId::new();
        variant.sku = Sku::parse("mon24").unwrap();

        let err = store.insert_product(&variant).await.unwrap_err();
        assert_eq!(err, StoreError::unique(constraints::PRODUCT_SKU, "mon24"));
        assert_eq!(store.list_products().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn insert_serials_is_all_or_nothing() {
        let (store, product) = seeded().await;
        store.insert_serials(&[unit(&product, "A")]).await.unwrap();

        let err = store
            .insert_serials(&[unit(&product, "B"), unit(&product, "A")])
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::unique(constraints::SERIAL_CODE, "A"));
        assert_eq!(store.count_serials_for_product(product.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn units_require_an_existing_product() {
        let (store, product) = seeded().await;
        let mut orphan = unit(&product, "ORPHAN");
        orphan.product_id = ProductId::new();

        let err = store.insert_serials(&[orphan]).await.unwrap_err();
        assert_eq!(err, StoreError::foreign_key(constraints::SERIAL_PRODUCT));
    }

    #[tokio::test]
    async fn delete_serial_drops_its_history() {
        let (store, product) = seeded().await;
        let u = unit(&product, "H-1");
        store.insert_serials(std::slice::from_ref(&u)).await.unwrap();
        assert_eq!(store.serial_history(u.id).await.unwrap().len(), 1);

        store.delete_serial(u.id).await.unwrap();
        assert!(store.serial_history(u.id).await.unwrap().is_empty());
        assert_eq!(store.delete_serial(u.id).await.unwrap_err(), StoreError::NotFound);
    }

    #[tokio::test]
    async fn product_with_units_cannot_be_deleted() {
        let (store, product) = seeded().await;
        store.insert_serials(&[unit(&product, "X")]).await.unwrap();

        let err = store.delete_product(product.id).await.unwrap_err();
        assert!(matches!(err, StoreError::ForeignKey { .. }));
        assert!(store.get_product(product.id).await.unwrap().is_some());
    }
}
