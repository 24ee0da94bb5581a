use std::sync::Arc;

use tracing::{info, instrument, warn};

use serialtrack_auth::{Permission, Principal, authorize};
use serialtrack_catalog::{Category, CreateProduct, Product, SearchTerm};
use serialtrack_core::{Entity, ProductId};

use crate::error::{ServiceError, kinds};
use crate::store::{InventoryStore, ProductMatch, StoreError};

/// Product definitions: create, read, list, search, delete.
pub struct ProductCatalog<S: InventoryStore + ?Sized> {
    store: Arc<S>,
}

impl<S: InventoryStore + ?Sized> ProductCatalog<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, cmd), fields(sku = %cmd.sku.trim()))]
    pub async fn create(&self, cmd: CreateProduct) -> Result<ProductId, ServiceError> {
        let product = cmd.into_product(ProductId::new())?;

        if !self.store.category_exists(product.category_id).await? {
            warn!(category_id = %product.category_id, "unknown category");
            return Err(ServiceError::not_found(Category::KIND, product.category_id));
        }

        match self.store.insert_product(&product).await {
            Ok(()) => {
                info!(product_id = %product.id, sku = %product.sku, "product created");
                Ok(product.id)
            }
            Err(StoreError::Unique { .. }) => {
                warn!(sku = %product.sku, "duplicate sku");
                Err(ServiceError::duplicate(
                    kinds::SKU,
                    vec![product.sku.as_str().to_string()],
                ))
            }
            // Category removed between the pre-check and the insert.
            Err(StoreError::ForeignKey { .. }) => {
                Err(ServiceError::not_found(Category::KIND, product.category_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, id: ProductId) -> Result<Product, ServiceError> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(Product::KIND, id))
    }

    /// Products ordered by name.
    pub async fn list(&self) -> Result<Vec<Product>, ServiceError> {
        let mut products = self.store.list_products().await?;
        Product::sort_by_name(&mut products);
        Ok(products)
    }

    /// Products ordered by name, then brand, then model.
    pub async fn list_detailed(&self) -> Result<Vec<Product>, ServiceError> {
        let mut products = self.store.list_products().await?;
        Product::sort_detailed(&mut products);
        Ok(products)
    }

    /// Delete a product that has no serial units. Requires the admin role.
    #[instrument(skip(self, principal), fields(principal_id = %principal.principal_id))]
    pub async fn delete(&self, principal: &Principal, id: ProductId) -> Result<(), ServiceError> {
        authorize(principal, &Permission::new(Permission::PRODUCTS_DELETE))?;

        let dependents = self.store.count_serials_for_product(id).await?;
        if dependents > 0 {
            warn!(product_id = %id, dependents, "product still has serial units");
            return Err(has_dependents(id, dependents));
        }

        match self.store.delete_product(id).await {
            Ok(()) => {
                info!(product_id = %id, "product deleted");
                Ok(())
            }
            Err(StoreError::NotFound) => Err(ServiceError::not_found(Product::KIND, id)),
            // A unit was registered between the count and the delete.
            Err(StoreError::ForeignKey { .. }) => Err(has_dependents(id, 1)),
            Err(e) => Err(e.into()),
        }
    }

    /// Case-insensitive substring search over name, SKU, brand and model.
    #[instrument(skip(self))]
    pub async fn search(&self, term: &str) -> Result<Vec<ProductMatch>, ServiceError> {
        let term = SearchTerm::parse(term)?;
        let mut matches = self.store.search_products(&term).await?;
        matches.sort_by(|a, b| a.product.name.cmp(&b.product.name));
        Ok(matches)
    }
}

fn has_dependents(id: ProductId, at_least: u64) -> ServiceError {
    ServiceError::ReferentialViolation(format!(
        "product {id} has {at_least} or more serial units; delete them first"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::CategoryRegistry;
    use crate::store::InMemoryInventoryStore;
    use chrono::Utc;
    use serialtrack_auth::{PrincipalId, Role};
    use serialtrack_core::CategoryId;
    use serialtrack_serials::{SerialCode, SerialState, SerialUnit};
    use serialtrack_core::SerialId;

    struct Fixture {
        store: Arc<InMemoryInventoryStore>,
        catalog: ProductCatalog<InMemoryInventoryStore>,
        category_id: CategoryId,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryInventoryStore::new());
        let category_id = CategoryRegistry::new(store.clone())
            .create("Procesador")
            .await
            .unwrap();
        Fixture {
            catalog: ProductCatalog::new(store.clone()),
            store,
            category_id,
        }
    }

    fn cmd(category_id: CategoryId, name: &str, sku: &str) -> CreateProduct {
        CreateProduct {
            name: name.to_string(),
            description: String::new(),
            category_id,
            sku: sku.to_string(),
            brand: None,
            model: None,
        }
    }

    fn admin() -> Principal {
        Principal::new(PrincipalId::new(), vec![Role::admin()])
    }

    fn operator() -> Principal {
        Principal::new(PrincipalId::new(), vec![Role::operator()])
    }

    #[tokio::test]
    async fn duplicate_sku_is_rejected() {
        let f = fixture().await;
        f.catalog.create(cmd(f.category_id, "Ryzen 5", "CPU-R5")).await.unwrap();

        let err = f
            .catalog
            .create(cmd(f.category_id, "Ryzen 5 again", "CPU-R5"))
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::duplicate(kinds::SKU, vec!["CPU-R5".into()]));
        assert_eq!(f.catalog.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sku_differing_only_in_case_is_a_duplicate() {
        let f = fixture().await;
        f.catalog.create(cmd(f.category_id, "Disk", "abc")).await.unwrap();

        let err = f
            .catalog
            .create(cmd(f.category_id, "Disk upper", "ABC"))
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::duplicate(kinds::SKU, vec!["ABC".into()]));
        assert_eq!(f.catalog.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_category_is_not_found() {
        let f = fixture().await;
        let err = f
            .catalog
            .create(cmd(CategoryId::new(), "Orphan", "ORPH"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { entity: "category", .. }));
    }

    #[tokio::test]
    async fn empty_name_is_invalid_input() {
        let f = fixture().await;
        let err = f.catalog.create(cmd(f.category_id, "  ", "SKU")).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn detailed_listing_breaks_name_ties_by_brand_then_model() {
        let f = fixture().await;
        let mut a = cmd(f.category_id, "Mouse", "M-2");
        a.brand = Some("Logitech".into());
        a.model = Some("G502".into());
        let mut b = cmd(f.category_id, "Mouse", "M-1");
        b.brand = Some("Logitech".into());
        b.model = Some("G203".into());
        let c = cmd(f.category_id, "Monitor", "MON");
        for p in [a, b, c] {
            f.catalog.create(p).await.unwrap();
        }

        let skus: Vec<String> = f
            .catalog
            .list_detailed()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.sku.to_string())
            .collect();
        assert_eq!(skus, vec!["MON", "M-1", "M-2"]);
    }

    #[tokio::test]
    async fn delete_requires_admin_and_no_units() {
        let f = fixture().await;
        let id = f.catalog.create(cmd(f.category_id, "Disk", "HDD")).await.unwrap();
        let unit = SerialUnit::register(
            SerialId::new(),
            id,
            SerialCode::parse("HDD-001").unwrap(),
            SerialState::Retired,
            Utc::now(),
        );
        f.store.insert_serials(std::slice::from_ref(&unit)).await.unwrap();

        let err = f.catalog.delete(&operator(), id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let err = f.catalog.delete(&admin(), id).await.unwrap_err();
        assert!(matches!(err, ServiceError::ReferentialViolation(_)));

        f.store.delete_serial(unit.id).await.unwrap();
        f.catalog.delete(&admin(), id).await.unwrap();
        assert!(matches!(
            f.catalog.get(id).await.unwrap_err(),
            ServiceError::NotFound { entity: "product", .. }
        ));
        assert!(matches!(
            f.catalog.delete(&admin(), id).await.unwrap_err(),
            ServiceError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn search_matches_any_field_case_insensitively() {
        let f = fixture().await;
        let mut ryzen = cmd(f.category_id, "Procesador Ryzen", "CPU-R5");
        ryzen.brand = Some("AMD".into());
        f.catalog.create(ryzen).await.unwrap();
        let mut intel = cmd(f.category_id, "Core i5", "CPU-I5");
        intel.model = Some("12400F".into());
        f.catalog.create(intel).await.unwrap();

        let hits = f.catalog.search("amd").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].product.sku.as_str(), "CPU-R5");
        assert_eq!((hits[0].total, hits[0].in_stock), (0, 0));

        let names: Vec<String> = f
            .catalog
            .search("cpu")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.product.name)
            .collect();
        assert_eq!(names, vec!["Core i5", "Procesador Ryzen"]);

        assert_eq!(f.catalog.search("400f").await.unwrap().len(), 1);
        assert!(matches!(
            f.catalog.search(" a ").await.unwrap_err(),
            ServiceError::InvalidInput(_)
        ));
    }
}
