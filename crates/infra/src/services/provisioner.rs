use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use serialtrack_catalog::Product;
use serialtrack_core::{Entity, ProductId, SerialId};
use serialtrack_serials::{ProvisionPlan, SerialCode, SerialState, validate_count};

use crate::error::{ServiceError, kinds};
use crate::store::{InventoryStore, StoreError};

/// Command: ProvisionBatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionBatch {
    pub product_id: ProductId,
    pub count: u32,
    #[serde(default)]
    pub state: SerialState,
    pub occurred_at: DateTime<Utc>,
}

/// One unit created by provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionedSerial {
    pub id: SerialId,
    pub code: SerialCode,
    pub state: SerialState,
}

/// Generates sequential serial codes (`<SKU>-001`, `<SKU>-002`, ...) for a product.
pub struct BatchProvisioner<S: InventoryStore + ?Sized> {
    store: Arc<S>,
}

impl<S: InventoryStore + ?Sized> BatchProvisioner<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Create `count` units continuing after the product's highest suffix.
    ///
    /// Reading the highest suffix and inserting the new run happen in one
    /// storage transaction holding the product lock.
    #[instrument(skip(self, cmd), fields(product_id = %cmd.product_id, count = cmd.count))]
    pub async fn provision(&self, cmd: ProvisionBatch) -> Result<Vec<ProvisionedSerial>, ServiceError> {
        validate_count(cmd.count)?;

        let product = self
            .store
            .get_product(cmd.product_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(Product::KIND, cmd.product_id))?;

        let plan = ProvisionPlan::new(
            product.id,
            product.sku.serial_base(),
            cmd.count,
            cmd.state,
            cmd.occurred_at,
        )?;

        let units = match self.store.provision(&plan).await {
            Ok(units) => units,
            Err(StoreError::NotFound) => {
                return Err(ServiceError::not_found(Product::KIND, cmd.product_id));
            }
            // A generated code is already held by another product.
            Err(StoreError::Unique { key, .. }) => {
                warn!(base = %plan.base, "generated serial code collides with an existing one");
                return Err(ServiceError::duplicate(
                    kinds::SERIAL_CODE,
                    key.into_iter().collect(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            base = %plan.base,
            first = units.first().map(|u| u.code.as_str()).unwrap_or_default(),
            last = units.last().map(|u| u.code.as_str()).unwrap_or_default(),
            "serials provisioned"
        );

        Ok(units
            .into_iter()
            .map(|u| ProvisionedSerial {
                id: u.id,
                code: u.code,
                state: u.state,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{CategoryRegistry, ProductCatalog, SerialRegistry};
    use crate::store::InMemoryInventoryStore;
    use serialtrack_catalog::CreateProduct;
    use serialtrack_serials::RegisterSerial;

    struct Fixture {
        store: Arc<InMemoryInventoryStore>,
        provisioner: BatchProvisioner<InMemoryInventoryStore>,
        product_id: ProductId,
    }

    async fn fixture(sku: &str) -> Fixture {
        let store = Arc::new(InMemoryInventoryStore::new());
        let category_id = CategoryRegistry::new(store.clone()).create("Disco Duro").await.unwrap();
        let product_id = ProductCatalog::new(store.clone())
            .create(CreateProduct {
                name: "HDD 1TB".into(),
                description: String::new(),
                category_id,
                sku: sku.into(),
                brand: None,
                model: None,
            })
            .await
            .unwrap();
        Fixture {
            provisioner: BatchProvisioner::new(store.clone()),
            store,
            product_id,
        }
    }

    fn cmd(product_id: ProductId, count: u32) -> ProvisionBatch {
        ProvisionBatch {
            product_id,
            count,
            state: SerialState::InStock,
            occurred_at: Utc::now(),
        }
    }

    fn codes(units: &[ProvisionedSerial]) -> Vec<&str> {
        units.iter().map(|u| u.code.as_str()).collect()
    }

    #[tokio::test]
    async fn provisioning_continues_the_sequence() {
        let f = fixture("ABC").await;

        let first = f.provisioner.provision(cmd(f.product_id, 3)).await.unwrap();
        assert_eq!(codes(&first), vec!["ABC-001", "ABC-002", "ABC-003"]);

        let second = f.provisioner.provision(cmd(f.product_id, 2)).await.unwrap();
        assert_eq!(codes(&second), vec!["ABC-004", "ABC-005"]);
    }

    #[tokio::test]
    async fn lowercase_sku_generates_uppercase_codes() {
        let f = fixture("hdd").await;
        let units = f.provisioner.provision(cmd(f.product_id, 1)).await.unwrap();
        assert_eq!(codes(&units), vec!["HDD-001"]);
    }

    #[tokio::test]
    async fn manual_codes_with_the_prefix_advance_the_sequence() {
        let f = fixture("ABC").await;
        SerialRegistry::new(f.store.clone())
            .register_one(RegisterSerial {
                product_id: f.product_id,
                code: "abc-x41".into(),
                occurred_at: Utc::now(),
            })
            .await
            .unwrap();

        let units = f.provisioner.provision(cmd(f.product_id, 1)).await.unwrap();
        assert_eq!(codes(&units), vec!["ABC-042"]);
    }

    #[tokio::test]
    async fn case_variant_sku_cannot_share_a_code_base() {
        let f = fixture("abc").await;
        f.provisioner.provision(cmd(f.product_id, 2)).await.unwrap();

        let err = ProductCatalog::new(f.store.clone())
            .create(CreateProduct {
                name: "HDD 1TB upper".into(),
                description: String::new(),
                category_id: f.store.list_categories().await.unwrap()[0].id,
                sku: "ABC".into(),
                brand: None,
                model: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateKey { kind: kinds::SKU, .. }));

        let next = f.provisioner.provision(cmd(f.product_id, 1)).await.unwrap();
        assert_eq!(codes(&next), vec!["ABC-003"]);
    }

    #[tokio::test]
    async fn count_bounds_and_unknown_product() {
        let f = fixture("ABC").await;
        for bad in [0, 101] {
            let err = f.provisioner.provision(cmd(f.product_id, bad)).await.unwrap_err();
            assert!(matches!(err, ServiceError::InvalidInput(_)));
        }
        assert_eq!(f.provisioner.provision(cmd(f.product_id, 100)).await.unwrap().len(), 100);

        let err = f.provisioner.provision(cmd(ProductId::new(), 1)).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { entity: "product", .. }));
    }

    #[tokio::test]
    async fn collision_with_another_products_code_inserts_nothing() {
        let f = fixture("ABC").await;
        let other = ProductCatalog::new(f.store.clone())
            .create(CreateProduct {
                name: "Other".into(),
                description: String::new(),
                category_id: f.store.list_categories().await.unwrap()[0].id,
                sku: "OTHER".into(),
                brand: None,
                model: None,
            })
            .await
            .unwrap();
        SerialRegistry::new(f.store.clone())
            .register_one(RegisterSerial {
                product_id: other,
                code: "ABC-002".into(),
                occurred_at: Utc::now(),
            })
            .await
            .unwrap();

        let err = f.provisioner.provision(cmd(f.product_id, 3)).await.unwrap_err();
        assert_eq!(err, ServiceError::duplicate(kinds::SERIAL_CODE, vec!["ABC-002".into()]));
        assert_eq!(f.store.count_serials_for_product(f.product_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrent_provisioning_never_reuses_a_suffix() {
        let f = fixture("CON").await;
        let provisioner = Arc::new(f.provisioner);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let provisioner = provisioner.clone();
            let product_id = f.product_id;
            handles.push(tokio::spawn(async move {
                provisioner.provision(cmd(product_id, 5)).await
            }));
        }

        let mut all = Vec::new();
        for h in handles {
            all.extend(h.await.unwrap().unwrap().into_iter().map(|u| u.code.into_string()));
        }
        all.sort();
        let expected: Vec<String> = (1..=40).map(|n| format!("CON-{n:03}")).collect();
        assert_eq!(all, expected);
    }
}
