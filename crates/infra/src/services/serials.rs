use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use serialtrack_auth::{Permission, Principal, authorize};
use serialtrack_catalog::Product;
use serialtrack_core::{Entity, ProductId, SerialId};
use serialtrack_serials::{
    RegisterBatch, RegisterSerial, SerialCode, SerialHistoryEntry, SerialState, SerialUnit,
    TransitionSerial, internal_duplicates, normalize_codes,
};

use crate::error::{ServiceError, kinds};
use crate::store::{InventoryStore, StoreError};

/// Registration, lifecycle transitions and removal of individual units.
pub struct SerialRegistry<S: InventoryStore + ?Sized> {
    store: Arc<S>,
}

impl<S: InventoryStore + ?Sized> SerialRegistry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn require_product(&self, id: ProductId) -> Result<(), ServiceError> {
        match self.store.get_product(id).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::not_found(Product::KIND, id)),
        }
    }

    /// Register one unit, IN_STOCK.
    #[instrument(skip(self, cmd), fields(product_id = %cmd.product_id))]
    pub async fn register_one(&self, cmd: RegisterSerial) -> Result<SerialId, ServiceError> {
        let unit = cmd.into_unit(SerialId::new())?;
        self.require_product(unit.product_id).await?;

        let taken = self.store.existing_codes(std::slice::from_ref(&unit.code)).await?;
        if !taken.is_empty() {
            warn!(code = %unit.code, "serial code already registered");
            return Err(ServiceError::duplicate(kinds::SERIAL_CODE, taken));
        }

        self.insert(unit.product_id, std::slice::from_ref(&unit)).await?;
        info!(serial_id = %unit.id, code = %unit.code, "serial registered");
        Ok(unit.id)
    }

    /// Register every code or none.
    ///
    /// All offending codes (repeated within the batch or already registered)
    /// are reported together.
    #[instrument(skip(self, cmd), fields(product_id = %cmd.product_id, codes = cmd.codes.len()))]
    pub async fn register_batch(&self, cmd: RegisterBatch) -> Result<Vec<SerialId>, ServiceError> {
        let codes = normalize_codes(&cmd.codes)?;
        self.require_product(cmd.product_id).await?;

        let mut offending = internal_duplicates(&codes);
        let mut unique: Vec<SerialCode> = Vec::with_capacity(codes.len());
        let mut seen = HashSet::new();
        for code in &codes {
            if seen.insert(code.as_str()) {
                unique.push(code.clone());
            }
        }
        for code in self.store.existing_codes(&unique).await? {
            if !offending.contains(&code) {
                offending.push(code);
            }
        }
        if !offending.is_empty() {
            warn!(offending = offending.len(), "batch rejected: duplicate serial codes");
            return Err(ServiceError::duplicate(kinds::SERIAL_CODE, offending));
        }

        let units: Vec<SerialUnit> = codes
            .into_iter()
            .map(|code| {
                SerialUnit::register(SerialId::new(), cmd.product_id, code, cmd.state, cmd.occurred_at)
            })
            .collect();

        self.insert(cmd.product_id, &units).await?;
        info!(registered = units.len(), state = %cmd.state, "serial batch registered");
        Ok(units.into_iter().map(|u| u.id).collect())
    }

    async fn insert(&self, product_id: ProductId, units: &[SerialUnit]) -> Result<(), ServiceError> {
        match self.store.insert_serials(units).await {
            Ok(()) => Ok(()),
            // Lost a race with a concurrent registration.
            Err(StoreError::Unique { key, .. }) => Err(ServiceError::duplicate(
                kinds::SERIAL_CODE,
                match key {
                    Some(key) => vec![key],
                    None => units.iter().map(|u| u.code.to_string()).collect(),
                },
            )),
            Err(StoreError::ForeignKey { .. }) => Err(ServiceError::not_found(Product::KIND, product_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Move a unit to any state, replacing its notes.
    #[instrument(skip(self, cmd), fields(serial_id = %cmd.serial_id, state = %cmd.state))]
    pub async fn transition(&self, cmd: TransitionSerial) -> Result<SerialUnit, ServiceError> {
        match self.store.transition_serial(&cmd).await {
            Ok(unit) => {
                info!(serial_id = %unit.id, state = %unit.state, "serial state changed");
                Ok(unit)
            }
            Err(StoreError::NotFound) => Err(ServiceError::not_found(SerialUnit::KIND, cmd.serial_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a unit and its history. Requires the admin role.
    #[instrument(skip(self, principal), fields(principal_id = %principal.principal_id))]
    pub async fn delete(&self, principal: &Principal, id: SerialId) -> Result<(), ServiceError> {
        if let Err(e) = authorize(principal, &Permission::new(Permission::SERIALS_DELETE)) {
            warn!(serial_id = %id, "serial deletion denied");
            return Err(e.into());
        }

        match self.store.delete_serial(id).await {
            Ok(()) => {
                info!(serial_id = %id, "serial deleted");
                Ok(())
            }
            Err(StoreError::NotFound) => Err(ServiceError::not_found(SerialUnit::KIND, id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Units of one product, ordered by state then code.
    pub async fn list_by_product(
        &self,
        product_id: ProductId,
        state: Option<SerialState>,
    ) -> Result<Vec<SerialUnit>, ServiceError> {
        self.require_product(product_id).await?;
        let mut units = self.store.list_serials(product_id, state).await?;
        SerialUnit::sort_for_listing(&mut units);
        Ok(units)
    }

    pub async fn get(&self, id: SerialId) -> Result<SerialUnit, ServiceError> {
        self.store
            .get_serial(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(SerialUnit::KIND, id))
    }

    /// History entries, oldest first.
    pub async fn history(&self, id: SerialId) -> Result<Vec<SerialHistoryEntry>, ServiceError> {
        self.get(id).await?;
        Ok(self.store.serial_history(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{CategoryRegistry, ProductCatalog};
    use crate::store::InMemoryInventoryStore;
    use chrono::{Duration, Utc};
    use serialtrack_auth::{PrincipalId, Role};
    use serialtrack_catalog::CreateProduct;

    struct Fixture {
        serials: SerialRegistry<InMemoryInventoryStore>,
        product_id: ProductId,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryInventoryStore::new());
        let category_id = CategoryRegistry::new(store.clone()).create("Memoria RAM").await.unwrap();
        let product_id = ProductCatalog::new(store.clone())
            .create(CreateProduct {
                name: "DDR4 16GB".into(),
                description: String::new(),
                category_id,
                sku: "RAM16".into(),
                brand: None,
                model: None,
            })
            .await
            .unwrap();
        Fixture {
            serials: SerialRegistry::new(store),
            product_id,
        }
    }

    fn register(product_id: ProductId, code: &str) -> RegisterSerial {
        RegisterSerial {
            product_id,
            code: code.to_string(),
            occurred_at: Utc::now(),
        }
    }

    fn batch(product_id: ProductId, codes: &[&str]) -> RegisterBatch {
        RegisterBatch {
            product_id,
            codes: codes.iter().map(|c| c.to_string()).collect(),
            state: SerialState::InStock,
            occurred_at: Utc::now(),
        }
    }

    fn transition(serial_id: SerialId, state: SerialState, notes: Option<&str>) -> TransitionSerial {
        TransitionSerial {
            serial_id,
            state,
            notes: notes.map(str::to_string),
            occurred_at: Utc::now() + Duration::seconds(1),
        }
    }

    #[tokio::test]
    async fn register_one_normalizes_and_rejects_duplicates_across_case() {
        let f = fixture().await;
        let id = f.serials.register_one(register(f.product_id, " ram-001 ")).await.unwrap();

        let unit = f.serials.get(id).await.unwrap();
        assert_eq!(unit.code.as_str(), "RAM-001");
        assert_eq!(unit.state, SerialState::InStock);

        let err = f.serials.register_one(register(f.product_id, "RAM-001")).await.unwrap_err();
        assert_eq!(err, ServiceError::duplicate(kinds::SERIAL_CODE, vec!["RAM-001".into()]));
    }

    #[tokio::test]
    async fn register_one_checks_product_and_blank_code() {
        let f = fixture().await;
        let err = f.serials.register_one(register(ProductId::new(), "X-1")).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { entity: "product", .. }));

        let err = f.serials.register_one(register(f.product_id, "   ")).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn batch_with_any_duplicate_inserts_nothing_and_lists_all_offenders() {
        let f = fixture().await;
        f.serials.register_one(register(f.product_id, "B-2")).await.unwrap();

        let err = f
            .serials
            .register_batch(batch(f.product_id, &["b-1", "B-2", "b-3", "B-1", "b-4"]))
            .await
            .unwrap_err();
        match err {
            ServiceError::DuplicateKey { kind, keys } => {
                assert_eq!(kind, kinds::SERIAL_CODE);
                assert_eq!(keys, vec!["B-1".to_string(), "B-2".to_string()]);
            }
            other => panic!("expected DuplicateKey, got {other:?}"),
        }

        let units = f.serials.list_by_product(f.product_id, None).await.unwrap();
        assert_eq!(units.len(), 1);
    }

    #[tokio::test]
    async fn batch_honors_requested_state_and_rejects_empty() {
        let f = fixture().await;
        let mut cmd = batch(f.product_id, &["D-1", "D-2"]);
        cmd.state = SerialState::Damaged;
        let ids = f.serials.register_batch(cmd).await.unwrap();
        assert_eq!(ids.len(), 2);

        let damaged = f
            .serials
            .list_by_product(f.product_id, Some(SerialState::Damaged))
            .await
            .unwrap();
        assert_eq!(damaged.len(), 2);

        let err = f.serials.register_batch(batch(f.product_id, &[])).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn any_state_may_follow_any_state() {
        let f = fixture().await;
        let id = f.serials.register_one(register(f.product_id, "T-1")).await.unwrap();
        let before = f.serials.get(id).await.unwrap();

        for state in [
            SerialState::Retired,
            SerialState::InStock,
            SerialState::Damaged,
            SerialState::Installed,
            SerialState::InStock,
        ] {
            let unit = f.serials.transition(transition(id, state, None)).await.unwrap();
            assert_eq!(unit.state, state);
        }

        let after = f
            .serials
            .transition(transition(id, SerialState::Installed, Some("client 42")))
            .await
            .unwrap();
        assert!(after.updated_at > before.updated_at);
        assert_eq!(after.notes.as_deref(), Some("client 42"));
        assert_eq!(after.registered_at, before.registered_at);
    }

    #[tokio::test]
    async fn transition_of_unknown_serial_is_not_found() {
        let f = fixture().await;
        let err = f
            .serials
            .transition(transition(SerialId::new(), SerialState::Retired, None))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { entity: "serial", .. }));
    }

    #[tokio::test]
    async fn history_records_registration_and_each_transition() {
        let f = fixture().await;
        let id = f.serials.register_one(register(f.product_id, "H-1")).await.unwrap();
        f.serials
            .transition(transition(id, SerialState::Installed, Some("rack 3")))
            .await
            .unwrap();

        let history = f.serials.history(id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].from_state, None);
        assert_eq!(history[0].to_state, SerialState::InStock);
        assert_eq!(history[1].from_state, Some(SerialState::InStock));
        assert_eq!(history[1].to_state, SerialState::Installed);
        assert_eq!(history[1].notes.as_deref(), Some("rack 3"));
    }

    #[tokio::test]
    async fn delete_requires_admin_and_removes_history() {
        let f = fixture().await;
        let id = f.serials.register_one(register(f.product_id, "DEL-1")).await.unwrap();

        let operator = Principal::new(PrincipalId::new(), vec![Role::operator()]);
        let err = f.serials.delete(&operator, id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        assert!(f.serials.get(id).await.is_ok());

        let admin = Principal::new(PrincipalId::new(), vec![Role::admin()]);
        f.serials.delete(&admin, id).await.unwrap();
        assert!(matches!(
            f.serials.history(id).await.unwrap_err(),
            ServiceError::NotFound { entity: "serial", .. }
        ));
        assert!(matches!(
            f.serials.delete(&admin, id).await.unwrap_err(),
            ServiceError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn listing_orders_by_state_then_code() {
        let f = fixture().await;
        f.serials
            .register_batch(batch(f.product_id, &["C", "A", "B"]))
            .await
            .unwrap();
        let a = f
            .serials
            .list_by_product(f.product_id, None)
            .await
            .unwrap()
            .into_iter()
            .find(|u| u.code.as_str() == "A")
            .unwrap();
        f.serials
            .transition(transition(a.id, SerialState::Retired, None))
            .await
            .unwrap();

        let codes: Vec<String> = f
            .serials
            .list_by_product(f.product_id, None)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.code.into_string())
            .collect();
        assert_eq!(codes, vec!["B", "C", "A"]);

        let err = f.serials.list_by_product(ProductId::new(), None).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { entity: "product", .. }));
    }
}
