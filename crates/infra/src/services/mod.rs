//! Application services: one per inventory capability.
//!
//! Services own no state beyond a handle to the store. They validate input with
//! the domain crates, delegate atomic work to [`InventoryStore`], and translate
//! every failure into [`ServiceError`](crate::ServiceError).

mod catalog;
mod categories;
mod provisioner;
mod serials;
mod stock;

use std::sync::Arc;

pub use catalog::ProductCatalog;
pub use categories::CategoryRegistry;
pub use provisioner::{BatchProvisioner, ProvisionBatch, ProvisionedSerial};
pub use serials::SerialRegistry;
pub use stock::StockAggregator;

use crate::store::InventoryStore;

/// All services over one shared store.
pub struct InventoryServices<S: InventoryStore + ?Sized> {
    pub categories: CategoryRegistry<S>,
    pub catalog: ProductCatalog<S>,
    pub serials: SerialRegistry<S>,
    pub provisioner: BatchProvisioner<S>,
    pub stock: StockAggregator<S>,
}

impl<S: InventoryStore + ?Sized> InventoryServices<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            categories: CategoryRegistry::new(store.clone()),
            catalog: ProductCatalog::new(store.clone()),
            serials: SerialRegistry::new(store.clone()),
            provisioner: BatchProvisioner::new(store.clone()),
            stock: StockAggregator::new(store),
        }
    }
}
