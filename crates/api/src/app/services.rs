use std::sync::Arc;

use serialtrack_infra::{InventoryServices, InventoryStore};

/// Services over whichever store the process was configured with.
pub type AppServices = InventoryServices<dyn InventoryStore>;

pub fn build_services(store: Arc<dyn InventoryStore>) -> AppServices {
    InventoryServices::new(store)
}
