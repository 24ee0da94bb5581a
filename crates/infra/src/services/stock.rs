use std::sync::Arc;

use tracing::instrument;

use serialtrack_stock::{LowStockRow, Statistics, StockRow};

use crate::error::ServiceError;
use crate::store::InventoryStore;

/// Read-only stock views, each computed from one fresh snapshot.
pub struct StockAggregator<S: InventoryStore + ?Sized> {
    store: Arc<S>,
}

impl<S: InventoryStore + ?Sized> StockAggregator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn stock_view(&self) -> Result<Vec<StockRow>, ServiceError> {
        Ok(self.store.stock_snapshot().await?.stock_view())
    }

    #[instrument(skip(self))]
    pub async fn low_stock(&self, threshold: u64) -> Result<Vec<LowStockRow>, ServiceError> {
        Ok(self.store.stock_snapshot().await?.low_stock(threshold))
    }

    #[instrument(skip(self))]
    pub async fn statistics(&self) -> Result<Statistics, ServiceError> {
        Ok(self.store.stock_snapshot().await?.statistics())
    }
}
