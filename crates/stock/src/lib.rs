//! Stock aggregation (derived, never persisted).
//!
//! Every view here is a pure function of one [`StockSnapshot`]: the product rows
//! plus per-(product, state) unit counts taken at the same instant. Stores are
//! responsible for producing a consistent snapshot; this crate only folds it.

pub mod snapshot;

pub use snapshot::{
    LOW_STOCK_THRESHOLD, LastActivity, LowStockRow, StateCountRow, StateCounts, Statistics,
    StockRow, StockSnapshot,
};
