use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use serialtrack_catalog::Product;
use serialtrack_core::ProductId;
use serialtrack_serials::{SerialState, SerialUnit};

/// Products at or below this many IN_STOCK units are flagged as low stock.
pub const LOW_STOCK_THRESHOLD: u64 = 3;

/// Unit counts per lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    pub in_stock: u64,
    pub installed: u64,
    pub damaged: u64,
    pub retired: u64,
}

impl StateCounts {
    pub fn get(&self, state: SerialState) -> u64 {
        match state {
            SerialState::InStock => self.in_stock,
            SerialState::Installed => self.installed,
            SerialState::Damaged => self.damaged,
            SerialState::Retired => self.retired,
        }
    }

    pub fn add(&mut self, state: SerialState, n: u64) {
        let slot = match state {
            SerialState::InStock => &mut self.in_stock,
            SerialState::Installed => &mut self.installed,
            SerialState::Damaged => &mut self.damaged,
            SerialState::Retired => &mut self.retired,
        };
        *slot += n;
    }

    pub fn total(&self) -> u64 {
        self.in_stock + self.installed + self.damaged + self.retired
    }
}

/// One row of a `GROUP BY product_id, state` count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateCountRow {
    pub product_id: ProductId,
    pub state: SerialState,
    pub count: u64,
}

/// State and time of a product's most recently touched unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastActivity {
    pub state: SerialState,
    pub at: DateTime<Utc>,
}

/// Point-in-time inputs for every stock view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockSnapshot {
    pub products: Vec<Product>,
    pub counts: Vec<StateCountRow>,
    pub last_activity: HashMap<ProductId, LastActivity>,
}

/// Per-product stock row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockRow {
    pub product: Product,
    pub counts: StateCounts,
    pub total: u64,
    pub low_stock: bool,
    pub last_activity: Option<LastActivity>,
}

/// Product whose IN_STOCK count is at or below the requested threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LowStockRow {
    pub product: Product,
    pub in_stock: u64,
}

/// System-wide snapshot figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub total_products: u64,
    pub total_serials: u64,
    pub low_stock_product_count: u64,
    pub by_state: StateCounts,
}

impl StockSnapshot {
    /// Build a snapshot from full unit rows (in-memory stores).
    pub fn from_units<'a>(
        products: Vec<Product>,
        units: impl IntoIterator<Item = &'a SerialUnit>,
    ) -> Self {
        let mut grouped: HashMap<(ProductId, SerialState), u64> = HashMap::new();
        let mut last_activity: HashMap<ProductId, LastActivity> = HashMap::new();

        for unit in units {
            *grouped.entry((unit.product_id, unit.state)).or_default() += 1;

            let candidate = LastActivity {
                state: unit.state,
                at: unit.updated_at,
            };
            last_activity
                .entry(unit.product_id)
                .and_modify(|cur| {
                    if candidate.at > cur.at {
                        *cur = candidate;
                    }
                })
                .or_insert(candidate);
        }

        let counts = grouped
            .into_iter()
            .map(|((product_id, state), count)| StateCountRow {
                product_id,
                state,
                count,
            })
            .collect();

        Self {
            products,
            counts,
            last_activity,
        }
    }

    fn counts_by_product(&self) -> HashMap<ProductId, StateCounts> {
        let mut by_product: HashMap<ProductId, StateCounts> = HashMap::new();
        for row in &self.counts {
            by_product
                .entry(row.product_id)
                .or_default()
                .add(row.state, row.count);
        }
        by_product
    }

    /// One row per product, including products without units, ordered by name.
    pub fn stock_view(&self) -> Vec<StockRow> {
        let by_product = self.counts_by_product();

        let mut rows: Vec<StockRow> = self
            .products
            .iter()
            .map(|p| {
                let counts = by_product.get(&p.id).copied().unwrap_or_default();
                StockRow {
                    product: p.clone(),
                    counts,
                    total: counts.total(),
                    low_stock: counts.in_stock <= LOW_STOCK_THRESHOLD,
                    last_activity: self.last_activity.get(&p.id).copied(),
                }
            })
            .collect();

        rows.sort_by(|a, b| a.product.name.cmp(&b.product.name));
        rows
    }

    /// Products with `in_stock <= threshold`, ascending by count then name.
    pub fn low_stock(&self, threshold: u64) -> Vec<LowStockRow> {
        let by_product = self.counts_by_product();

        let mut rows: Vec<LowStockRow> = self
            .products
            .iter()
            .filter_map(|p| {
                let in_stock = by_product.get(&p.id).map(|c| c.in_stock).unwrap_or(0);
                (in_stock <= threshold).then(|| LowStockRow {
                    product: p.clone(),
                    in_stock,
                })
            })
            .collect();

        rows.sort_by(|a, b| {
            a.in_stock
                .cmp(&b.in_stock)
                .then_with(|| a.product.name.cmp(&b.product.name))
        });
        rows
    }

    pub fn statistics(&self) -> Statistics {
        let by_product = self.counts_by_product();

        let mut by_state = StateCounts::default();
        for row in &self.counts {
            by_state.add(row.state, row.count);
        }

        let low_stock_product_count = self
            .products
            .iter()
            .filter(|p| {
                by_product.get(&p.id).map(|c| c.in_stock).unwrap_or(0) <= LOW_STOCK_THRESHOLD
            })
            .count() as u64;

        Statistics {
            total_products: self.products.len() as u64,
            total_serials: by_state.total(),
            low_stock_product_count,
            by_state,
        }
    }
}
