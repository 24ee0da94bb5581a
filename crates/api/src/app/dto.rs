use serde::{Deserialize, Serialize};

use serialtrack_catalog::Product;
use serialtrack_core::{CategoryId, DomainResult, ProductId, SerialId};
use serialtrack_infra::store::ProductMatch;
use serialtrack_serials::SerialState;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub label: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category_id: String,
    pub sku: String,
    pub brand: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterSerialRequest {
    pub product_id: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterBatchRequest {
    pub product_id: String,
    pub codes: Vec<String>,
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProvisionRequest {
    /// Signed so that negative counts surface as a validation error, not a
    /// JSON rejection.
    pub count: i64,
    pub state: Option<String>,
}

impl ProvisionRequest {
    /// Out-of-range values saturate; the service rejects anything outside 1..=100.
    pub fn count(&self) -> u32 {
        u32::try_from(self.count.max(0)).unwrap_or(u32::MAX)
    }
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub state: String,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListProductsQuery {
    #[serde(default)]
    pub detailed: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListSerialsQuery {
    pub state: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LowStockQuery {
    pub threshold: Option<u64>,
}

/// Parse an optional, case-insensitive state; absent means IN_STOCK.
pub fn state_or_default(raw: Option<&str>) -> DomainResult<SerialState> {
    raw.map(str::parse::<SerialState>).transpose().map(Option::unwrap_or_default)
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct CreatedCategory {
    pub id: CategoryId,
}

#[derive(Debug, Serialize)]
pub struct CreatedProduct {
    pub id: ProductId,
}

#[derive(Debug, Serialize)]
pub struct CreatedSerial {
    pub id: SerialId,
}

#[derive(Debug, Serialize)]
pub struct CreatedSerials {
    pub ids: Vec<SerialId>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct SeedResult {
    pub inserted: usize,
}

#[derive(Debug, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub product: Product,
    pub total: u64,
    pub in_stock: u64,
}

impl From<ProductMatch> for SearchHit {
    fn from(m: ProductMatch) -> Self {
        Self {
            product: m.product,
            total: m.total,
            in_stock: m.in_stock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provision_count_saturates() {
        let req = |count| ProvisionRequest { count, state: None };
        assert_eq!(req(-5).count(), 0);
        assert_eq!(req(7).count(), 7);
        assert_eq!(req(i64::MAX).count(), u32::MAX);
    }

    #[test]
    fn state_defaults_to_in_stock_and_parses_any_case() {
        assert_eq!(state_or_default(None).unwrap(), SerialState::InStock);
        assert_eq!(state_or_default(Some("damaged")).unwrap(), SerialState::Damaged);
        assert!(state_or_default(Some("LOST")).is_err());
    }
}
