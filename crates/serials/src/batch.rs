//! Batch registration and provisioning rules.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use serialtrack_core::{DomainError, DomainResult, ProductId, SerialId};

use crate::{SerialCode, SerialState, SerialUnit, format_code, parse_suffix};

/// Upper bound on units created by one batch request.
pub const MAX_BATCH: u32 = 100;

/// Provisioning count must be within `1..=MAX_BATCH`.
pub fn validate_count(count: u32) -> DomainResult<()> {
    if count == 0 || count > MAX_BATCH {
        return Err(DomainError::validation(format!(
            "count must be between 1 and {MAX_BATCH} (got {count})"
        )));
    }
    Ok(())
}

/// Normalize a caller-supplied list of codes, preserving order.
///
/// Rejects an empty list, lists larger than [`MAX_BATCH`], and blank codes.
/// Duplicates are left in place; see [`internal_duplicates`].
pub fn normalize_codes(raw: &[String]) -> DomainResult<Vec<SerialCode>> {
    if raw.is_empty() {
        return Err(DomainError::validation("batch must contain at least one code"));
    }
    if raw.len() > MAX_BATCH as usize {
        return Err(DomainError::validation(format!(
            "batch cannot exceed {MAX_BATCH} codes (got {})",
            raw.len()
        )));
    }
    raw.iter().map(|c| SerialCode::parse(c)).collect()
}

/// Codes that appear more than once in `codes`, each reported once, in order of
/// first repetition.
pub fn internal_duplicates(codes: &[SerialCode]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut dups = Vec::new();

    for code in codes {
        if !seen.insert(code.as_str()) && reported.insert(code.as_str()) {
            dups.push(code.as_str().to_string());
        }
    }
    dups
}

/// Command: RegisterBatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterBatch {
    pub product_id: ProductId,
    pub codes: Vec<String>,
    #[serde(default)]
    pub state: SerialState,
    pub occurred_at: DateTime<Utc>,
}

/// A provisioning request resolved against a product's SKU.
///
/// Planning is pure: given the product's existing codes it yields the next
/// contiguous run of units. The store runs [`ProvisionPlan::plan`] inside the
/// same transaction that reads the existing codes and inserts the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionPlan {
    pub product_id: ProductId,
    pub base: String,
    pub count: u32,
    pub state: SerialState,
    pub occurred_at: DateTime<Utc>,
}

impl ProvisionPlan {
    pub fn new(
        product_id: ProductId,
        base: impl Into<String>,
        count: u32,
        state: SerialState,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        validate_count(count)?;
        let base = base.into();
        if base.trim().is_empty() {
            return Err(DomainError::validation("serial base cannot be empty"));
        }
        Ok(Self {
            product_id,
            base,
            count,
            state,
            occurred_at,
        })
    }

    /// Prefix shared by every generated code (`"{base}-"`).
    pub fn prefix(&self) -> String {
        format!("{}-", self.base)
    }

    /// Highest suffix among `existing`, or 0 when none match.
    pub fn max_suffix<'a>(&self, existing: impl IntoIterator<Item = &'a str>) -> u64 {
        existing
            .into_iter()
            .filter_map(|code| parse_suffix(code, &self.base))
            .max()
            .unwrap_or(0)
    }

    /// Units numbered `M+1 ..= M+count`, where `M` is the highest existing suffix.
    pub fn plan<'a>(&self, existing: impl IntoIterator<Item = &'a str>) -> Vec<SerialUnit> {
        let start = self.max_suffix(existing);

        (1..=u64::from(self.count))
            .map(|offset| {
                SerialUnit::register(
                    SerialId::new(),
                    self.product_id,
                    format_code(&self.base, start.saturating_add(offset)),
                    self.state,
                    self.occurred_at,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(count: u32) -> ProvisionPlan {
        ProvisionPlan::new(ProductId::new(), "ABC", count, SerialState::InStock, Utc::now()).unwrap()
    }

    fn codes(units: &[SerialUnit]) -> Vec<&str> {
        units.iter().map(|u| u.code.as_str()).collect()
    }

    #[test]
    fn count_bounds() {
        assert!(validate_count(0).is_err());
        assert!(validate_count(1).is_ok());
        assert!(validate_count(100).is_ok());
        assert!(validate_count(101).is_err());
        assert!(ProvisionPlan::new(ProductId::new(), "ABC", 0, SerialState::InStock, Utc::now()).is_err());
    }

    #[test]
    fn first_provision_starts_at_one() {
        let units = plan(3).plan(std::iter::empty());
        assert_eq!(codes(&units), vec!["ABC-001", "ABC-002", "ABC-003"]);
        assert!(units.iter().all(|u| u.state == SerialState::InStock));
    }

    #[test]
    fn provision_continues_after_highest_suffix() {
        let existing = ["ABC-001", "ABC-003", "ABC-002", "OTHER-900", "ABCX-500"];
        let units = plan(2).plan(existing);
        assert_eq!(codes(&units), vec!["ABC-004", "ABC-005"]);
    }

    #[test]
    fn gaps_are_not_refilled() {
        let units = plan(1).plan(["ABC-010"]);
        assert_eq!(codes(&units), vec!["ABC-011"]);
    }

    #[test]
    fn provision_past_999_widens() {
        let units = plan(2).plan(["ABC-999"]);
        assert_eq!(codes(&units), vec!["ABC-1000", "ABC-1001"]);
    }

    #[test]
    fn provisioned_state_is_honored() {
        let p = ProvisionPlan::new(ProductId::new(), "ABC", 1, SerialState::Damaged, Utc::now()).unwrap();
        assert_eq!(p.plan(std::iter::empty())[0].state, SerialState::Damaged);
    }

    #[test]
    fn normalize_rejects_empty_and_oversized_batches() {
        assert!(normalize_codes(&[]).is_err());
        let big: Vec<String> = (0..=MAX_BATCH).map(|i| format!("X-{i}")).collect();
        assert!(normalize_codes(&big).is_err());
        assert!(normalize_codes(&["ok".to_string(), "  ".to_string()]).is_err());
    }

    #[test]
    fn internal_duplicates_reports_each_code_once() {
        let raw: Vec<String> = ["a-1", "A-1 ", "b-2", "a-1", "B-2", "c-3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let normalized = normalize_codes(&raw).unwrap();
        assert_eq!(internal_duplicates(&normalized), vec!["A-1", "B-2"]);
    }
}
