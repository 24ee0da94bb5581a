use serde::{Deserialize, Serialize};

use serialtrack_core::{CategoryId, DomainError, DomainResult, Entity, ValueObject};

/// Minimum label length, counted in characters after trimming.
pub const MIN_LABEL_LEN: usize = 2;

/// Canonical category set installed by seeding.
pub const DEFAULT_CATEGORIES: [&str; 12] = [
    "Procesador",
    "Tarjeta Madre",
    "Memoria RAM",
    "Disco Duro",
    "Unidad SSD",
    "Tarjeta de Video",
    "Fuente de Poder",
    "Gabinete",
    "Monitor",
    "Teclado",
    "Mouse",
    "Tarjeta de Red",
];

/// Trimmed category label.
///
/// Labels compare case-insensitively for uniqueness (see [`CategoryLabel::fold_key`]),
/// but the original casing is preserved for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryLabel(String);

impl ValueObject for CategoryLabel {}

impl CategoryLabel {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let label = raw.trim();
        if label.chars().count() < MIN_LABEL_LEN {
            return Err(DomainError::validation(format!(
                "category label must have at least {MIN_LABEL_LEN} characters"
            )));
        }
        Ok(Self(label.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key used for uniqueness checks (lowercased).
    pub fn fold_key(&self) -> String {
        self.0.to_lowercase()
    }
}

impl core::fmt::Display for CategoryLabel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A product category (tipo de pieza).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub label: CategoryLabel,
}

impl Category {
    pub fn new(id: CategoryId, label: CategoryLabel) -> Self {
        Self { id, label }
    }
}

impl Entity for Category {
    const KIND: &'static str = "category";
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Canonical labels not yet present among `existing`.
///
/// Uses the same case-insensitive rule as explicit creation, so seeding never
/// inserts `"monitor"` next to an existing `"Monitor"`.
pub fn missing_defaults<'a>(existing: impl IntoIterator<Item = &'a str>) -> Vec<&'static str> {
    let taken: std::collections::HashSet<String> = existing
        .into_iter()
        .map(|l| l.trim().to_lowercase())
        .collect();

    DEFAULT_CATEGORIES
        .iter()
        .copied()
        .filter(|l| !taken.contains(&l.to_lowercase()))
        .collect()
}
