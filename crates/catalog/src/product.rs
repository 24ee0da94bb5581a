use serde::{Deserialize, Serialize};

use serialtrack_core::{CategoryId, DomainError, DomainResult, Entity, ProductId, ValueObject};

/// Minimum search term length, counted in characters after trimming.
pub const MIN_SEARCH_LEN: usize = 2;

/// Stock keeping unit. Trimmed, non-empty.
///
/// Unique ignoring case (see [`Sku::fold_key`]): the serial code base is
/// uppercased, so `abc` and `ABC` would generate the same codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl ValueObject for Sku {}

impl Sku {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let sku = raw.trim();
        if sku.is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }
        Ok(Self(sku.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key compared for uniqueness.
    pub fn fold_key(&self) -> String {
        self.0.to_lowercase()
    }

    /// Base used for generated serial codes (`<BASE>-001`, ...).
    ///
    /// Serial codes are stored uppercase, so the base is uppercased too.
    pub fn serial_base(&self) -> String {
        self.0.to_uppercase()
    }
}

impl core::fmt::Display for Sku {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Catalog product definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub category_id: CategoryId,
    pub sku: Sku,
    pub brand: Option<String>,
    pub model: Option<String>,
}

impl Entity for Product {
    const KIND: &'static str = "product";
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Product {
    /// Catalog listing order: by name.
    pub fn sort_by_name(products: &mut [Product]) {
        products.sort_by(|a, b| a.name.cmp(&b.name));
    }

    /// Detailed listing order: by name, then brand, then model.
    pub fn sort_detailed(products: &mut [Product]) {
        products.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.brand.cmp(&b.brand))
                .then_with(|| a.model.cmp(&b.model))
        });
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category_id: CategoryId,
    pub sku: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl CreateProduct {
    /// Validate and normalize into a product row.
    ///
    /// Blank optional fields collapse to `None`.
    pub fn into_product(self, id: ProductId) -> DomainResult<Product> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        let sku = Sku::parse(&self.sku)?;

        Ok(Product {
            id,
            name: name.to_string(),
            description: self.description.trim().to_string(),
            category_id: self.category_id,
            sku,
            brand: non_blank(self.brand),
            model: non_blank(self.model),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validated catalog search term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTerm {
    raw: String,
    folded: String,
}

impl SearchTerm {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let term = raw.trim();
        if term.chars().count() < MIN_SEARCH_LEN {
            return Err(DomainError::validation(format!(
                "search term must have at least {MIN_SEARCH_LEN} characters"
            )));
        }
        Ok(Self {
            raw: term.to_string(),
            folded: term.to_lowercase(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Case-insensitive substring match over name, SKU, brand and model.
    pub fn matches(&self, product: &Product) -> bool {
        let hit = |field: &str| field.to_lowercase().contains(&self.folded);

        hit(&product.name)
            || hit(product.sku.as_str())
            || product.brand.as_deref().is_some_and(hit)
            || product.model.as_deref().is_some_and(hit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(name: &str, sku: &str) -> CreateProduct {
        CreateProduct {
            name: name.to_string(),
            description: String::new(),
            category_id: CategoryId::new(),
            sku: sku.to_string(),
            brand: None,
            model: None,
        }
    }

    fn product(name: &str, sku: &str, brand: Option<&str>, model: Option<&str>) -> Product {
        let mut cmd = create(name, sku);
        cmd.brand = brand.map(str::to_string);
        cmd.model = model.map(str::to_string);
        cmd.into_product(ProductId::new()).unwrap()
    }

    #[test]
    fn create_product_trims_fields() {
        let mut cmd = create("  Ryzen 5 ", " CPU-R5 ");
        cmd.brand = Some("  ".to_string());
        cmd.model = Some(" 5600X ".to_string());

        let p = cmd.into_product(ProductId::new()).unwrap();
        assert_eq!(p.name, "Ryzen 5");
        assert_eq!(p.sku.as_str(), "CPU-R5");
        assert_eq!(p.brand, None);
        assert_eq!(p.model.as_deref(), Some("5600X"));
    }

    #[test]
    fn create_product_rejects_empty_name() {
        let err = create("   ", "SKU-1").into_product(ProductId::new()).unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for empty name"),
        }
    }

    #[test]
    fn create_product_rejects_empty_sku() {
        let err = create("Mouse", "  ").into_product(ProductId::new()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn serial_base_is_uppercase() {
        assert_eq!(Sku::parse("abc").unwrap().serial_base(), "ABC");
    }

    #[test]
    fn case_variants_share_a_fold_key_and_a_serial_base() {
        let lower = Sku::parse("abc").unwrap();
        let upper = Sku::parse(" ABC ").unwrap();
        assert_ne!(lower, upper);
        assert_eq!(lower.fold_key(), upper.fold_key());
        assert_eq!(lower.serial_base(), upper.serial_base());
    }

    #[test]
    fn search_term_requires_two_characters() {
        assert!(SearchTerm::parse("a").is_err());
        assert!(SearchTerm::parse("   ").is_err());
        assert!(SearchTerm::parse(" ab ").is_ok());
    }

    #[test]
    fn search_matches_any_field_case_insensitively() {
        let p = product("Memoria DDR4", "RAM-16", Some("Kingston"), Some("Fury Beast"));

        assert!(SearchTerm::parse("ddr").unwrap().matches(&p));
        assert!(SearchTerm::parse("ram-1").unwrap().matches(&p));
        assert!(SearchTerm::parse("KINGS").unwrap().matches(&p));
        assert!(SearchTerm::parse("beast").unwrap().matches(&p));
        assert!(!SearchTerm::parse("corsair").unwrap().matches(&p));
    }

    #[test]
    fn detailed_order_breaks_name_ties_by_brand_then_model() {
        let mut items = vec![
            product("SSD", "S3", Some("Samsung"), Some("980")),
            product("SSD", "S2", Some("Kingston"), Some("NV2")),
            product("Mouse", "M1", None, None),
            product("SSD", "S1", Some("Kingston"), Some("A400")),
        ];
        Product::sort_detailed(&mut items);

        let skus: Vec<&str> = items.iter().map(|p| p.sku.as_str()).collect();
        assert_eq!(skus, vec!["M1", "S1", "S2", "S3"]);
    }
}
