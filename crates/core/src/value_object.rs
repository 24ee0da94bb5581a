//! Value object trait: equality by value, not identity.
//!
//! Serial codes, SKUs and category labels are value objects: a normalized
//! `ABC-001` is the same code wherever it appears.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. Constructors are
/// expected to normalize and validate, so holding one means the value is
/// already in canonical form.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Sku(String);
///
/// impl ValueObject for Sku {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
