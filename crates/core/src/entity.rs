//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Categories, products and serial units are all entities: two rows with the
/// same id are the same thing even after a state change or a rename.
pub trait Entity {
    /// Name used when the entity is reported missing (`"product"`, ...).
    const KIND: &'static str;

    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
