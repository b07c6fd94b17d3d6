//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Generic record tables key their rows by `Entity::Id`.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn entity_id(&self) -> Self::Id;
}
