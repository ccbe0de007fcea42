//! Entity trait: identity and continuity across state changes.

/// Minimal entity interface: a strongly-typed identifier.
///
/// Two entities are "the same" when their ids match, regardless of what
/// their attributes have become since.
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}
