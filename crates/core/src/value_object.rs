//! Value object trait: equality by value, not identity.

/// Marker for immutable domain values compared attribute-by-attribute.
///
/// A value object has no identity of its own: `Money::from_minor(100)` is
/// interchangeable with any other `Money::from_minor(100)`. To "modify" one,
/// build a new value. Requiring `Clone + PartialEq + Debug` keeps them cheap
/// to pass around and easy to assert on in tests.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
