//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. Two
/// quantities of `12.50` and `12.5` units are the same quantity; two warehouses
/// with the same name are not the same warehouse.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
