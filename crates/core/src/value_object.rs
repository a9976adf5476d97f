//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" one,
/// build a new one. A sale's customer or branch reference is a value object:
/// two references with the same id and name are the same reference.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
