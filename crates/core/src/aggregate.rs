//! Aggregate root trait and optimistic concurrency expectations.

use crate::entity::Entity;

/// Aggregate root marker + minimal interface.
///
/// An aggregate root is the only entry point for mutating the entities it owns.
/// Children (e.g. sale line items) are reached and changed through it, never
/// loaded or saved on their own.
pub trait AggregateRoot: Entity {
    /// Monotonically increasing version of the aggregate's persisted state.
    ///
    /// Starts at 0 for a never-saved aggregate and is bumped by the storage
    /// layer on every successful write.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for an aggregate.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking.
    Any,
    /// Require the aggregate to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }
}
