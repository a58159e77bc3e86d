//! Domain error types.

use common::IdKind;
use event_store::EventStoreError;
use thiserror::Error;

use crate::basket::BasketError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the event store or while building envelopes.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// An error occurred in the basket aggregate.
    #[error("Basket error: {0}")]
    Basket(#[from] BasketError),

    /// A factory mapping entry does not satisfy the required capability.
    #[error("Invalid type in collection: {type_name} is not a valid {expected}")]
    InvalidTypeInCollection { type_name: String, expected: String },

    /// No aggregate is registered for an identifier kind.
    #[error("Identifier kind {0} is not mapped to an aggregate")]
    IdNotMappedToAggregate(IdKind),

    /// The aggregate registered for an identifier is not the one requested.
    #[error("Aggregate type mismatch: expected {expected}, found {found}")]
    AggregateTypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// A history was replayed into an aggregate that does not own its identifier kind.
    #[error("{aggregate_type} reconstitutes {expected} identifiers, history belongs to {found}")]
    HistoryKindMismatch {
        aggregate_type: &'static str,
        expected: &'static str,
        found: IdKind,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Returns true if the store rejected an append because the aggregate
    /// changed since it was loaded. Callers recover by reloading and retrying.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, Self::EventStore(e) if e.is_concurrency_conflict())
    }

    /// Returns true if no history exists for the requested aggregate.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::EventStore(EventStoreError::AggregateNotFound(_)))
    }
}
