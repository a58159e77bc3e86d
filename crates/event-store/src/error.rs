use thiserror::Error;

use crate::{AggregateId, Version};

/// Errors that can occur when building envelope collections or interacting
/// with the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// An envelope stream was constructed from zero envelopes.
    #[error("Collection is empty: an event envelope stream needs at least one envelope")]
    CollectionIsEmpty,

    /// An item handed to an envelope stream is not a valid envelope for it.
    #[error("Invalid item in collection at index {index}: {reason}")]
    InvalidItemInCollection { index: usize, reason: String },

    /// A mutation was attempted on a frozen collection.
    #[error("Object is immutable: {0} cannot be modified after construction")]
    ObjectIsImmutable(&'static str),

    /// An envelope in a history belongs to another aggregate.
    #[error(
        "Id mismatch in history for aggregate {expected}: envelope {sequence_number} belongs to {found}"
    )]
    IdMismatchInHistory {
        expected: AggregateId,
        found: AggregateId,
        sequence_number: Version,
    },

    /// A concurrency conflict occurred when appending events.
    /// The expected version did not match the actual version.
    #[error(
        "Concurrency conflict for aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// The aggregate was not found in the event store.
    #[error("Aggregate not found: {0}")]
    AggregateNotFound(AggregateId),

    /// A batch of envelopes cannot be appended to the requested stream.
    #[error("Invalid append to {aggregate_id}: {reason}")]
    InvalidAppend {
        aggregate_id: AggregateId,
        reason: String,
    },

    /// A required envelope field was not set on the builder.
    #[error("Missing envelope field: {0}")]
    MissingEnvelopeField(&'static str),

    /// Sequence numbers start at 1.
    #[error("Invalid sequence number {0}: sequence numbers start at 1")]
    InvalidSequenceNumber(Version),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventStoreError {
    /// Returns true for the one error callers are expected to recover from
    /// by reloading the aggregate and retrying.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
