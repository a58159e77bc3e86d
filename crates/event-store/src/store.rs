use async_trait::async_trait;

use crate::{AggregateId, EventEnvelope, EventEnvelopeStream, EventStoreError, Result, Version};

/// Core trait for event store implementations.
///
/// An event store is a durable, append-only log of envelopes per aggregate.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Reads every envelope recorded for an aggregate, oldest first.
    ///
    /// Fails with [`EventStoreError::AggregateNotFound`] if nothing has been
    /// recorded for `aggregate_id`.
    async fn read_stream(&self, aggregate_id: &AggregateId) -> Result<EventEnvelopeStream>;

    /// Appends envelopes to an aggregate's stream.
    ///
    /// The append is atomic: either all envelopes are stored or none are. It
    /// fails with [`EventStoreError::ConcurrencyConflict`] if the stream's
    /// current version is not `expected_version`; of two concurrent appends
    /// with the same expectation at most one succeeds.
    ///
    /// Returns the new version of the aggregate after appending.
    async fn append_to_stream(
        &self,
        aggregate_id: &AggregateId,
        expected_version: Version,
        envelopes: Vec<EventEnvelope>,
    ) -> Result<Version>;

    /// Gets the current version of an aggregate.
    ///
    /// Returns None if the aggregate doesn't exist.
    async fn stream_version(&self, aggregate_id: &AggregateId) -> Result<Option<Version>>;
}

/// Extension trait providing convenience methods for event stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Checks if an aggregate exists (has any events).
    async fn aggregate_exists(&self, aggregate_id: &AggregateId) -> Result<bool> {
        Ok(self.stream_version(aggregate_id).await?.is_some())
    }
}

// Blanket implementation for all EventStore implementations
impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Validates a batch before it is appended to `aggregate_id`'s stream.
///
/// The batch must be non-empty, belong entirely to `aggregate_id`, and carry
/// sequence numbers `expected_version + 1, + 2, ...` without gaps.
pub fn validate_events_for_append(
    aggregate_id: &AggregateId,
    expected_version: Version,
    envelopes: &[EventEnvelope],
) -> Result<()> {
    let invalid = |reason: String| EventStoreError::InvalidAppend {
        aggregate_id: aggregate_id.clone(),
        reason,
    };

    if envelopes.is_empty() {
        return Err(invalid("cannot append an empty batch".to_string()));
    }

    let mut expected = expected_version;
    for envelope in envelopes {
        if envelope.aggregate_id() != aggregate_id {
            return Err(invalid(format!(
                "envelope {} belongs to {}",
                envelope.event_id(),
                envelope.aggregate_id()
            )));
        }

        expected = expected.next();
        if envelope.sequence_number() != expected {
            return Err(invalid(format!(
                "sequence numbers must be contiguous: expected {expected}, got {}",
                envelope.sequence_number()
            )));
        }
    }

    Ok(())
}
