//! An aggregate identifier bound to its recorded envelopes.

use crate::{AggregateId, EventEnvelopeStream, EventStoreError, Result, Version};

/// The full recorded history of one aggregate.
///
/// Every envelope in the stream is guaranteed to belong to `aggregate_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateHistory {
    aggregate_id: AggregateId,
    stream: EventEnvelopeStream,
}

impl AggregateHistory {
    /// Binds `stream` to `aggregate_id`.
    ///
    /// Fails with [`EventStoreError::IdMismatchInHistory`] on the first
    /// envelope recorded for a different aggregate.
    pub fn new(aggregate_id: AggregateId, stream: EventEnvelopeStream) -> Result<Self> {
        if let Some((_, envelope)) = stream
            .iter()
            .find(|(_, envelope)| envelope.aggregate_id() != &aggregate_id)
        {
            return Err(EventStoreError::IdMismatchInHistory {
                expected: aggregate_id,
                found: envelope.aggregate_id().clone(),
                sequence_number: envelope.sequence_number(),
            });
        }

        Ok(Self {
            aggregate_id,
            stream,
        })
    }

    pub fn aggregate_id(&self) -> &AggregateId {
        &self.aggregate_id
    }

    pub fn event_stream(&self) -> &EventEnvelopeStream {
        &self.stream
    }

    /// Version of the aggregate after replaying this history.
    pub fn version(&self) -> Version {
        self.stream.last_sequence_number()
    }

    pub fn into_parts(self) -> (AggregateId, EventEnvelopeStream) {
        (self.aggregate_id, self.stream)
    }
}
