use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventEnvelopeStream, EventStoreError, Result, Version,
    store::{EventStore, validate_events_for_append},
};

/// In-memory event store implementation for testing.
///
/// This implementation stores all streams in memory and provides
/// the same interface as the PostgreSQL implementation. Clones share
/// the same storage.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    streams: Arc<RwLock<HashMap<AggregateId, Vec<EventEnvelope>>>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.streams.read().await.values().map(Vec::len).sum()
    }

    /// Clears all streams.
    pub async fn clear(&self) {
        self.streams.write().await.clear();
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn read_stream(&self, aggregate_id: &AggregateId) -> Result<EventEnvelopeStream> {
        let streams = self.streams.read().await;
        match streams.get(aggregate_id) {
            Some(envelopes) if !envelopes.is_empty() => {
                EventEnvelopeStream::new(envelopes.clone())
            }
            _ => Err(EventStoreError::AggregateNotFound(aggregate_id.clone())),
        }
    }

    #[tracing::instrument(skip(self, envelopes), fields(%aggregate_id, %expected_version, count = envelopes.len()))]
    async fn append_to_stream(
        &self,
        aggregate_id: &AggregateId,
        expected_version: Version,
        envelopes: Vec<EventEnvelope>,
    ) -> Result<Version> {
        validate_events_for_append(aggregate_id, expected_version, &envelopes)?;

        // The write lock is held across check and insert, so the append is atomic.
        let mut streams = self.streams.write().await;

        let current_version = streams
            .get(aggregate_id)
            .and_then(|stream| stream.last())
            .map(EventEnvelope::sequence_number)
            .unwrap_or(Version::initial());

        if current_version != expected_version {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id: aggregate_id.clone(),
                expected: expected_version,
                actual: current_version,
            });
        }

        let last_version = envelopes
            .last()
            .map(EventEnvelope::sequence_number)
            .unwrap_or(current_version);
        streams
            .entry(aggregate_id.clone())
            .or_default()
            .extend(envelopes);

        metrics::counter!("event_store_appends_total").increment(1);
        tracing::debug!(%last_version, "appended to in-memory stream");

        Ok(last_version)
    }

    async fn stream_version(&self, aggregate_id: &AggregateId) -> Result<Option<Version>> {
        let streams = self.streams.read().await;
        Ok(streams
            .get(aggregate_id)
            .and_then(|stream| stream.last())
            .map(EventEnvelope::sequence_number))
    }
}
