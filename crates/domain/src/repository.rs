//! Loading and saving aggregates through an event store.

use std::collections::HashMap;
use std::sync::Arc;

use common::AggregateId;
use event_store::{AggregateHistory, EventEnvelope, EventStore, Version};

use crate::aggregate::{Aggregate, EventSourced};
use crate::error::DomainError;
use crate::factory::AggregateFactory;

/// Repository for event-sourced aggregates.
///
/// Loading reads the aggregate's full stream, wraps it in an
/// [`AggregateHistory`] and lets the factory pick and replay the aggregate
/// type. Saving drains the aggregate's uncommitted events and appends them
/// with the version the aggregate was loaded at as the expected version, so
/// a concurrent writer surfaces as
/// [`EventStoreError::ConcurrencyConflict`](event_store::EventStoreError::ConcurrencyConflict).
///
/// Conflicts are never retried here. Callers reload and re-run the command.
pub struct AggregateRepository<S: EventStore> {
    store: S,
    factory: Arc<AggregateFactory>,
}

impl<S: EventStore> AggregateRepository<S> {
    pub fn new(store: S, factory: Arc<AggregateFactory>) -> Self {
        Self { store, factory }
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn factory(&self) -> &AggregateFactory {
        &self.factory
    }

    /// Loads an aggregate by replaying its stored history.
    ///
    /// Fails with `AggregateNotFound` if nothing has been recorded for `id`,
    /// and with `IdMismatchInHistory` if the store returns envelopes of
    /// another aggregate.
    #[tracing::instrument(skip(self), fields(aggregate_id = %id))]
    pub async fn load(&self, id: &AggregateId) -> Result<Box<dyn EventSourced>, DomainError> {
        let history = self.read_history(id).await?;
        let aggregate = self.factory.reconstitute_from_history(&history)?;

        metrics::counter!("aggregates_loaded_total").increment(1);
        tracing::debug!(
            aggregate_type = aggregate.aggregate_name(),
            version = %aggregate.stream_version(),
            "Loaded aggregate"
        );

        Ok(aggregate)
    }

    /// Loads an aggregate as its concrete type.
    pub async fn load_as<A: Aggregate>(&self, id: &AggregateId) -> Result<A, DomainError> {
        let aggregate = self.load(id).await?;
        let found = aggregate.aggregate_name();

        aggregate
            .into_any()
            .downcast::<A>()
            .map(|aggregate| *aggregate)
            .map_err(|_| DomainError::AggregateTypeMismatch {
                expected: A::aggregate_type(),
                found,
            })
    }

    /// Persists the aggregate's uncommitted events.
    ///
    /// Returns the aggregate's version after the save. An aggregate with no
    /// uncommitted events is a no-op and the store is not called.
    pub async fn save(&self, aggregate: &mut dyn EventSourced) -> Result<Version, DomainError> {
        self.save_with_metadata(aggregate, HashMap::new()).await
    }

    /// Like [`save`](Self::save), attaching `metadata` to every new envelope.
    ///
    /// The uncommitted events are drained before the append, so they are gone
    /// even if the append fails.
    #[tracing::instrument(
        skip(self, aggregate, metadata),
        fields(aggregate_id = %aggregate.stream_id(), version = %aggregate.stream_version())
    )]
    pub async fn save_with_metadata(
        &self,
        aggregate: &mut dyn EventSourced,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Result<Version, DomainError> {
        let current_version = aggregate.stream_version();
        let pending = aggregate.drain_pending_events()?;

        if pending.is_empty() {
            tracing::debug!("No uncommitted events to save");
            return Ok(current_version);
        }

        let aggregate_id = aggregate.stream_id().clone();
        let mut envelopes = Vec::with_capacity(pending.len());
        let mut version = current_version;

        for event in pending {
            version = version.next();
            let envelope = EventEnvelope::builder()
                .aggregate_id(aggregate_id.clone())
                .aggregate_type(aggregate.aggregate_name())
                .event_type(event.event_type)
                .sequence_number(version)
                .payload_raw(event.payload)
                .metadata_map(metadata.clone())
                .build()?;
            envelopes.push(envelope);
        }

        let count = envelopes.len() as u64;
        match self
            .store
            .append_to_stream(&aggregate_id, current_version, envelopes)
            .await
        {
            Ok(new_version) => {
                aggregate.mark_committed(new_version);
                metrics::counter!("aggregate_events_saved_total").increment(count);
                tracing::debug!(%new_version, count, "Saved aggregate");
                Ok(new_version)
            }
            Err(e) => {
                if e.is_concurrency_conflict() {
                    metrics::counter!("aggregate_concurrency_conflicts_total").increment(1);
                    tracing::warn!(error = %e, "Concurrency conflict while saving aggregate");
                }
                Err(e.into())
            }
        }
    }

    async fn read_history(&self, id: &AggregateId) -> Result<AggregateHistory, DomainError> {
        let stream = self.store.read_stream(id).await?;
        Ok(AggregateHistory::new(id.clone(), stream)?)
    }
}
