use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventEnvelopeStream, EventId, EventStoreError, IdKind, Result,
    Version,
    store::{EventStore, validate_events_for_append},
};

/// PostgreSQL-backed event store implementation.
///
/// Concurrent appends are serialized by the `unique_aggregate_version`
/// constraint: the losing transaction is rolled back and reported as a
/// [`EventStoreError::ConcurrencyConflict`].
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Creates a new PostgreSQL event store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// One row of the `events` table.
#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    aggregate_kind: String,
    aggregate_id: Uuid,
    aggregate_type: String,
    event_type: String,
    sequence_number: i64,
    recorded_at: DateTime<Utc>,
    payload: serde_json::Value,
    metadata: serde_json::Value,
}

impl EventRow {
    /// Decodes the row at position `index` of a stream read.
    fn into_envelope(self, index: usize) -> Result<EventEnvelope> {
        let kind = IdKind::parse(self.aggregate_kind).map_err(|e| {
            EventStoreError::InvalidItemInCollection {
                index,
                reason: e.to_string(),
            }
        })?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(self.metadata)?;

        EventEnvelope::builder()
            .event_id(EventId::from_uuid(self.id))
            .aggregate_id(AggregateId::new(kind, self.aggregate_id))
            .aggregate_type(self.aggregate_type)
            .event_type(self.event_type)
            .sequence_number(Version::new(self.sequence_number))
            .recorded_at(self.recorded_at)
            .payload_raw(self.payload)
            .metadata_map(metadata)
            .build()
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn read_stream(&self, aggregate_id: &AggregateId) -> Result<EventEnvelopeStream> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, aggregate_kind, aggregate_id, aggregate_type, event_type,
                   sequence_number, recorded_at, payload, metadata
            FROM events
            WHERE aggregate_kind = $1 AND aggregate_id = $2
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(aggregate_id.kind().as_str())
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(EventStoreError::AggregateNotFound(aggregate_id.clone()));
        }

        let envelopes = rows
            .into_iter()
            .enumerate()
            .map(|(index, row)| row.into_envelope(index))
            .collect::<Result<Vec<_>>>()?;

        EventEnvelopeStream::new(envelopes)
    }

    #[tracing::instrument(skip(self, envelopes), fields(%aggregate_id, %expected_version, count = envelopes.len()))]
    async fn append_to_stream(
        &self,
        aggregate_id: &AggregateId,
        expected_version: Version,
        envelopes: Vec<EventEnvelope>,
    ) -> Result<Version> {
        validate_events_for_append(aggregate_id, expected_version, &envelopes)?;

        let mut tx = self.pool.begin().await?;

        let current_version: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(sequence_number) FROM events WHERE aggregate_kind = $1 AND aggregate_id = $2",
        )
        .bind(aggregate_id.kind().as_str())
        .bind(aggregate_id.as_uuid())
        .fetch_one(&mut *tx)
        .await?;

        let actual = Version::new(current_version.unwrap_or(0));
        if actual != expected_version {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id: aggregate_id.clone(),
                expected: expected_version,
                actual,
            });
        }

        let mut last_version = expected_version;
        for envelope in &envelopes {
            let metadata_json = serde_json::to_value(envelope.metadata())?;

            sqlx::query(
                r#"
                INSERT INTO events (id, aggregate_kind, aggregate_id, aggregate_type, event_type,
                                    sequence_number, recorded_at, payload, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(envelope.event_id().as_uuid())
            .bind(aggregate_id.kind().as_str())
            .bind(aggregate_id.as_uuid())
            .bind(envelope.aggregate_type())
            .bind(envelope.event_type())
            .bind(envelope.sequence_number().as_i64())
            .bind(envelope.recorded_at())
            .bind(envelope.payload())
            .bind(metadata_json)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                // A concurrent writer committed the same sequence number first
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_aggregate_version")
                {
                    return EventStoreError::ConcurrencyConflict {
                        aggregate_id: aggregate_id.clone(),
                        expected: expected_version,
                        actual: envelope.sequence_number(),
                    };
                }
                EventStoreError::Database(e)
            })?;

            last_version = envelope.sequence_number();
        }

        tx.commit().await?;

        metrics::counter!("event_store_appends_total").increment(1);
        tracing::debug!(%last_version, "appended to postgres stream");

        Ok(last_version)
    }

    async fn stream_version(&self, aggregate_id: &AggregateId) -> Result<Option<Version>> {
        let version: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(sequence_number) FROM events WHERE aggregate_kind = $1 AND aggregate_id = $2",
        )
        .bind(aggregate_id.kind().as_str())
        .bind(aggregate_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        Ok(version.map(Version::new))
    }
}
