use std::collections::HashMap;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{AggregateId, EventStoreError, Result};

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of an event in its aggregate's stream, and the version of the
/// aggregate after that event.
///
/// Sequence numbers start at 1 for the first event; an aggregate with no
/// events is at version 0.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) for a new aggregate.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the first version (1) for the first event.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// One recorded domain event together with its identity and position.
///
/// Envelopes are immutable: they are created by the repository when new
/// events are saved, or decoded by a store when a history is read, and only
/// expose read accessors afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    event_id: EventId,
    aggregate_id: AggregateId,
    aggregate_type: String,
    event_type: String,
    sequence_number: Version,
    recorded_at: DateTime<Utc>,
    payload: serde_json::Value,
    #[serde(default)]
    metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelope {
    /// Creates a new event envelope builder.
    pub fn builder() -> EventEnvelopeBuilder {
        EventEnvelopeBuilder::default()
    }

    /// Unique identifier of this event.
    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    /// The aggregate this event belongs to.
    pub fn aggregate_id(&self) -> &AggregateId {
        &self.aggregate_id
    }

    /// The type of aggregate (e.g., "Basket").
    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    /// The event variant (e.g., "ProductAdded").
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Position of this event in its aggregate's stream.
    pub fn sequence_number(&self) -> Version {
        self.sequence_number
    }

    /// When the event was recorded, at microsecond precision so it survives
    /// a round trip through a `TIMESTAMPTZ` column unchanged.
    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    /// The event payload as JSON.
    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Additional metadata about the event.
    pub fn metadata(&self) -> &HashMap<String, serde_json::Value> {
        &self.metadata
    }

    /// Decodes the payload into a typed event.
    pub fn decode<E: DeserializeOwned>(&self) -> Result<E> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// Builder for constructing event envelopes.
#[derive(Debug, Default)]
pub struct EventEnvelopeBuilder {
    event_id: Option<EventId>,
    aggregate_id: Option<AggregateId>,
    aggregate_type: Option<String>,
    event_type: Option<String>,
    sequence_number: Option<Version>,
    recorded_at: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
    metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelopeBuilder {
    /// Sets the event ID. If not set, a new ID will be generated.
    pub fn event_id(mut self, id: EventId) -> Self {
        self.event_id = Some(id);
        self
    }

    /// Sets the aggregate ID.
    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    /// Sets the aggregate type.
    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    /// Sets the event type.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Sets the sequence number.
    pub fn sequence_number(mut self, sequence_number: Version) -> Self {
        self.sequence_number = Some(sequence_number);
        self
    }

    /// Sets the recording time. If not set, the current time will be used.
    ///
    /// Truncated to microseconds, the precision PostgreSQL stores.
    pub fn recorded_at(mut self, recorded_at: DateTime<Utc>) -> Self {
        self.recorded_at = Some(recorded_at.trunc_subsecs(6));
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Adds a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Adds every entry of a metadata map.
    pub fn metadata_map(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata.extend(metadata);
        self
    }

    /// Builds the event envelope.
    ///
    /// Fails if a required field (aggregate_id, aggregate_type, event_type,
    /// sequence_number, payload) is missing or the sequence number is below 1.
    pub fn build(self) -> Result<EventEnvelope> {
        let sequence_number = self
            .sequence_number
            .ok_or(EventStoreError::MissingEnvelopeField("sequence_number"))?;
        if sequence_number < Version::first() {
            return Err(EventStoreError::InvalidSequenceNumber(sequence_number));
        }

        Ok(EventEnvelope {
            event_id: self.event_id.unwrap_or_default(),
            aggregate_id: self
                .aggregate_id
                .ok_or(EventStoreError::MissingEnvelopeField("aggregate_id"))?,
            aggregate_type: self
                .aggregate_type
                .ok_or(EventStoreError::MissingEnvelopeField("aggregate_type"))?,
            event_type: self
                .event_type
                .ok_or(EventStoreError::MissingEnvelopeField("event_type"))?,
            sequence_number,
            recorded_at: self
                .recorded_at
                .unwrap_or_else(|| Utc::now().trunc_subsecs(6)),
            payload: self
                .payload
                .ok_or(EventStoreError::MissingEnvelopeField("payload"))?,
            metadata: self.metadata,
        })
    }
}
