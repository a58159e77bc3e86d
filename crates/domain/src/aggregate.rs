//! Core aggregate and domain event traits.

use std::any::Any;
use std::fmt;

use common::{AggregateId, Identifier};
use event_store::{AggregateHistory, Version};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::DomainError;

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone + 'static {
    /// Returns the event type name.
    ///
    /// This is stored on the envelope and identifies the variant.
    fn event_type(&self) -> &'static str;
}

/// State every aggregate carries besides its domain state: identity, the
/// sequence number of the last applied event, and the events recorded by
/// commands that have not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRoot<E> {
    id: AggregateId,
    version: Version,
    uncommitted: Vec<E>,
}

impl<E> AggregateRoot<E> {
    /// Creates the root of an aggregate with no applied events.
    pub fn new(id: AggregateId) -> Self {
        Self {
            id,
            version: Version::initial(),
            uncommitted: Vec::new(),
        }
    }

    pub fn id(&self) -> &AggregateId {
        &self.id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// Queues an event for persistence.
    pub fn record(&mut self, event: E) {
        self.uncommitted.push(event);
    }

    pub fn uncommitted(&self) -> &[E] {
        &self.uncommitted
    }

    /// Returns the queued events and leaves the queue empty.
    pub fn take_uncommitted(&mut self) -> Vec<E> {
        std::mem::take(&mut self.uncommitted)
    }
}

/// Trait for aggregates in an event-sourced system.
///
/// An aggregate's state is derived entirely from the ordered events recorded
/// for it. Commands are inherent methods on the implementing type: they check
/// the current state, then call [`Aggregate::record_that`], which applies the
/// event immediately and queues it for the repository.
pub trait Aggregate: Send + Sync + Sized + 'static {
    /// The typed identifier this aggregate is responsible for.
    type Id: Identifier;

    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The type of errors this aggregate's commands can produce.
    type Error: std::error::Error + Send + Sync;

    /// Returns the aggregate type name stored on every envelope.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate as it is before its first event.
    fn initial(id: AggregateId) -> Self;

    fn root(&self) -> &AggregateRoot<Self::Event>;

    fn root_mut(&mut self) -> &mut AggregateRoot<Self::Event>;

    /// Applies an event to the aggregate, updating its state.
    ///
    /// Must be total over every event variant and deterministic. It is used
    /// both for replay and for events recorded by commands, and never queues
    /// anything itself.
    fn apply(&mut self, event: Self::Event);

    fn id(&self) -> &AggregateId {
        self.root().id()
    }

    /// Sequence number of the last persisted or replayed event, 0 if none.
    fn version(&self) -> Version {
        self.root().version()
    }

    /// Applies a new event and queues it as uncommitted.
    fn record_that(&mut self, event: Self::Event) {
        self.apply(event.clone());
        self.root_mut().record(event);
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        self.root().uncommitted()
    }

    /// Returns the uncommitted events in recorded order and clears the queue.
    ///
    /// A second call before any new command returns an empty vector.
    fn extract_uncommitted_events(&mut self) -> Vec<Self::Event> {
        self.root_mut().take_uncommitted()
    }

    /// Rebuilds the aggregate by replaying its history in stream order.
    ///
    /// The result's version is the last sequence number of the history and
    /// its uncommitted queue is empty.
    fn from_history(history: &AggregateHistory) -> Result<Self, DomainError> {
        let aggregate_id = history.aggregate_id();
        let expected = <Self::Id as Identifier>::KIND;
        if aggregate_id.kind() != expected {
            return Err(DomainError::HistoryKindMismatch {
                aggregate_type: Self::aggregate_type(),
                expected,
                found: aggregate_id.kind().clone(),
            });
        }

        let mut aggregate = Self::initial(aggregate_id.clone());
        for (_, envelope) in history.event_stream() {
            let event: Self::Event = envelope.decode()?;
            aggregate.apply(event);
            aggregate.root_mut().set_version(envelope.sequence_number());
        }

        Ok(aggregate)
    }
}

/// An uncommitted event serialized for the store.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    pub event_type: &'static str,
    pub payload: serde_json::Value,
}

/// Object-safe view of an aggregate, used where the concrete aggregate type
/// is only known at runtime (factory dispatch, repository save).
///
/// Implemented for every [`Aggregate`].
pub trait EventSourced: Any + Send + Sync {
    fn aggregate_name(&self) -> &'static str;

    fn stream_id(&self) -> &AggregateId;

    fn stream_version(&self) -> Version;

    fn has_pending_events(&self) -> bool;

    /// Serializes and drains the uncommitted events.
    ///
    /// Nothing is drained if serialization fails.
    fn drain_pending_events(&mut self) -> Result<Vec<PendingEvent>, DomainError>;

    /// Records that events up to `version` have been persisted.
    fn mark_committed(&mut self, version: Version);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<A: Aggregate> EventSourced for A {
    fn aggregate_name(&self) -> &'static str {
        A::aggregate_type()
    }

    fn stream_id(&self) -> &AggregateId {
        self.id()
    }

    fn stream_version(&self) -> Version {
        self.version()
    }

    fn has_pending_events(&self) -> bool {
        !self.uncommitted_events().is_empty()
    }

    fn drain_pending_events(&mut self) -> Result<Vec<PendingEvent>, DomainError> {
        let pending = self
            .uncommitted_events()
            .iter()
            .map(|event| {
                Ok(PendingEvent {
                    event_type: event.event_type(),
                    payload: serde_json::to_value(event)?,
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;
        self.extract_uncommitted_events();
        Ok(pending)
    }

    fn mark_committed(&mut self, version: Version) {
        self.root_mut().set_version(version);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl dyn EventSourced {
    /// Returns the concrete aggregate if it is an `A`.
    pub fn downcast_ref<A: Aggregate>(&self) -> Option<&A> {
        self.as_any().downcast_ref()
    }

    pub fn downcast_mut<A: Aggregate>(&mut self) -> Option<&mut A> {
        self.as_any_mut().downcast_mut()
    }
}

impl fmt::Debug for dyn EventSourced {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSourced")
            .field("aggregate", &self.aggregate_name())
            .field("id", &format_args!("{}", self.stream_id()))
            .field("version", &self.stream_version())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::IdKind;
    use event_store::{EventEnvelope, EventEnvelopeStream};
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct CounterId(Uuid);

    impl Identifier for CounterId {
        const KIND: &'static str = "counter";

        fn from_uuid(uuid: Uuid) -> Self {
            Self(uuid)
        }

        fn as_uuid(&self) -> Uuid {
            self.0
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum CounterEvent {
        Incremented { by: i32 },
        Reset,
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CounterEvent::Incremented { .. } => "Incremented",
                CounterEvent::Reset => "Reset",
            }
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("test error")]
    struct CounterError;

    #[derive(Debug, Clone, PartialEq)]
    struct Counter {
        root: AggregateRoot<CounterEvent>,
        value: i32,
    }

    impl Counter {
        fn increment(&mut self, by: i32) {
            self.record_that(CounterEvent::Incremented { by });
        }
    }

    impl Aggregate for Counter {
        type Id = CounterId;
        type Event = CounterEvent;
        type Error = CounterError;

        fn aggregate_type() -> &'static str {
            "Counter"
        }

        fn initial(id: AggregateId) -> Self {
            Self {
                root: AggregateRoot::new(id),
                value: 0,
            }
        }

        fn root(&self) -> &AggregateRoot<CounterEvent> {
            &self.root
        }

        fn root_mut(&mut self) -> &mut AggregateRoot<CounterEvent> {
            &mut self.root
        }

        fn apply(&mut self, event: CounterEvent) {
            match event {
                CounterEvent::Incremented { by } => self.value += by,
                CounterEvent::Reset => self.value = 0,
            }
        }
    }

    fn counter_id() -> AggregateId {
        CounterId(Uuid::new_v4()).aggregate_id()
    }

    fn history(id: &AggregateId, events: &[CounterEvent]) -> AggregateHistory {
        let envelopes = events
            .iter()
            .enumerate()
            .map(|(i, event)| {
                EventEnvelope::builder()
                    .aggregate_id(id.clone())
                    .aggregate_type("Counter")
                    .event_type(event.event_type())
                    .sequence_number(Version::new(i as i64 + 1))
                    .payload(event)
                    .unwrap()
                    .build()
                    .unwrap()
            })
            .collect();
        AggregateHistory::new(id.clone(), EventEnvelopeStream::new(envelopes).unwrap()).unwrap()
    }

    #[test]
    fn commands_apply_immediately_and_queue_events() {
        let mut counter = Counter::initial(counter_id());
        counter.increment(2);
        counter.increment(3);

        assert_eq!(counter.value, 5);
        assert_eq!(counter.version(), Version::initial());
        assert_eq!(
            counter.uncommitted_events(),
            &[
                CounterEvent::Incremented { by: 2 },
                CounterEvent::Incremented { by: 3 }
            ]
        );
    }

    #[test]
    fn extracting_uncommitted_events_clears_the_queue() {
        let mut counter = Counter::initial(counter_id());
        counter.increment(1);

        let events = counter.extract_uncommitted_events();
        assert_eq!(events, vec![CounterEvent::Incremented { by: 1 }]);
        assert!(counter.extract_uncommitted_events().is_empty());
        assert_eq!(counter.value, 1);
    }

    #[test]
    fn from_history_replays_in_order_without_queueing() {
        let id = counter_id();
        let history = history(
            &id,
            &[
                CounterEvent::Incremented { by: 4 },
                CounterEvent::Reset,
                CounterEvent::Incremented { by: 7 },
            ],
        );

        let mut counter = Counter::from_history(&history).unwrap();
        assert_eq!(counter.id(), &id);
        assert_eq!(counter.value, 7);
        assert_eq!(counter.version(), Version::new(3));
        assert!(counter.extract_uncommitted_events().is_empty());
    }

    #[test]
    fn replay_is_deterministic() {
        let id = counter_id();
        let history = history(
            &id,
            &[
                CounterEvent::Incremented { by: 1 },
                CounterEvent::Incremented { by: 2 },
            ],
        );

        let first = Counter::from_history(&history).unwrap();
        let second = Counter::from_history(&history).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn from_history_rejects_foreign_identifier_kind() {
        let id = AggregateId::generate(IdKind::parse("basket").unwrap());
        let history = history(&id, &[CounterEvent::Reset]);

        let result = Counter::from_history(&history);
        assert!(matches!(
            result,
            Err(DomainError::HistoryKindMismatch {
                expected: "counter",
                ..
            })
        ));
    }

    #[test]
    fn from_history_fails_on_undecodable_payload() {
        let id = counter_id();
        let envelope = EventEnvelope::builder()
            .aggregate_id(id.clone())
            .aggregate_type("Counter")
            .event_type("Exploded")
            .sequence_number(Version::first())
            .payload_raw(serde_json::json!({"Exploded": {}}))
            .build()
            .unwrap();
        let history =
            AggregateHistory::new(id, EventEnvelopeStream::new(vec![envelope]).unwrap()).unwrap();

        assert!(matches!(
            Counter::from_history(&history),
            Err(DomainError::EventStore(_))
        ));
    }

    #[test]
    fn event_sourced_view_drains_serialized_events() {
        let mut counter = Counter::initial(counter_id());
        counter.increment(9);

        let view: &mut dyn EventSourced = &mut counter;
        assert!(view.has_pending_events());
        assert_eq!(view.aggregate_name(), "Counter");

        let pending = view.drain_pending_events().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_type, "Incremented");
        assert_eq!(
            pending[0].payload,
            serde_json::json!({"Incremented": {"by": 9}})
        );
        assert!(!view.has_pending_events());

        view.mark_committed(Version::first());
        assert_eq!(view.downcast_ref::<Counter>().unwrap().version(), Version::first());
    }
}
