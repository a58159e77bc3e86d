//! Immutable, ordered collection of event envelopes.

use std::iter::Enumerate;
use std::slice;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{AggregateId, EventEnvelope, EventStoreError, Result, Version};

/// An ordered, non-empty, frozen sequence of [`EventEnvelope`]s belonging to
/// one aggregate.
///
/// The envelopes are copied into shared storage at construction and the type
/// offers no way to change them afterwards, so cloning a stream is cheap and
/// every clone observes the same envelopes. Construction guarantees:
///
/// - at least one envelope,
/// - every sequence number is at least 1 and strictly greater than the previous one,
/// - every envelope carries the same aggregate identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<EventEnvelope>", into = "Vec<EventEnvelope>")]
pub struct EventEnvelopeStream {
    envelopes: Arc<[EventEnvelope]>,
}

impl EventEnvelopeStream {
    /// Builds a stream, validating the envelopes.
    pub fn new(envelopes: Vec<EventEnvelope>) -> Result<Self> {
        let first = envelopes.first().ok_or(EventStoreError::CollectionIsEmpty)?;
        let aggregate_id = first.aggregate_id();

        let mut previous = Version::initial();
        for (index, envelope) in envelopes.iter().enumerate() {
            if envelope.aggregate_id() != aggregate_id {
                return Err(EventStoreError::InvalidItemInCollection {
                    index,
                    reason: format!(
                        "envelope belongs to {}, stream belongs to {aggregate_id}",
                        envelope.aggregate_id()
                    ),
                });
            }
            let sequence_number = envelope.sequence_number();
            if sequence_number <= previous {
                return Err(EventStoreError::InvalidItemInCollection {
                    index,
                    reason: format!(
                        "sequence number {sequence_number} does not follow {previous}"
                    ),
                });
            }
            previous = sequence_number;
        }

        Ok(Self {
            envelopes: envelopes.into(),
        })
    }

    /// Builds a stream from raw JSON items, as read from storage.
    ///
    /// Any item that does not decode as an [`EventEnvelope`] is rejected with
    /// [`EventStoreError::InvalidItemInCollection`].
    pub fn from_values(items: Vec<serde_json::Value>) -> Result<Self> {
        if items.is_empty() {
            return Err(EventStoreError::CollectionIsEmpty);
        }

        let envelopes = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                serde_json::from_value::<EventEnvelope>(item).map_err(|e| {
                    EventStoreError::InvalidItemInCollection {
                        index,
                        reason: format!("not an event envelope: {e}"),
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(envelopes)
    }

    /// Returns the number of envelopes.
    pub fn len(&self) -> usize {
        self.envelopes.len()
    }

    /// Always false: a stream holds at least one envelope.
    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }

    /// Returns the envelope at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<&EventEnvelope> {
        self.envelopes.get(index)
    }

    /// Returns true if an envelope exists at `index`.
    pub fn contains(&self, index: usize) -> bool {
        index < self.envelopes.len()
    }

    /// Returns the first envelope.
    pub fn first(&self) -> &EventEnvelope {
        &self.envelopes[0]
    }

    /// Returns the last envelope.
    pub fn last(&self) -> &EventEnvelope {
        &self.envelopes[self.envelopes.len() - 1]
    }

    /// The aggregate every envelope in this stream belongs to.
    pub fn aggregate_id(&self) -> &AggregateId {
        self.first().aggregate_id()
    }

    /// Sequence number of the last envelope.
    pub fn last_sequence_number(&self) -> Version {
        self.last().sequence_number()
    }

    /// Always fails: envelopes cannot be replaced once the stream exists.
    pub fn replace(&self, _index: usize, _envelope: EventEnvelope) -> Result<()> {
        Err(EventStoreError::ObjectIsImmutable("EventEnvelopeStream"))
    }

    /// Always fails: envelopes cannot be removed once the stream exists.
    pub fn remove(&self, _index: usize) -> Result<EventEnvelope> {
        Err(EventStoreError::ObjectIsImmutable("EventEnvelopeStream"))
    }

    /// Iterates over `(index, envelope)` pairs in stream order.
    ///
    /// Each call starts again from index 0.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.envelopes.iter().enumerate(),
        }
    }
}

impl TryFrom<Vec<EventEnvelope>> for EventEnvelopeStream {
    type Error = EventStoreError;

    fn try_from(envelopes: Vec<EventEnvelope>) -> Result<Self> {
        Self::new(envelopes)
    }
}

impl From<EventEnvelopeStream> for Vec<EventEnvelope> {
    fn from(stream: EventEnvelopeStream) -> Self {
        stream.envelopes.to_vec()
    }
}

impl<'a> IntoIterator for &'a EventEnvelopeStream {
    type Item = (usize, &'a EventEnvelope);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the `(index, envelope)` pairs of an [`EventEnvelopeStream`].
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    inner: Enumerate<slice::Iter<'a, EventEnvelope>>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (usize, &'a EventEnvelope);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Iter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IdKind;

    fn basket_id() -> AggregateId {
        AggregateId::generate(IdKind::parse("basket").unwrap())
    }

    fn envelope(aggregate_id: &AggregateId, sequence_number: i64) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id.clone())
            .aggregate_type("Basket")
            .event_type(format!("Event{sequence_number}"))
            .sequence_number(Version::new(sequence_number))
            .payload_raw(serde_json::json!({ "n": sequence_number }))
            .build()
            .unwrap()
    }

    fn three_envelopes(aggregate_id: &AggregateId) -> Vec<EventEnvelope> {
        (1..=3).map(|n| envelope(aggregate_id, n)).collect()
    }

    #[test]
    fn it_cannot_be_empty() {
        let result = EventEnvelopeStream::new(vec![]);
        assert!(matches!(result, Err(EventStoreError::CollectionIsEmpty)));

        let result = EventEnvelopeStream::from_values(vec![]);
        assert!(matches!(result, Err(EventStoreError::CollectionIsEmpty)));
    }

    #[test]
    fn it_contains_only_event_envelopes() {
        let id = basket_id();
        let valid = serde_json::to_value(envelope(&id, 1)).unwrap();
        let foreign = serde_json::json!({ "not": "an envelope" });

        let result = EventEnvelopeStream::from_values(vec![valid, foreign]);
        assert!(matches!(
            result,
            Err(EventStoreError::InvalidItemInCollection { index: 1, .. })
        ));
    }

    #[test]
    fn it_accepts_valid_raw_items() {
        let id = basket_id();
        let items = three_envelopes(&id)
            .into_iter()
            .map(|e| serde_json::to_value(e).unwrap())
            .collect();

        let stream = EventEnvelopeStream::from_values(items).unwrap();
        assert_eq!(stream.len(), 3);
        assert_eq!(stream.aggregate_id(), &id);
    }

    #[test]
    fn it_rejects_out_of_order_sequence_numbers() {
        let id = basket_id();
        let result = EventEnvelopeStream::new(vec![envelope(&id, 2), envelope(&id, 1)]);
        assert!(matches!(
            result,
            Err(EventStoreError::InvalidItemInCollection { index: 1, .. })
        ));

        let result = EventEnvelopeStream::new(vec![envelope(&id, 1), envelope(&id, 1)]);
        assert!(matches!(
            result,
            Err(EventStoreError::InvalidItemInCollection { index: 1, .. })
        ));
    }

    #[test]
    fn it_rejects_envelopes_of_another_aggregate() {
        let id = basket_id();
        let other = basket_id();
        let result = EventEnvelopeStream::new(vec![envelope(&id, 1), envelope(&other, 2)]);
        assert!(matches!(
            result,
            Err(EventStoreError::InvalidItemInCollection { index: 1, .. })
        ));
    }

    #[test]
    fn it_exposes_whether_a_key_exists_or_not() {
        let stream = EventEnvelopeStream::new(three_envelopes(&basket_id())).unwrap();
        assert!(stream.contains(0));
        assert!(stream.contains(1));
        assert!(stream.contains(2));
        assert!(!stream.contains(3));
    }

    #[test]
    fn it_exposes_items_by_key() {
        let id = basket_id();
        let envelopes = three_envelopes(&id);
        let stream = EventEnvelopeStream::new(envelopes.clone()).unwrap();

        assert_eq!(stream.get(0), Some(&envelopes[0]));
        assert_eq!(stream.get(1), Some(&envelopes[1]));
        assert_eq!(stream.get(2), Some(&envelopes[2]));
        assert_eq!(stream.get(3), None);
        assert_eq!(stream.get(usize::MAX), None);
    }

    #[test]
    fn items_cannot_be_replaced() {
        let id = basket_id();
        let envelopes = three_envelopes(&id);
        let stream = EventEnvelopeStream::new(envelopes.clone()).unwrap();

        let result = stream.replace(0, envelope(&id, 7));
        assert!(matches!(result, Err(EventStoreError::ObjectIsImmutable(_))));
        assert_eq!(stream.get(0), Some(&envelopes[0]));
        assert_eq!(stream.len(), 3);
    }

    #[test]
    fn items_cannot_be_removed() {
        let id = basket_id();
        let envelopes = three_envelopes(&id);
        let stream = EventEnvelopeStream::new(envelopes.clone()).unwrap();

        let result = stream.remove(0);
        assert!(matches!(result, Err(EventStoreError::ObjectIsImmutable(_))));
        assert_eq!(stream.get(0), Some(&envelopes[0]));
        assert_eq!(stream.len(), 3);
    }

    #[test]
    fn it_can_be_counted() {
        let stream = EventEnvelopeStream::new(three_envelopes(&basket_id())).unwrap();
        assert_eq!(stream.len(), 3);
        assert!(!stream.is_empty());
        assert_eq!(stream.last_sequence_number(), Version::new(3));
    }

    #[test]
    fn it_can_be_iterated_over_with_indexes() {
        let id = basket_id();
        let envelopes = three_envelopes(&id);
        let stream = EventEnvelopeStream::new(envelopes.clone()).unwrap();

        let collected: Vec<_> = stream.iter().collect();
        assert_eq!(collected.len(), 3);
        for (position, (index, envelope)) in collected.into_iter().enumerate() {
            assert_eq!(index, position);
            assert_eq!(envelope, &envelopes[position]);
        }
    }

    #[test]
    fn each_iteration_starts_from_the_beginning() {
        let stream = EventEnvelopeStream::new(three_envelopes(&basket_id())).unwrap();

        let mut partial = stream.iter();
        partial.next();
        partial.next();

        let indexes: Vec<usize> = (&stream).into_iter().map(|(index, _)| index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert_eq!(partial.next().map(|(index, _)| index), Some(2));
        assert_eq!(stream.iter().len(), 3);
    }

    #[test]
    fn construction_copies_the_input() {
        let id = basket_id();
        let mut envelopes = three_envelopes(&id);
        let stream = EventEnvelopeStream::new(envelopes.clone()).unwrap();

        envelopes.clear();
        assert_eq!(stream.len(), 3);
    }

    #[test]
    fn deserialization_revalidates() {
        let id = basket_id();
        let stream = EventEnvelopeStream::new(three_envelopes(&id)).unwrap();
        let json = serde_json::to_string(&stream).unwrap();
        let decoded: EventEnvelopeStream = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, stream);

        assert!(serde_json::from_str::<EventEnvelopeStream>("[]").is_err());
    }
}
