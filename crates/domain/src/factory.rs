//! Reconstitution of aggregates from their history.
//!
//! The factory holds a fixed mapping from identifier kind to the aggregate
//! type that owns identifiers of that kind. Given a history it picks the
//! aggregate type from the history's identifier and replays the history into
//! it. The mapping is validated once, at construction, so dispatch itself can
//! only fail for kinds that were never registered.

use std::collections::HashMap;
use std::fmt;

use common::{IdKind, Identifier};
use event_store::AggregateHistory;

use crate::aggregate::{Aggregate, EventSourced};
use crate::error::DomainError;

type ReconstituteFn = fn(&AggregateHistory) -> Result<Box<dyn EventSourced>, DomainError>;

fn reconstitute_boxed<A: Aggregate>(
    history: &AggregateHistory,
) -> Result<Box<dyn EventSourced>, DomainError> {
    Ok(Box::new(A::from_history(history)?))
}

/// An aggregate type's entry in the factory mapping.
#[derive(Clone, Copy)]
pub struct Registration {
    aggregate_type: &'static str,
    kind: &'static str,
    reconstitute: ReconstituteFn,
}

impl Registration {
    /// Captures how to reconstitute `A` from a history.
    pub fn of<A: Aggregate>() -> Self {
        Self {
            aggregate_type: A::aggregate_type(),
            kind: <A::Id as Identifier>::KIND,
            reconstitute: reconstitute_boxed::<A>,
        }
    }

    pub fn aggregate_type(&self) -> &'static str {
        self.aggregate_type
    }

    /// The identifier kind the aggregate reconstitutes.
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("aggregate_type", &self.aggregate_type)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Maps identifier kinds to aggregate types and reconstitutes aggregates.
///
/// Immutable once built; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct AggregateFactory {
    map: HashMap<IdKind, Registration>,
}

impl AggregateFactory {
    /// Creates a factory from `(kind, registration)` pairs.
    ///
    /// Fails with [`DomainError::InvalidTypeInCollection`] if a key is not a
    /// valid identifier kind, if a key appears twice, or if the registered
    /// aggregate does not reconstitute identifiers of that kind.
    pub fn new<I, K>(mapping: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = (K, Registration)>,
        K: Into<String>,
    {
        let mut map = HashMap::new();

        for (key, registration) in mapping {
            let key = key.into();
            let kind = IdKind::parse(key.clone()).map_err(|_| {
                DomainError::InvalidTypeInCollection {
                    type_name: key.clone(),
                    expected: "identifier kind matching [a-z0-9_-]+".to_string(),
                }
            })?;

            if kind != registration.kind {
                return Err(DomainError::InvalidTypeInCollection {
                    type_name: registration.aggregate_type.to_string(),
                    expected: format!("aggregate reconstituting {kind} identifiers"),
                });
            }

            if map.contains_key(&kind) {
                return Err(DomainError::InvalidTypeInCollection {
                    type_name: key,
                    expected: "identifier kind mapped once".to_string(),
                });
            }

            tracing::debug!(
                kind = %kind,
                aggregate_type = registration.aggregate_type,
                "Registered aggregate"
            );
            map.insert(kind, registration);
        }

        Ok(Self { map })
    }

    pub fn builder() -> AggregateFactoryBuilder {
        AggregateFactoryBuilder::default()
    }

    /// Returns true if an aggregate is registered for `kind`.
    pub fn is_mapped(&self, kind: &IdKind) -> bool {
        self.map.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &IdKind> {
        self.map.keys()
    }

    /// Replays `history` into the aggregate registered for its identifier kind.
    pub fn reconstitute_from_history(
        &self,
        history: &AggregateHistory,
    ) -> Result<Box<dyn EventSourced>, DomainError> {
        let kind = history.aggregate_id().kind();
        let registration = self
            .map
            .get(kind)
            .ok_or_else(|| DomainError::IdNotMappedToAggregate(kind.clone()))?;

        (registration.reconstitute)(history)
    }

    /// Like [`reconstitute_from_history`](Self::reconstitute_from_history),
    /// but returns the concrete aggregate.
    pub fn reconstitute<A: Aggregate>(&self, history: &AggregateHistory) -> Result<A, DomainError> {
        let aggregate = self.reconstitute_from_history(history)?;
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
}

/// Builder collecting registrations for an [`AggregateFactory`].
#[derive(Debug, Default)]
pub struct AggregateFactoryBuilder {
    entries: Vec<(String, Registration)>,
}

impl AggregateFactoryBuilder {
    /// Registers `A` under its identifier's kind.
    pub fn register<A: Aggregate>(mut self) -> Self {
        let registration = Registration::of::<A>();
        self.entries
            .push((registration.kind.to_string(), registration));
        self
    }

    /// Adds an explicit mapping entry.
    pub fn map(mut self, kind: impl Into<String>, registration: Registration) -> Self {
        self.entries.push((kind.into(), registration));
        self
    }

    pub fn build(self) -> Result<AggregateFactory, DomainError> {
        AggregateFactory::new(self.entries)
    }
}
