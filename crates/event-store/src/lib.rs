//! Storage boundary of the event-sourcing core.
//!
//! Provides the immutable envelope collections used to carry an aggregate's
//! history ([`EventEnvelopeStream`], [`AggregateHistory`]), the
//! [`EventStore`] trait with its version-checked append, and in-memory and
//! PostgreSQL implementations of it.

pub mod config;
pub mod error;
pub mod event;
pub mod history;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod stream;

pub use common::{AggregateId, IdKind, Identifier};
pub use config::PostgresConfig;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use history::AggregateHistory;
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use store::{EventStore, EventStoreExt};
pub use stream::EventEnvelopeStream;
