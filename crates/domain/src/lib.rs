//! Domain layer for the event-sourcing core.
//!
//! This crate provides:
//! - the Aggregate contract (replay, command recording, uncommitted-event drain)
//! - AggregateFactory, which dispatches an identifier's kind to the aggregate
//!   type that reconstitutes it
//! - AggregateRepository, which loads aggregates from an event store and saves
//!   their new events under an optimistic concurrency check
//! - a small Basket aggregate used as a concrete example

pub mod aggregate;
pub mod basket;
pub mod error;
pub mod factory;
pub mod repository;

pub use aggregate::{Aggregate, AggregateRoot, DomainEvent, EventSourced, PendingEvent};
pub use basket::{Basket, BasketError, BasketEvent, BasketId, ProductId};
pub use error::DomainError;
pub use factory::{AggregateFactory, AggregateFactoryBuilder, Registration};
pub use repository::AggregateRepository;
