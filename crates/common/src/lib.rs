//! Identifier types shared by every layer of the event-sourcing core.

mod types;

pub use types::{AggregateId, IdKind, IdKindError, Identifier};
