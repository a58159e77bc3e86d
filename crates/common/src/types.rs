use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Error returned when a string is not a valid identifier kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid identifier kind {0:?}: expected lowercase ASCII letters, digits, '-' or '_'")]
pub struct IdKindError(pub String);

/// Stable type tag carried by every aggregate identifier.
///
/// The tag names the kind of aggregate an identifier belongs to (for example
/// `"basket"`) and is what the aggregate factory dispatches on. It is
/// persisted next to the identifier value, so it must never change once
/// events have been written with it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdKind(String);

impl IdKind {
    /// Parses an identifier kind, rejecting empty or malformed tags.
    pub fn parse(kind: impl Into<String>) -> Result<Self, IdKindError> {
        let kind = kind.into();
        if Self::is_valid(&kind) {
            Ok(Self(kind))
        } else {
            Err(IdKindError(kind))
        }
    }

    /// Returns true if `kind` is non-empty and made only of `[a-z0-9_-]`.
    pub fn is_valid(kind: &str) -> bool {
        !kind.is_empty()
            && kind
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
    }

    /// Returns the tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for IdKind {
    type Error = IdKindError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<IdKind> for String {
    fn from(kind: IdKind) -> Self {
        kind.0
    }
}

impl PartialEq<str> for IdKind {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for IdKind {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Unique identifier for an aggregate instance.
///
/// Pairs the identifier's [`IdKind`] with a UUID value. Two identifiers are
/// equal only when both the kind and the value match, so a basket and an
/// order never share a stream even if their UUIDs collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregateId {
    kind: IdKind,
    value: Uuid,
}

impl AggregateId {
    /// Creates an identifier from a kind and an existing UUID.
    pub fn new(kind: IdKind, value: Uuid) -> Self {
        Self { kind, value }
    }

    /// Creates a new random identifier of the given kind.
    pub fn generate(kind: IdKind) -> Self {
        Self::new(kind, Uuid::new_v4())
    }

    /// Returns the identifier's type tag.
    pub fn kind(&self) -> &IdKind {
        &self.kind
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.value
    }
}

impl fmt::Display for AggregateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

/// Capability implemented by typed aggregate identifiers.
///
/// A typed identifier (such as `BasketId`) wraps a UUID and declares the
/// stable [`IdKind`] tag under which its aggregates are stored and
/// dispatched. `KIND` must satisfy [`IdKind::is_valid`].
pub trait Identifier: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// The stable type tag for this identifier.
    const KIND: &'static str;

    /// Wraps an existing UUID.
    fn from_uuid(uuid: Uuid) -> Self;

    /// Returns the underlying UUID.
    fn as_uuid(&self) -> Uuid;

    /// Returns the parsed type tag.
    fn kind() -> Result<IdKind, IdKindError> {
        IdKind::parse(Self::KIND)
    }

    /// Converts this typed identifier into a tagged [`AggregateId`].
    ///
    /// Panics in debug builds if `KIND` is not a valid [`IdKind`]; such an
    /// id could be stored but never deserialized again.
    fn aggregate_id(&self) -> AggregateId {
        debug_assert!(
            IdKind::is_valid(Self::KIND),
            "identifier kind {:?} is not a valid IdKind",
            Self::KIND
        );
        AggregateId::new(IdKind(Self::KIND.to_string()), self.as_uuid())
    }

    /// Recovers a typed identifier, or `None` if the tag does not match.
    fn try_from_aggregate_id(id: &AggregateId) -> Option<Self> {
        (id.kind() == Self::KIND).then(|| Self::from_uuid(id.as_uuid()))
    }
}
