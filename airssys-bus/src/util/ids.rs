// Layer 1: Standard library imports
use std::fmt::{self, Display};
use std::str::FromStr;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Layer 3: Internal module imports
// (none)

/// Identity shared by a request and the wire message mapped from it.
///
/// Minted once when the request is constructed; the mapper copies it
/// into the message header and the outbox keys its entries by it, so a
/// deposit/clear round-trip needs no separate correlation table.
/// Durable stores persist it as its string form, which [`FromStr`]
/// reads back.
///
/// # Example
/// ```rust
/// use airssys_bus::util::MessageId;
///
/// let id = MessageId::new();
/// let persisted = id.to_string();
/// let restored: MessageId = persisted.parse().unwrap();
/// assert_eq!(restored, id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Mint a fresh id (UUID v4)
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for MessageId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<MessageId> for Uuid {
    fn from(id: MessageId) -> Self {
        id.0
    }
}

impl FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Token a reply must echo to be accepted by its originating exchange.
///
/// Unlike [`MessageId`], a correlation id is never persisted as a key
/// and never parsed back on its own: it exists to be compared. For
/// request-reply the token is derived from the ephemeral reply
/// channel's id (see
/// [`ChannelName::ephemeral`](crate::message::ChannelName::ephemeral)),
/// and [`accepts`](CorrelationId::accepts) is the single place that
/// comparison happens.
///
/// # Example
/// ```rust
/// use airssys_bus::util::CorrelationId;
///
/// let token = CorrelationId::new();
/// assert!(token.accepts(Some(token)));
/// assert!(!token.accepts(Some(CorrelationId::new())));
/// assert!(!token.accepts(None));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Mint a fresh token for a new exchange
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derive the token of an exchange from its channel uuid.
    ///
    /// Reply channels and their correlation tokens share one uuid, so
    /// either side can be reconstructed from the other.
    pub(crate) fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns true when a reply's echoed token matches this exchange.
    ///
    /// An absent token never matches: an uncorrelated reply is a
    /// foreign reply.
    pub fn accepts(&self, echoed: Option<CorrelationId>) -> bool {
        echoed.is_some_and(|token| token == *self)
    }
}

impl Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
