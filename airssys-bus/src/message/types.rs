// Layer 1: Standard library imports
use std::collections::HashMap;
use std::fmt::{self, Display};

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc}; // §3.2 MANDATORY
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Layer 3: Internal module imports
use crate::util::{CorrelationId, MessageId};

/// Routing destination on the broker side
///
/// An opaque string; the core never interprets it beyond equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topic(String);

impl Topic {
    /// Create a topic from any string-like value
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the topic as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Topic {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Name of a broker subscriber channel
///
/// Reply channels for request-reply use [`ChannelName::ephemeral`], which
/// mints a fresh channel per call together with the correlation token
/// replies on that channel must echo — both sides of one uuid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelName(String);

impl ChannelName {
    /// Create a channel name from any string-like value
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Mint a fresh reply channel and its correlation token.
    ///
    /// The channel name and the token are derived from one uuid, so a
    /// responder that only sees the channel can still echo the right
    /// token (see [`ChannelName::reply_correlation`]).
    pub fn ephemeral() -> (Self, CorrelationId) {
        let uuid = Uuid::new_v4();
        (Self(uuid.to_string()), CorrelationId::from_uuid(uuid))
    }

    /// Recover the correlation token of an ephemeral reply channel.
    ///
    /// Returns `None` for channels that were not minted by
    /// [`ChannelName::ephemeral`].
    pub fn reply_correlation(&self) -> Option<CorrelationId> {
        Uuid::parse_str(&self.0).ok().map(CorrelationId::from_uuid)
    }

    /// Get the channel name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChannelName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Wire-level message classification.
///
/// Drives remote dispatch on the consuming side: `Command` expects a
/// single remote handler, `Event` fans out, `Document` carries a
/// request-reply response payload, `None` is the channel's timeout
/// indicator, and `Quit` stops a remote consumer loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    /// Point-to-point command
    Command,
    /// Fan-out event
    Event,
    /// Request-reply response payload
    Document,
    /// Empty placeholder, used as a receive-timeout indicator
    None,
    /// Consumer shutdown signal
    Quit,
}

/// Message header carrying identity, routing, and correlation metadata.
///
/// Headers are created by mappers and never mutated once the message is
/// persisted in an outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Message id, equal to the originating request's id
    pub id: MessageId,

    /// Routing destination
    pub topic: Topic,

    /// Wire-level classification
    pub message_type: MessageType,

    /// Message creation timestamp (§3.2 chrono `DateTime<Utc>`)
    pub timestamp: DateTime<Utc>,

    /// Optional correlation id for request-reply tracking
    pub correlation_id: Option<CorrelationId>,

    /// Optional reply channel for request-reply
    pub reply_to: Option<ChannelName>,

    /// Optional broker-side delivery delay in milliseconds
    pub delay_ms: Option<u64>,

    /// Free-form header bag for application metadata
    pub bag: HashMap<String, serde_json::Value>,
}

impl MessageHeader {
    /// Create a header with the mandatory fields and a fresh timestamp
    pub fn new(id: MessageId, topic: Topic, message_type: MessageType) -> Self {
        Self {
            id,
            topic,
            message_type,
            timestamp: Utc::now(),
            correlation_id: None,
            reply_to: None,
            delay_ms: None,
            bag: HashMap::new(),
        }
    }

    /// Builder method: Set correlation id
    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Builder method: Set reply channel
    pub fn with_reply_to(mut self, reply_to: ChannelName) -> Self {
        self.reply_to = Some(reply_to);
        self
    }

    /// Builder method: Set delivery delay in milliseconds
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }

    /// Builder method: Add a bag entry
    pub fn with_bag_entry(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.bag.insert(key.into(), value);
        self
    }
}

/// Opaque message payload.
///
/// The core never inspects the bytes; mappers own the encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    /// Raw payload bytes
    pub bytes: Vec<u8>,

    /// MIME content type of the payload
    pub content_type: String,
}

impl MessageBody {
    /// Create a body from raw bytes and a content type
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }

    /// Create a JSON body
    pub fn json(bytes: Vec<u8>) -> Self {
        Self::new(bytes, "application/json")
    }

    /// Create an empty body
    pub fn empty() -> Self {
        Self::new(Vec::new(), "text/plain")
    }

    /// Returns true if the body carries no payload
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A complete wire message: header plus opaque body.
///
/// # Example
/// ```rust
/// use airssys_bus::message::{Message, MessageBody, MessageHeader, MessageType, Topic};
/// use airssys_bus::util::MessageId;
///
/// let header = MessageHeader::new(MessageId::new(), Topic::new("orders"), MessageType::Event);
/// let message = Message::new(header, MessageBody::json(b"{}".to_vec()));
/// assert_eq!(message.header.message_type, MessageType::Event);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Identity, routing, and correlation metadata
    pub header: MessageHeader,

    /// Opaque payload
    pub body: MessageBody,
}

impl Message {
    /// Create a message from a header and body
    pub fn new(header: MessageHeader, body: MessageBody) -> Self {
        Self { header, body }
    }

    /// Create an empty `None`-typed message.
    ///
    /// Channels return this as their receive-timeout indicator.
    pub fn none() -> Self {
        Self {
            header: MessageHeader::new(MessageId::new(), Topic::new(""), MessageType::None),
            body: MessageBody::empty(),
        }
    }

    /// Get the message id
    pub fn id(&self) -> MessageId {
        self.header.id
    }

    /// Returns true for the `None`-typed timeout indicator
    pub fn is_none_type(&self) -> bool {
        self.header.message_type == MessageType::None
    }
}
