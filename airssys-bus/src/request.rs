//! Request traits and the reply address carried by call-style requests.
//!
//! A request is any value the façade can dispatch. Whether it behaves as
//! a command (exactly one handler) or an event (zero or more handlers) is
//! decided by the operation invoked on it, not by a marker trait; only
//! request-reply capability needs the extra [`Call`] surface.

// Layer 1: Standard library imports
use std::fmt::Debug;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::message::Topic;
use crate::util::{CorrelationId, MessageId};

/// Core request trait with compile-time type identification
///
/// # Zero-Cost Abstraction
/// Uses const REQUEST_TYPE instead of runtime reflection. Registries key
/// their in-memory tables by `std::any::TypeId`; the const is the stable
/// wire-level and diagnostic name for the type.
///
/// # Example
/// ```rust
/// use airssys_bus::request::Request;
/// use airssys_bus::util::MessageId;
///
/// #[derive(Debug, Clone)]
/// struct PlaceOrder {
///     id: MessageId,
///     sku: String,
/// }
///
/// impl Request for PlaceOrder {
///     const REQUEST_TYPE: &'static str = "place_order";
///
///     fn id(&self) -> MessageId {
///         self.id
///     }
/// }
/// ```
pub trait Request: Send + Sync + Clone + Debug + 'static {
    /// Unique request type identifier (compile-time constant)
    const REQUEST_TYPE: &'static str;

    /// Unique id, stable from construction.
    ///
    /// The message a mapper produces for this request carries the same id.
    fn id(&self) -> MessageId;

    /// Correlation id linking this request to a wider exchange
    fn correlation_id(&self) -> Option<CorrelationId> {
        None
    }
}

/// Reply destination for a request-reply exchange.
///
/// Both fields are derived from the same ephemeral channel id: the topic
/// routes the reply, the correlation id authenticates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyAddress {
    /// Topic the reply should be produced to
    pub topic: Topic,

    /// Correlation id the reply must echo
    pub correlation_id: CorrelationId,
}

impl ReplyAddress {
    /// Create a reply address
    pub fn new(topic: Topic, correlation_id: CorrelationId) -> Self {
        Self {
            topic,
            correlation_id,
        }
    }
}

/// Request-reply capability.
///
/// Implemented by requests that expect a response over an ephemeral reply
/// channel. The processor mutates the reply address at call time, before
/// the request is mapped to its wire message.
pub trait Call: Request {
    /// The reply destination, once assigned
    fn reply_address(&self) -> Option<&ReplyAddress>;

    /// Assign the reply destination for this exchange
    fn set_reply_address(&mut self, address: ReplyAddress);
}
