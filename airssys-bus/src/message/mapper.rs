// Layer 1: Standard library imports
use std::marker::PhantomData;

// Layer 2: Third-party crate imports
use serde::de::DeserializeOwned;
use serde::Serialize;

// Layer 3: Internal module imports
use super::types::{Message, MessageBody, MessageHeader, MessageType, Topic};
use crate::error::{BusError, BusResult};
use crate::request::Request;

/// Bidirectional codec between a request value and its wire message.
///
/// One mapper per request type, registered in the mapper registry.
/// A missing mapper is a configuration failure at the operation call
/// site, never at registration time.
///
/// # Invariant
/// `map_to_message` must copy the request's id into the message header,
/// so outbox entries stay keyed by the caller-visible id.
pub trait MessageMapper<R: Request>: Send + Sync {
    /// Encode a request into a wire message
    fn map_to_message(&self, request: &R) -> BusResult<Message>;

    /// Decode a wire message back into a request value
    fn map_to_request(&self, message: &Message) -> BusResult<R>;
}

/// Serde-JSON mapper for requests that derive `Serialize`/`Deserialize`.
///
/// The topic and message type are fixed per mapper instance; identity and
/// correlation metadata come from the request itself.
///
/// # Example
/// ```rust
/// use airssys_bus::message::{JsonMessageMapper, MessageMapper, MessageType, Topic};
/// use airssys_bus::request::Request;
/// use airssys_bus::util::MessageId;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct OrderPlaced {
///     id: MessageId,
///     sku: String,
/// }
///
/// impl Request for OrderPlaced {
///     const REQUEST_TYPE: &'static str = "order_placed";
///     fn id(&self) -> MessageId {
///         self.id
///     }
/// }
///
/// let mapper = JsonMessageMapper::<OrderPlaced>::new(Topic::new("orders"), MessageType::Event);
/// let event = OrderPlaced { id: MessageId::new(), sku: "A-1".into() };
/// let message = mapper.map_to_message(&event).unwrap();
/// assert_eq!(message.header.id, event.id);
/// ```
pub struct JsonMessageMapper<R> {
    topic: Topic,
    message_type: MessageType,
    _marker: PhantomData<fn() -> R>,
}

impl<R> JsonMessageMapper<R> {
    /// Create a mapper producing messages for the given topic and type
    pub fn new(topic: Topic, message_type: MessageType) -> Self {
        Self {
            topic,
            message_type,
            _marker: PhantomData,
        }
    }
}

impl<R> MessageMapper<R> for JsonMessageMapper<R>
where
    R: Request + Serialize + DeserializeOwned,
{
    fn map_to_message(&self, request: &R) -> BusResult<Message> {
        let bytes = serde_json::to_vec(request).map_err(|e| {
            BusError::transport("serialize message body", e.to_string())
        })?;

        let mut header = MessageHeader::new(request.id(), self.topic.clone(), self.message_type);
        if let Some(correlation_id) = request.correlation_id() {
            header = header.with_correlation_id(correlation_id);
        }

        Ok(Message::new(header, MessageBody::json(bytes)))
    }

    fn map_to_request(&self, message: &Message) -> BusResult<R> {
        serde_json::from_slice(&message.body.bytes).map_err(|e| {
            BusError::transport("deserialize message body", e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::util::{CorrelationId, MessageId};
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        id: MessageId,
        payload: String,
        correlation: Option<CorrelationId>,
    }

    impl Request for Sample {
        const REQUEST_TYPE: &'static str = "sample";

        fn id(&self) -> MessageId {
            self.id
        }

        fn correlation_id(&self) -> Option<CorrelationId> {
            self.correlation
        }
    }

    fn mapper() -> JsonMessageMapper<Sample> {
        JsonMessageMapper::new(Topic::new("samples"), MessageType::Command)
    }

    #[test]
    fn test_message_id_equals_request_id() {
        let request = Sample {
            id: MessageId::new(),
            payload: "hello".into(),
            correlation: None,
        };

        let message = mapper().map_to_message(&request).unwrap();
        assert_eq!(message.header.id, request.id);
        assert_eq!(message.header.topic.as_str(), "samples");
        assert_eq!(message.header.message_type, MessageType::Command);
    }

    #[test]
    fn test_correlation_propagates_to_header() {
        let correlation = CorrelationId::new();
        let request = Sample {
            id: MessageId::new(),
            payload: "hello".into(),
            correlation: Some(correlation),
        };

        let message = mapper().map_to_message(&request).unwrap();
        assert_eq!(message.header.correlation_id, Some(correlation));
    }

    #[test]
    fn test_round_trip_preserves_request() {
        let request = Sample {
            id: MessageId::new(),
            payload: "round trip".into(),
            correlation: Some(CorrelationId::new()),
        };

        let message = mapper().map_to_message(&request).unwrap();
        let decoded = mapper().map_to_request(&message).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_decode_garbage_fails_with_transport() {
        let message = Message::new(
            MessageHeader::new(MessageId::new(), Topic::new("samples"), MessageType::Command),
            MessageBody::json(b"not json".to_vec()),
        );

        let err = mapper().map_to_request(&message).unwrap_err();
        assert_eq!(err.category(), "transport");
    }
}
