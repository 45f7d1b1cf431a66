//! Mapper registry: request type to wire codec.

// Layer 1: Standard library imports
use std::any::{Any, TypeId};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use dashmap::DashMap;

// Layer 3: Internal module imports
use crate::message::MessageMapper;
use crate::request::Request;

/// Maps a request type to its bidirectional message codec.
///
/// A missing mapper is surfaced as a configuration failure at the
/// operation call site, never at registration: lookups return `Option`
/// and the façade attaches the request type name to the error.
#[derive(Default)]
pub struct MapperRegistry {
    entries: DashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl MapperRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Register the mapper for `R`, replacing any previous one.
    pub fn register<R: Request>(&self, mapper: impl MessageMapper<R> + 'static) {
        let mapper: Arc<dyn MessageMapper<R>> = Arc::new(mapper);
        self.entries.insert(TypeId::of::<R>(), Box::new(mapper));
    }

    /// Look up the mapper for `R`.
    pub fn get<R: Request>(&self) -> Option<Arc<dyn MessageMapper<R>>> {
        self.entries.get(&TypeId::of::<R>()).and_then(|entry| {
            entry
                .downcast_ref::<Arc<dyn MessageMapper<R>>>()
                .map(Arc::clone)
        })
    }

    /// Returns true when a mapper is registered for `R`.
    pub fn contains<R: Request>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<R>())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::message::{JsonMessageMapper, MessageType, Topic};
    use crate::util::MessageId;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Ping {
        id: MessageId,
    }

    impl Request for Ping {
        const REQUEST_TYPE: &'static str = "ping";

        fn id(&self) -> MessageId {
            self.id
        }
    }

    #[test]
    fn test_missing_mapper_is_none() {
        let registry = MapperRegistry::new();
        assert!(registry.get::<Ping>().is_none());
        assert!(!registry.contains::<Ping>());
    }

    #[test]
    fn test_registered_mapper_round_trips() {
        let registry = MapperRegistry::new();
        registry.register(JsonMessageMapper::<Ping>::new(
            Topic::new("pings"),
            MessageType::Command,
        ));

        let mapper = registry.get::<Ping>().unwrap();
        let ping = Ping {
            id: MessageId::new(),
        };
        let message = mapper.map_to_message(&ping).unwrap();
        assert_eq!(message.header.id, ping.id);
        assert!(registry.contains::<Ping>());
    }

    #[test]
    fn test_reregistration_replaces() {
        let registry = MapperRegistry::new();
        registry.register(JsonMessageMapper::<Ping>::new(
            Topic::new("old"),
            MessageType::Command,
        ));
        registry.register(JsonMessageMapper::<Ping>::new(
            Topic::new("new"),
            MessageType::Command,
        ));

        let mapper = registry.get::<Ping>().unwrap();
        let message = mapper
            .map_to_message(&Ping {
                id: MessageId::new(),
            })
            .unwrap();
        assert_eq!(message.header.topic.as_str(), "new");
    }
}
