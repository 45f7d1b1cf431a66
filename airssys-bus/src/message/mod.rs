//! Wire message model and request/message codecs.

pub mod mapper;
pub mod types;

pub use mapper::{JsonMessageMapper, MessageMapper};
pub use types::{ChannelName, Message, MessageBody, MessageHeader, MessageType, Topic};
