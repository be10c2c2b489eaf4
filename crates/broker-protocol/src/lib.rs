//! broker-protocol: wire types and framing for the pub/sub broker.
//!
//! A frame on the wire is a 4-byte big-endian length prefix followed by a
//! `bincode`-encoded [`Frame`]. `MessageType` is never stored redundantly —
//! it is recoverable from the [`Message`] variant via [`Message::message_type`].
//! This module treats the transport below the frame boundary (TCP vs TLS) as
//! none of its concern; callers hand it anything that implements
//! `AsyncRead`/`AsyncWrite` via `tokio_util::codec::Framed`.

use serde::{Deserialize, Serialize};
use std::fmt;

mod codec;

pub use codec::{CodecError, FrameCodec, encode_frame};

/// The only protocol version this broker understands. A `Start` whose
/// `protocol_version` differs (higher or lower) is rejected.
pub const CURRENT_PROTOCOL_VERSION: i32 = 1;

/// Largest frame body (post length-prefix) the codec will decode, in bytes.
/// Guards against a corrupt or hostile length prefix causing unbounded
/// allocation before a single byte of `bincode` input is even read.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Opaque per-client correlation token. The broker never inspects this value;
/// it only echoes it back on `Ack`/`Error` replies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        MessageId(s.to_owned())
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        MessageId(s)
    }
}

/// One `{Topic}` entry in a `Subscribe`/`Unsubscribe` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubEntry {
    pub topic: String,
}

impl SubEntry {
    pub fn new(topic: impl Into<String>) -> Self {
        SubEntry { topic: topic.into() }
    }
}

/// Every message type the protocol defines, tagged by variant. `MessageType`
/// (§3 of the spec) is recovered from this enum rather than carried
/// separately on the wire — see [`Message::message_type`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    Start {
        client_id: String,
        namespace: String,
        protocol_version: i32,
    },
    Publish {
        topic: String,
        payload: Vec<u8>,
    },
    Subscribe {
        subs: Vec<SubEntry>,
    },
    Unsubscribe {
        subs: Vec<SubEntry>,
    },
    Ping,
    Ack,
    Error {
        error: String,
    },
}

/// The discrete `MessageType` tag named throughout the spec, independent of
/// any payload the message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Start,
    Publish,
    Subscribe,
    Unsubscribe,
    Ping,
    Ack,
    Error,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageType::Start => "Start",
            MessageType::Publish => "Publish",
            MessageType::Subscribe => "Subscribe",
            MessageType::Unsubscribe => "Unsubscribe",
            MessageType::Ping => "Ping",
            MessageType::Ack => "Ack",
            MessageType::Error => "Error",
        };
        write!(f, "{s}")
    }
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Start { .. } => MessageType::Start,
            Message::Publish { .. } => MessageType::Publish,
            Message::Subscribe { .. } => MessageType::Subscribe,
            Message::Unsubscribe { .. } => MessageType::Unsubscribe,
            Message::Ping => MessageType::Ping,
            Message::Ack => MessageType::Ack,
            Message::Error { .. } => MessageType::Error,
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Message::Error { error: reason.into() }
    }
}

/// A `{MessageType, MessageId, PayloadBytes}` record, modelled as a
/// correlation id plus a tagged payload enum (the `MessageType` is implied by
/// `body`, not stored twice).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub message_id: MessageId,
    pub body: Message,
}

impl Frame {
    pub fn new(message_id: impl Into<MessageId>, body: Message) -> Self {
        Frame {
            message_id: message_id.into(),
            body,
        }
    }

    pub fn message_type(&self) -> MessageType {
        self.body.message_type()
    }
}
