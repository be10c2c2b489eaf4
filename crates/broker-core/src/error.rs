use broker_protocol::CodecError;

/// Failure modes of a single session's reader/writer tasks. Every variant is
/// terminal: once raised, the session is torn down.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("transport closed before a Start frame was received")]
    ClosedBeforeStart,

    #[error("expected Start as the first frame, got {got}")]
    ExpectedStartFirst { got: broker_protocol::MessageType },

    #[error("message type {got} is not permitted in the Active state")]
    UnexpectedActiveMessage { got: broker_protocol::MessageType },

    #[error("namespace {namespace:?} is not permitted by this broker's configuration")]
    NamespaceRejected { namespace: String },

    #[error("topic must be a non-empty hierarchical path")]
    EmptyTopic,

    #[error("unsupported protocol version {got} (broker speaks {expected})")]
    ProtocolVersionMismatch { got: i32, expected: i32 },

    #[error("framing/codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("outbound queue overflowed, slow consumer disconnected")]
    SlowConsumer,

    #[error("connection closed by peer")]
    PeerClosed,
}
