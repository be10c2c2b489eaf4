use std::fmt;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio_util::codec::Framed;
use tracing::{debug, info, instrument, warn};

use broker_protocol::{Frame, FrameCodec, Message, MessageId};

use crate::dispatcher::RoutableEvent;
use crate::error::SessionError;
use crate::ids::ConnectionId;
use crate::namespace::NamespaceRules;

/// Capacity of a session's outbound queue. A connection that cannot drain 20
/// pending frames is considered a slow consumer and is force-disconnected
/// rather than allowed to buffer further (§5 load-shedding policy).
pub const OUTBOUND_QUEUE_CAPACITY: usize = 20;

/// A pre-encoded frame waiting to be written to a session's socket.
/// `terminal` marks the `Error` reply that must close the connection the
/// instant it is flushed.
#[derive(Debug, Clone)]
pub struct QueuedFrame {
    pub bytes: Bytes,
    pub terminal: bool,
}

impl QueuedFrame {
    pub fn new(bytes: Bytes) -> Self {
        QueuedFrame { bytes, terminal: false }
    }

    pub fn terminal(bytes: Bytes) -> Self {
        QueuedFrame { bytes, terminal: true }
    }
}

struct Inner {
    connected: bool,
    sender: mpsc::Sender<QueuedFrame>,
    writer_abort: Option<AbortHandle>,
}

/// A cheap, cloneable reference to one connected client, shared between the
/// dispatcher's subscription table and the session's own reader task.
/// Equality and hashing are by [`ConnectionId`] alone so it can live as a
/// `HashSet` member in the dispatcher's subscriber sets.
#[derive(Clone)]
pub struct SessionHandle {
    id: ConnectionId,
    client_id: Arc<str>,
    inner: Arc<Mutex<Inner>>,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("client_id", &self.client_id)
            .finish()
    }
}

impl PartialEq for SessionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SessionHandle {}

impl std::hash::Hash for SessionHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl SessionHandle {
    fn new(id: ConnectionId, client_id: impl Into<Arc<str>>, sender: mpsc::Sender<QueuedFrame>) -> Self {
        SessionHandle {
            id,
            client_id: client_id.into(),
            inner: Arc::new(Mutex::new(Inner {
                connected: true,
                sender,
                writer_abort: None,
            })),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn set_writer_abort(&self, abort: AbortHandle) {
        self.inner.lock().unwrap().writer_abort = Some(abort);
    }

    /// Enqueue a pre-encoded frame for delivery. Non-blocking: a full queue
    /// force-disconnects the session and returns `Err(SlowConsumer)` rather
    /// than applying backpressure to the publisher or dispatcher.
    pub fn try_enqueue(&self, frame: QueuedFrame) -> Result<(), SessionError> {
        let guard = self.inner.lock().unwrap();
        if !guard.connected {
            return Err(SessionError::PeerClosed);
        }
        match guard.sender.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SessionError::PeerClosed),
            Err(mpsc::error::TrySendError::Full(_)) => {
                drop(guard);
                self.disconnect();
                Err(SessionError::SlowConsumer)
            }
        }
    }

    /// Forcibly tear down the session: aborts the writer task (closing the
    /// socket out from under any in-flight write) and marks this handle dead
    /// so further `try_enqueue` calls fail fast.
    pub fn disconnect(&self) {
        let mut guard = self.inner.lock().unwrap();
        guard.connected = false;
        if let Some(abort) = guard.writer_abort.take() {
            abort.abort();
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().unwrap().connected
    }
}

/// Drives one client connection end to end: reads `Start`, admits or rejects
/// the namespace, then alternates reading client frames and routing them to
/// the dispatcher while a sibling task drains the outbound queue to the raw
/// socket half. Returns once the connection is fully torn down.
#[instrument(skip(stream, namespace_rules, routable_tx), fields(connection = %connection_id))]
pub async fn run_session<S>(
    connection_id: ConnectionId,
    stream: S,
    namespace_rules: Arc<NamespaceRules>,
    routable_tx: mpsc::Sender<RoutableEvent>,
) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut source = Framed::new(read_half, FrameCodec::new());

    let (message_id, client_id, namespace) = match await_start(&mut source, &namespace_rules).await {
        Ok(started) => started,
        Err(err) => {
            send_rejection(&mut write_half, &err).await;
            return Err(err);
        }
    };

    info!(%client_id, %namespace, "session started");

    let (out_tx, out_rx) = mpsc::channel::<QueuedFrame>(OUTBOUND_QUEUE_CAPACITY);
    let handle = SessionHandle::new(connection_id, client_id.clone(), out_tx);

    let writer = tokio::spawn(run_writer(write_half, out_rx));
    handle.set_writer_abort(writer.abort_handle());

    reply_ack(&handle, message_id);

    let reason = read_loop(&mut source, &handle, &namespace, &routable_tx).await;

    handle.disconnect();
    let _ = routable_tx
        .send(RoutableEvent::Disconnect {
            session: handle.clone(),
            namespace: namespace.clone(),
        })
        .await;
    let _ = writer.await;

    match &reason {
        Ok(()) => info!(%client_id, "session closed"),
        Err(err) => debug!(%client_id, %err, "session closed with error"),
    }
    reason
}

async fn run_writer<W>(mut write_half: W, mut out_rx: mpsc::Receiver<QueuedFrame>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(queued) = out_rx.recv().await {
        let terminal = queued.terminal;
        if let Err(err) = write_half.write_all(&queued.bytes).await {
            warn!(%err, "write failed, closing session");
            break;
        }
        if write_half.flush().await.is_err() || terminal {
            break;
        }
    }
    let _ = write_half.shutdown().await;
}

async fn await_start<R>(
    source: &mut Framed<R, FrameCodec>,
    namespace_rules: &NamespaceRules,
) -> Result<(MessageId, String, String), SessionError>
where
    R: AsyncRead + Unpin,
{
    let Some(frame) = source.next().await else {
        return Err(SessionError::ClosedBeforeStart);
    };
    let frame = frame?;
    match frame.body {
        Message::Start {
            client_id,
            namespace,
            protocol_version,
        } => {
            if protocol_version != broker_protocol::CURRENT_PROTOCOL_VERSION {
                return Err(SessionError::ProtocolVersionMismatch {
                    got: protocol_version,
                    expected: broker_protocol::CURRENT_PROTOCOL_VERSION,
                });
            }
            if !namespace_rules.is_valid(&namespace) {
                return Err(SessionError::NamespaceRejected { namespace });
            }
            Ok((frame.message_id, client_id, namespace))
        }
        other => Err(SessionError::ExpectedStartFirst {
            got: other.message_type(),
        }),
    }
}

/// A topic must be a non-empty hierarchical path. Rejecting one terminates
/// the session: the client gets an `Error` reply naming the bad topic, then
/// the connection is closed once that reply is flushed.
fn reject_empty_topic(handle: &SessionHandle, message_id: MessageId, topic: &str) -> SessionError {
    let error = Frame::new(message_id, Message::error(format!("empty topic: {topic:?}")));
    if let Ok(bytes) = broker_protocol::encode_frame(&error) {
        let _ = handle.try_enqueue(QueuedFrame::terminal(bytes));
    }
    SessionError::EmptyTopic
}

fn reply_ack(handle: &SessionHandle, message_id: MessageId) {
    let ack = Frame::new(message_id, Message::Ack);
    if let Ok(bytes) = broker_protocol::encode_frame(&ack) {
        let _ = handle.try_enqueue(QueuedFrame::new(bytes));
    }
}

async fn send_rejection<W>(write_half: &mut W, err: &SessionError)
where
    W: AsyncWrite + Unpin,
{
    let frame = Frame::new(MessageId::from("rejected"), Message::error(err.to_string()));
    if let Ok(bytes) = broker_protocol::encode_frame(&frame) {
        let _ = write_half.write_all(&bytes).await;
        let _ = write_half.flush().await;
    }
}

async fn read_loop<R>(
    source: &mut Framed<R, FrameCodec>,
    handle: &SessionHandle,
    namespace: &str,
    routable_tx: &mpsc::Sender<RoutableEvent>,
) -> Result<(), SessionError>
where
    R: AsyncRead + Unpin,
{
    loop {
        let Some(frame) = source.next().await else {
            return Ok(());
        };
        let frame = frame?;
        let message_id = frame.message_id.clone();
        match frame.body {
            Message::Subscribe { subs } => {
                if let Some(bad) = subs.iter().find(|s| s.topic.is_empty()) {
                    return Err(reject_empty_topic(handle, message_id, &bad.topic));
                }
                for sub in subs {
                    let _ = routable_tx
                        .send(RoutableEvent::Subscribe {
                            session: handle.clone(),
                            namespace: namespace.to_owned(),
                            topic: sub.topic,
                        })
                        .await;
                }
                reply_ack(handle, message_id);
            }
            Message::Unsubscribe { subs } => {
                if let Some(bad) = subs.iter().find(|s| s.topic.is_empty()) {
                    return Err(reject_empty_topic(handle, message_id, &bad.topic));
                }
                for sub in subs {
                    let _ = routable_tx
                        .send(RoutableEvent::Unsubscribe {
                            session: handle.clone(),
                            namespace: namespace.to_owned(),
                            topic: sub.topic,
                        })
                        .await;
                }
                reply_ack(handle, message_id);
            }
            Message::Publish { topic, payload } => {
                if topic.is_empty() {
                    return Err(reject_empty_topic(handle, message_id, &topic));
                }
                let _ = routable_tx
                    .send(RoutableEvent::Publish {
                        namespace: namespace.to_owned(),
                        topic,
                        payload,
                        publisher: handle.clone(),
                        message_id,
                    })
                    .await;
                reply_ack(handle, frame.message_id);
            }
            Message::Ping => {
                let ack = Frame::new(message_id, Message::Ack);
                if let Ok(bytes) = broker_protocol::encode_frame(&ack) {
                    let _ = handle.try_enqueue(QueuedFrame::new(bytes));
                }
            }
            Message::Start { .. } => {
                return Err(SessionError::ExpectedStartFirst {
                    got: broker_protocol::MessageType::Start,
                });
            }
            Message::Ack => {
                return Err(SessionError::UnexpectedActiveMessage {
                    got: broker_protocol::MessageType::Ack,
                });
            }
            Message::Error { .. } => {
                return Err(SessionError::UnexpectedActiveMessage {
                    got: broker_protocol::MessageType::Error,
                });
            }
        }
    }
}
