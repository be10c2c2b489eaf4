use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_util::codec::Framed;

use broker_protocol::{Frame, FrameCodec, Message, MessageId};

#[derive(Debug, thiserror::Error)]
pub enum TestClientError {
    #[error("tcp connect failed: {0}")]
    Connect(#[from] std::io::Error),
    #[error("tls handshake failed: {0}")]
    Tls(rustls::Error),
    #[error("codec error: {0}")]
    Codec(#[from] broker_protocol::CodecError),
    #[error("connection closed by peer")]
    Closed,
}

/// A minimal mTLS client driving the same `FrameCodec` the broker speaks,
/// used by integration tests to exercise handshake, routing and
/// backpressure behaviour end to end.
pub struct TestClient {
    framed: Framed<TlsStream<TcpStream>, FrameCodec>,
}

impl TestClient {
    pub async fn connect(
        addr: SocketAddr,
        client_config: rustls::ClientConfig,
    ) -> Result<Self, TestClientError> {
        let connector = TlsConnector::from(Arc::new(client_config));
        let tcp = TcpStream::connect(addr).await?;
        let server_name = ServerName::try_from("localhost")
            .expect("\"localhost\" is a valid DNS name")
            .to_owned();
        let tls = connector
            .connect(server_name, tcp)
            .await
            .map_err(TestClientError::Tls)?;
        Ok(TestClient {
            framed: Framed::new(tls, FrameCodec::new()),
        })
    }

    /// Sends `Start`. The caller reads back the reply: a valid handshake
    /// replies `Ack(msgID)`; a rejected one replies `Error(...)` and closes
    /// the connection. See [`Self::start_and_expect_ack`] for the common case
    /// where the caller just wants the handshake to succeed.
    pub async fn start(
        &mut self,
        message_id: impl Into<MessageId>,
        client_id: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Result<(), TestClientError> {
        self.send(
            message_id,
            Message::Start {
                client_id: client_id.into(),
                namespace: namespace.into(),
                protocol_version: broker_protocol::CURRENT_PROTOCOL_VERSION,
            },
        )
        .await
    }

    /// Sends `Start` and asserts the handshake `Ack` comes back carrying the
    /// same `MessageId` (spec: `Ack(msgID)` on a valid Start), leaving the
    /// connection `Active`. Panics if the reply is not that `Ack`.
    pub async fn start_and_expect_ack(
        &mut self,
        message_id: impl Into<MessageId>,
        client_id: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Result<(), TestClientError> {
        let message_id = message_id.into();
        self.start(message_id.clone(), client_id, namespace).await?;

        let reply = self.recv().await?;
        assert_eq!(reply.body, Message::Ack, "Start was not acked");
        assert_eq!(reply.message_id, message_id, "Start was not acked with its own MessageId");
        Ok(())
    }

    pub async fn send(
        &mut self,
        message_id: impl Into<MessageId>,
        body: Message,
    ) -> Result<(), TestClientError> {
        self.framed
            .send(Frame::new(message_id, body))
            .await
            .map_err(TestClientError::Codec)
    }

    pub async fn recv(&mut self) -> Result<Frame, TestClientError> {
        match self.framed.next().await {
            Some(Ok(frame)) => Ok(frame),
            Some(Err(err)) => Err(TestClientError::Codec(err)),
            None => Err(TestClientError::Closed),
        }
    }

    /// `None` if nothing arrives within `timeout`; useful for asserting a
    /// disconnected or silent peer rather than blocking forever.
    pub async fn try_recv(&mut self, timeout: std::time::Duration) -> Option<Frame> {
        tokio::time::timeout(timeout, self.recv()).await.ok()?.ok()
    }
}
