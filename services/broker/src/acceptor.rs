use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;
use tracing::{error, info, warn};

use broker_core::{ConnectionIdGenerator, NamespaceRules, RoutableEvent};

/// Binds `localhost:{port}` and, for each accepted connection, spawns a
/// session task wired to the shared Dispatcher channel. Never returns on a
/// transient accept error; only a failed bind is fatal.
pub async fn run(
    port: u16,
    tls_acceptor: TlsAcceptor,
    namespace_rules: Arc<NamespaceRules>,
    routable_tx: mpsc::Sender<RoutableEvent>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(("localhost", port)).await?;
    info!(port, "broker listening");

    let ids = ConnectionIdGenerator::new();

    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(%err, "accept failed");
                continue;
            }
        };

        let connection_id = ids.next();
        let tls_acceptor = tls_acceptor.clone();
        let namespace_rules = namespace_rules.clone();
        let routable_tx = routable_tx.clone();

        tokio::spawn(async move {
            let tls_stream = match tls_acceptor.accept(stream).await {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(%err, %peer_addr, connection = %connection_id, "tls handshake failed");
                    return;
                }
            };

            if let Err(err) =
                broker_core::run_session(connection_id, tls_stream, namespace_rules, routable_tx).await
            {
                error!(%err, %peer_addr, connection = %connection_id, "session ended with error");
            }
        });
    }
}
