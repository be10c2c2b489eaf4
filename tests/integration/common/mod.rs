use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use broker_core::{Dispatcher, NamespaceRules};
use broker_test_utils::TestCa;

/// Starts a fully wired broker (Dispatcher + accept loop) bound to an
/// OS-assigned port on localhost, using a freshly generated CA/cert set.
/// Returns the CA (so tests can mint matching or foreign client configs) and
/// the address clients should connect to.
pub async fn spawn_broker(namespace_rules: NamespaceRules) -> (TestCa, SocketAddr) {
    let ca = TestCa::generate();
    let tls_acceptor = ca.server_acceptor();

    // Reserve a port synchronously so the caller gets a real address back
    // before the accept loop is listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (routable_tx, routable_rx) = mpsc::channel(broker::ROUTABLE_CHANNEL_CAPACITY);
    let dispatcher = Dispatcher::new(Duration::from_secs(3600));
    tokio::spawn(dispatcher.run(routable_rx));

    let namespace_rules = Arc::new(namespace_rules);
    tokio::spawn(broker::acceptor::run(
        addr.port(),
        tls_acceptor,
        namespace_rules,
        routable_tx,
    ));

    // Give the listener a moment to bind before the first client connects.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (ca, addr)
}
