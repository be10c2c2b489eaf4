//! Process wiring for the broker binary: CLI parsing, TLS setup, the accept
//! loop, and the glue that starts the Dispatcher. Kept as a library too so
//! integration tests can start a broker in-process bound to `127.0.0.1:0`-style
//! ports without spawning a subprocess.

pub mod acceptor;
pub mod cli;
pub mod tls;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use broker_core::{Dispatcher, NamespaceConfigError, NamespaceRules};

pub use cli::Cli;
pub use tls::TlsSetupError;

/// Capacity of the session→Dispatcher routable channel. A capacity of 1
/// approximates the unbuffered rendezvous the routing model calls for:
/// the reader blocks until the Dispatcher has taken the previous message.
pub const ROUTABLE_CHANNEL_CAPACITY: usize = 1;

pub fn build_namespace_rules(cli: &Cli) -> Result<NamespaceRules, NamespaceConfigError> {
    NamespaceRules::configure(cli.namespaces_allowed.clone(), cli.namespace_prefixes.clone())
}

/// Starts the Dispatcher task and the TCP/TLS accept loop for `cli`. Returns
/// once the accept loop exits (only on a fatal I/O error after bind
/// succeeded; a failed bind is reported to the caller directly).
pub async fn run(cli: Cli) -> std::io::Result<()> {
    let namespace_rules = Arc::new(
        build_namespace_rules(&cli).unwrap_or_else(|err| {
            eprintln!("invalid namespace configuration: {err}");
            std::process::exit(1);
        }),
    );

    let tls_acceptor = tls::load_acceptor(&cli.ca_cert, &cli.server_cert, &cli.server_key)
        .unwrap_or_else(|err| {
            eprintln!("failed to set up TLS: {err}");
            std::process::exit(1);
        });

    let (routable_tx, routable_rx) = mpsc::channel(ROUTABLE_CHANNEL_CAPACITY);
    let dispatcher = Dispatcher::new(cli.status_interval);
    tokio::spawn(dispatcher.run(routable_rx));

    info!(port = cli.port, "starting accept loop");
    acceptor::run(cli.port, tls_acceptor, namespace_rules, routable_tx).await
}
