//! broker-core: the dispatcher, session FSM, and namespace policy that
//! together implement the broker's routing semantics. Transport (TCP/TLS
//! listener, CLI, process wiring) lives one level up, in the `broker`
//! service binary; this crate only assumes it is handed something that
//! implements `AsyncRead + AsyncWrite`.

mod dispatcher;
mod error;
mod ids;
mod namespace;
mod session;

pub use dispatcher::{Dispatcher, RoutableEvent};
pub use error::SessionError;
pub use ids::{ConnectionId, ConnectionIdGenerator};
pub use namespace::{NamespaceConfigError, NamespaceRules};
pub use session::{run_session, QueuedFrame, SessionHandle, OUTBOUND_QUEUE_CAPACITY};
