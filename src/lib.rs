//! Workspace root crate.
//!
//! The broker itself lives in `crates/broker-core` (the FSM, dispatcher, and
//! fan-out), `crates/broker-protocol` (the wire codec), and `services/broker`
//! (the binary, CLI, and TLS setup). This crate exists only to host the
//! end-to-end integration tests under `tests/integration`, which exercise a
//! real `services_broker` instance over loopback mTLS the way a deployed
//! broker would be driven.
