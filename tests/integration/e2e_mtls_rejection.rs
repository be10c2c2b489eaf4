#[path = "common/mod.rs"]
mod common;

use broker_core::NamespaceRules;
use broker_test_utils::{TestCa, TestClient};

#[tokio::test]
async fn client_certificate_not_signed_by_the_configured_ca_is_rejected() {
    let (_ca, addr) = common::spawn_broker(NamespaceRules::accept_all()).await;

    let (_foreign_roots, foreign_client_config) = TestCa::foreign_client_config();

    let result = TestClient::connect(addr, foreign_client_config).await;
    assert!(
        result.is_err(),
        "a client certificate from an unrelated CA must fail the TLS handshake"
    );
}

#[tokio::test]
async fn client_with_a_valid_certificate_completes_the_handshake() {
    let (ca, addr) = common::spawn_broker(NamespaceRules::accept_all()).await;
    let result = TestClient::connect(addr, ca.client_config()).await;
    assert!(result.is_ok());
}
