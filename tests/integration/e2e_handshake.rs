#[path = "common/mod.rs"]
mod common;

use std::time::Duration;

use broker_core::NamespaceRules;
use broker_protocol::{Message, MessageType};
use broker_test_utils::TestClient;

#[tokio::test]
async fn start_with_matching_protocol_version_is_accepted() {
    let (ca, addr) = common::spawn_broker(NamespaceRules::accept_all()).await;
    let mut client = TestClient::connect(addr, ca.client_config()).await.unwrap();

    client.start_and_expect_ack("m1", "client-a", "ns1").await.unwrap();
    client.send("m2", Message::Ping).await.unwrap();

    let ack = client.recv().await.unwrap();
    assert_eq!(ack.message_type(), MessageType::Ack);
    assert_eq!(ack.message_id.to_string(), "m2");
}

#[tokio::test]
async fn start_with_wrong_protocol_version_is_rejected_and_disconnected() {
    let (ca, addr) = common::spawn_broker(NamespaceRules::accept_all()).await;
    let mut client = TestClient::connect(addr, ca.client_config()).await.unwrap();

    client
        .send(
            "m1",
            Message::Start {
                client_id: "client-a".into(),
                namespace: "ns1".into(),
                protocol_version: 999,
            },
        )
        .await
        .unwrap();

    let reply = client.recv().await.unwrap();
    assert_eq!(reply.message_type(), MessageType::Error);

    let after = client.try_recv(Duration::from_millis(200)).await;
    assert!(after.is_none(), "connection should be closed after rejection");
}

#[tokio::test]
async fn non_start_as_first_frame_is_rejected() {
    let (ca, addr) = common::spawn_broker(NamespaceRules::accept_all()).await;
    let mut client = TestClient::connect(addr, ca.client_config()).await.unwrap();

    client.send("m1", Message::Ping).await.unwrap();

    let reply = client.recv().await.unwrap();
    assert_eq!(reply.message_type(), MessageType::Error);
}
