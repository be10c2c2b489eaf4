#[path = "common/mod.rs"]
mod common;

use std::time::Duration;

use broker_core::NamespaceRules;
use broker_protocol::{Message, MessageType, SubEntry};
use broker_test_utils::TestClient;

#[tokio::test]
async fn publish_in_one_namespace_never_reaches_a_subscriber_in_another() {
    let (ca, addr) = common::spawn_broker(NamespaceRules::accept_all()).await;

    let mut sub = TestClient::connect(addr, ca.client_config()).await.unwrap();
    sub.start_and_expect_ack("m1", "sub", "tenant-a").await.unwrap();
    sub.send("m2", Message::Subscribe { subs: vec![SubEntry::new("topic")] })
        .await
        .unwrap();
    assert_eq!(sub.recv().await.unwrap().message_type(), MessageType::Ack);

    let mut publisher = TestClient::connect(addr, ca.client_config()).await.unwrap();
    publisher.start_and_expect_ack("m1", "publisher", "tenant-b").await.unwrap();
    publisher
        .send(
            "m2",
            Message::Publish {
                topic: "topic".into(),
                payload: b"cross tenant".to_vec(),
            },
        )
        .await
        .unwrap();
    assert_eq!(publisher.recv().await.unwrap().message_type(), MessageType::Ack);

    let nothing = sub.try_recv(Duration::from_millis(200)).await;
    assert!(nothing.is_none(), "subscriber in tenant-a must not see tenant-b's publish");
}

#[tokio::test]
async fn allow_set_rejects_unlisted_namespace() {
    let rules = NamespaceRules::with_allow_set(["allowed".to_owned()]);
    let (ca, addr) = common::spawn_broker(rules).await;

    let mut client = TestClient::connect(addr, ca.client_config()).await.unwrap();
    client.start("m1", "client", "not-allowed").await.unwrap();

    let reply = client.recv().await.unwrap();
    assert_eq!(reply.message_type(), MessageType::Error);
}

#[tokio::test]
async fn allow_set_admits_a_listed_namespace() {
    let rules = NamespaceRules::with_allow_set(["allowed".to_owned()]);
    let (ca, addr) = common::spawn_broker(rules).await;

    let mut client = TestClient::connect(addr, ca.client_config()).await.unwrap();
    client.start_and_expect_ack("m1", "client", "allowed").await.unwrap();
    client.send("m2", Message::Ping).await.unwrap();

    let reply = client.recv().await.unwrap();
    assert_eq!(reply.message_type(), MessageType::Ack);
}

#[tokio::test]
async fn prefix_policy_admits_any_matching_prefix() {
    let rules = NamespaceRules::with_prefixes(vec!["team-".to_owned()]).unwrap();
    let (ca, addr) = common::spawn_broker(rules).await;

    let mut client = TestClient::connect(addr, ca.client_config()).await.unwrap();
    client.start_and_expect_ack("m1", "client", "team-rocket").await.unwrap();
    client.send("m2", Message::Ping).await.unwrap();

    let reply = client.recv().await.unwrap();
    assert_eq!(reply.message_type(), MessageType::Ack);
}
