#[path = "common/mod.rs"]
mod common;

use std::time::Duration;

use broker_core::NamespaceRules;
use broker_protocol::{Message, MessageType, SubEntry};
use broker_test_utils::TestClient;

async fn connected(
    ca: &broker_test_utils::TestCa,
    addr: std::net::SocketAddr,
    client_id: &str,
    namespace: &str,
) -> TestClient {
    let mut client = TestClient::connect(addr, ca.client_config()).await.unwrap();
    client.start_and_expect_ack("start", client_id, namespace).await.unwrap();
    client
}

#[tokio::test]
async fn subscriber_receives_publish_at_every_matching_prefix() {
    let (ca, addr) = common::spawn_broker(NamespaceRules::accept_all()).await;

    let mut root_sub = connected(&ca, addr, "root-sub", "ns1").await;
    root_sub
        .send("sub1", Message::Subscribe { subs: vec![SubEntry::new("a")] })
        .await
        .unwrap();
    assert_eq!(root_sub.recv().await.unwrap().message_type(), MessageType::Ack);

    let mut leaf_sub = connected(&ca, addr, "leaf-sub", "ns1").await;
    leaf_sub
        .send(
            "sub1",
            Message::Subscribe {
                subs: vec![SubEntry::new("a/b/c")],
            },
        )
        .await
        .unwrap();
    assert_eq!(leaf_sub.recv().await.unwrap().message_type(), MessageType::Ack);

    let mut publisher = connected(&ca, addr, "publisher", "ns1").await;
    publisher
        .send(
            "pub1",
            Message::Publish {
                topic: "a/b/c".into(),
                payload: b"hello".to_vec(),
            },
        )
        .await
        .unwrap();
    assert_eq!(publisher.recv().await.unwrap().message_type(), MessageType::Ack);

    let delivered = root_sub.recv().await.unwrap();
    match delivered.body {
        Message::Publish { topic, payload } => {
            assert_eq!(topic, "a");
            assert_eq!(payload, b"hello");
        }
        other => panic!("unexpected message {other:?}"),
    }

    let delivered = leaf_sub.recv().await.unwrap();
    match delivered.body {
        Message::Publish { topic, .. } => assert_eq!(topic, "a/b/c"),
        other => panic!("unexpected message {other:?}"),
    }
}

#[tokio::test]
async fn publisher_subscribed_to_its_own_topic_receives_its_own_message() {
    let (ca, addr) = common::spawn_broker(NamespaceRules::accept_all()).await;

    let mut client = connected(&ca, addr, "self-sub", "ns1").await;
    client
        .send("sub1", Message::Subscribe { subs: vec![SubEntry::new("a")] })
        .await
        .unwrap();
    assert_eq!(client.recv().await.unwrap().message_type(), MessageType::Ack);

    client
        .send(
            "pub1",
            Message::Publish {
                topic: "a".into(),
                payload: b"loopback".to_vec(),
            },
        )
        .await
        .unwrap();

    assert_eq!(client.recv().await.unwrap().message_type(), MessageType::Ack);
    let delivered = client.recv().await.unwrap();
    assert_eq!(delivered.message_type(), MessageType::Publish);
}

#[tokio::test]
async fn unsubscribe_stops_further_delivery() {
    let (ca, addr) = common::spawn_broker(NamespaceRules::accept_all()).await;

    let mut sub = connected(&ca, addr, "sub", "ns1").await;
    sub.send("sub1", Message::Subscribe { subs: vec![SubEntry::new("t")] })
        .await
        .unwrap();
    assert_eq!(sub.recv().await.unwrap().message_type(), MessageType::Ack);

    sub.send(
        "unsub1",
        Message::Unsubscribe {
            subs: vec![SubEntry::new("t")],
        },
    )
    .await
    .unwrap();
    assert_eq!(sub.recv().await.unwrap().message_type(), MessageType::Ack);

    let mut publisher = connected(&ca, addr, "publisher", "ns1").await;
    publisher
        .send(
            "pub1",
            Message::Publish {
                topic: "t".into(),
                payload: b"after unsubscribe".to_vec(),
            },
        )
        .await
        .unwrap();
    assert_eq!(publisher.recv().await.unwrap().message_type(), MessageType::Ack);

    let nothing = sub.try_recv(Duration::from_millis(200)).await;
    assert!(nothing.is_none());
}
