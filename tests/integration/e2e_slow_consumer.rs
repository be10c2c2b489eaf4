#[path = "common/mod.rs"]
mod common;

use std::time::Duration;

use broker_core::NamespaceRules;
use broker_protocol::{Message, MessageType, SubEntry};
use broker_test_utils::TestClient;

/// A slow subscriber (one that never reads its socket) must be force
/// disconnected once its 20-deep outbound queue overflows, without stalling
/// delivery to any other, healthy subscriber of the same topic.
#[tokio::test]
async fn overflowing_a_subscribers_queue_disconnects_only_that_subscriber() {
    let (ca, addr) = common::spawn_broker(NamespaceRules::accept_all()).await;

    let mut slow_sub = TestClient::connect(addr, ca.client_config()).await.unwrap();
    slow_sub.start_and_expect_ack("m1", "slow", "ns1").await.unwrap();
    slow_sub
        .send("m2", Message::Subscribe { subs: vec![SubEntry::new("t")] })
        .await
        .unwrap();
    assert_eq!(slow_sub.recv().await.unwrap().message_type(), MessageType::Ack);

    let mut healthy_sub = TestClient::connect(addr, ca.client_config()).await.unwrap();
    healthy_sub.start_and_expect_ack("m1", "healthy", "ns1").await.unwrap();
    healthy_sub
        .send("m2", Message::Subscribe { subs: vec![SubEntry::new("t")] })
        .await
        .unwrap();
    assert_eq!(healthy_sub.recv().await.unwrap().message_type(), MessageType::Ack);

    let mut publisher = TestClient::connect(addr, ca.client_config()).await.unwrap();
    publisher.start_and_expect_ack("m1", "publisher", "ns1").await.unwrap();

    // Flood well past the 20-deep outbound queue without the slow subscriber
    // ever draining its socket.
    for i in 0..40 {
        publisher
            .send(
                format!("pub{i}"),
                Message::Publish {
                    topic: "t".into(),
                    payload: vec![0u8; 64],
                },
            )
            .await
            .unwrap();
        // Drain the publisher's own Ack stream so its queue doesn't also overflow.
        assert_eq!(publisher.recv().await.unwrap().message_type(), MessageType::Ack);
    }

    // The slow subscriber is force-disconnected: its socket eventually closes
    // without ever having been read from.
    let slow_result = slow_sub.try_recv(Duration::from_secs(2)).await;
    assert!(
        slow_result.is_none(),
        "slow subscriber's connection should be closed, not delivering more frames"
    );

    // The healthy subscriber, meanwhile, received every delivery.
    for _ in 0..40 {
        let delivered = healthy_sub.recv().await.unwrap();
        assert_eq!(delivered.message_type(), MessageType::Publish);
    }
}
