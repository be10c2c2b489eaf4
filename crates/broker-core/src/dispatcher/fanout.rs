use std::collections::{HashMap, HashSet};

use tracing::debug;

use broker_protocol::{Frame, Message, MessageId};

use crate::session::{QueuedFrame, SessionHandle};

type SubscriberSet = HashSet<SessionHandle>;
type TopicTable = HashMap<String, SubscriberSet>;
type SubscriptionTable = HashMap<String, TopicTable>;

/// Ordered sub-topics of `topic`, shallowest first: `a/b/c` yields
/// `["a", "a/b", "a/b/c"]`. A bare segment (no `/`) yields itself only.
pub fn sub_topics(topic: &str) -> Vec<String> {
    topic
        .split('/')
        .scan(String::new(), |acc, segment| {
            if acc.is_empty() {
                *acc = segment.to_owned();
            } else {
                acc.push('/');
                acc.push_str(segment);
            }
            Some(acc.clone())
        })
        .collect()
}

/// Delivers one published message to every subscriber of every matching
/// sub-topic in `namespace`. Re-serialises once per sub-topic (the topic
/// field recorded in the delivered frame differs from the publisher's), and
/// reuses that one encoding across every recipient subscribed at that level.
pub fn publish(
    table: &SubscriptionTable,
    namespace: &str,
    topic: &str,
    payload: Vec<u8>,
    publisher: &SessionHandle,
    message_id: &MessageId,
) {
    let Some(topics) = table.get(namespace) else {
        return;
    };

    debug!(publisher = publisher.client_id(), namespace, topic, "fanning out publish");

    for sub_topic in sub_topics(topic) {
        let Some(subscribers) = topics.get(&sub_topic) else {
            continue;
        };
        if subscribers.is_empty() {
            continue;
        }

        let frame = Frame::new(
            message_id.clone(),
            Message::Publish {
                topic: sub_topic.clone(),
                payload: payload.clone(),
            },
        );
        let bytes = match broker_protocol::encode_frame(&frame) {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(%err, sub_topic, "failed to encode publish for fan-out, dropping");
                continue;
            }
        };

        for subscriber in subscribers {
            let _ = subscriber.try_enqueue(QueuedFrame::new(bytes.clone()));
        }
    }
}
