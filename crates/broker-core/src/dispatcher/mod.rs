//! The single-owner routing task. One [`Dispatcher`] instance holds the
//! entire subscription table; every other task reaches it only by sending a
//! [`RoutableEvent`] or a [`Disconnected`] notification — never by touching
//! the table directly.

mod fanout;

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::info;

use broker_protocol::{MessageId, MessageType};

use crate::ids::ConnectionId;
use crate::session::{QueuedFrame, SessionHandle};

pub use fanout::sub_topics;

/// A message forwarded by a session's reader task for the Dispatcher to act
/// on. `Ping` is never routable: sessions answer it locally.
#[derive(Debug)]
pub enum RoutableEvent {
    Subscribe {
        session: SessionHandle,
        namespace: String,
        topic: String,
    },
    Unsubscribe {
        session: SessionHandle,
        namespace: String,
        topic: String,
    },
    Publish {
        namespace: String,
        topic: String,
        payload: Vec<u8>,
        publisher: SessionHandle,
        message_id: MessageId,
    },
    Disconnect {
        session: SessionHandle,
        namespace: String,
    },
}

type SubscriberSet = HashSet<SessionHandle>;
type TopicTable = HashMap<String, SubscriberSet>;
type SubscriptionTable = HashMap<String, TopicTable>;

#[derive(Debug, Default)]
struct Counters {
    by_type: HashMap<MessageType, u64>,
}

impl Counters {
    fn record(&mut self, ty: MessageType) {
        *self.by_type.entry(ty).or_insert(0) += 1;
    }

    fn snapshot_and_reset(&mut self) -> HashMap<MessageType, u64> {
        std::mem::take(&mut self.by_type)
    }
}

/// Owns the global `namespace -> topic -> subscriber-set` table and the
/// reverse index needed to clean it up on disconnect. Runs as a single
/// cooperative task; no other task ever reads or writes the table.
pub struct Dispatcher {
    table: SubscriptionTable,
    reverse: HashMap<ConnectionId, HashSet<(String, String)>>,
    counters: Counters,
    status_interval: Duration,
}

impl Dispatcher {
    pub fn new(status_interval: Duration) -> Self {
        Dispatcher {
            table: HashMap::new(),
            reverse: HashMap::new(),
            counters: Counters::default(),
            status_interval,
        }
    }

    /// Runs until `routable_rx` is closed (i.e. every session and the
    /// acceptor have been dropped). Selects fairly over incoming routable
    /// events and the periodic status tick.
    pub async fn run(mut self, mut routable_rx: mpsc::Receiver<RoutableEvent>) {
        let mut ticker = tokio::time::interval(self.status_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = routable_rx.recv() => {
                    match event {
                        Some(event) => self.handle(event),
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    self.emit_status();
                }
            }
        }
    }

    fn handle(&mut self, event: RoutableEvent) {
        match event {
            RoutableEvent::Subscribe {
                session,
                namespace,
                topic,
            } => {
                self.counters.record(MessageType::Subscribe);
                self.subscribe(session, namespace, topic);
            }
            RoutableEvent::Unsubscribe {
                session,
                namespace,
                topic,
            } => {
                self.counters.record(MessageType::Unsubscribe);
                self.unsubscribe(&session, &namespace, &topic);
            }
            RoutableEvent::Publish {
                namespace,
                topic,
                payload,
                publisher,
                message_id,
            } => {
                self.counters.record(MessageType::Publish);
                fanout::publish(&self.table, &namespace, &topic, payload, &publisher, &message_id);
            }
            RoutableEvent::Disconnect { session, namespace } => {
                self.disconnect(&session, &namespace);
            }
        }
    }

    fn subscribe(&mut self, session: SessionHandle, namespace: String, topic: String) {
        self.table
            .entry(namespace.clone())
            .or_default()
            .entry(topic.clone())
            .or_default()
            .insert(session.clone());
        self.reverse
            .entry(session.id())
            .or_default()
            .insert((namespace, topic));
    }

    fn unsubscribe(&mut self, session: &SessionHandle, namespace: &str, topic: &str) {
        if let Some(topics) = self.table.get_mut(namespace) {
            if let Some(subscribers) = topics.get_mut(topic) {
                subscribers.remove(session);
                if subscribers.is_empty() {
                    topics.remove(topic);
                }
            }
            if topics.is_empty() {
                self.table.remove(namespace);
            }
        }
        if let Some(subs) = self.reverse.get_mut(&session.id()) {
            subs.remove(&(namespace.to_owned(), topic.to_owned()));
        }
    }

    fn disconnect(&mut self, session: &SessionHandle, _namespace: &str) {
        let Some(subs) = self.reverse.remove(&session.id()) else {
            return;
        };
        for (namespace, topic) in subs {
            if let Some(topics) = self.table.get_mut(&namespace) {
                if let Some(subscribers) = topics.get_mut(&topic) {
                    subscribers.remove(session);
                    if subscribers.is_empty() {
                        topics.remove(&topic);
                    }
                }
                if topics.is_empty() {
                    self.table.remove(&namespace);
                }
            }
        }
    }

    fn emit_status(&mut self) {
        let counts = self.counters.snapshot_and_reset();
        let namespace_count = self.table.len();
        tokio::spawn(async move {
            info!(
                namespace_count,
                start = counts.get(&MessageType::Start).copied().unwrap_or(0),
                publish = counts.get(&MessageType::Publish).copied().unwrap_or(0),
                subscribe = counts.get(&MessageType::Subscribe).copied().unwrap_or(0),
                unsubscribe = counts.get(&MessageType::Unsubscribe).copied().unwrap_or(0),
                ping = counts.get(&MessageType::Ping).copied().unwrap_or(0),
                ack = counts.get(&MessageType::Ack).copied().unwrap_or(0),
                error = counts.get(&MessageType::Error).copied().unwrap_or(0),
                "dispatcher status"
            );
        });
    }
}
