//! Real-time group progress over WebSocket.
//!
//! The engine's event hooks feed a [`BroadcastRegistry`], which keeps one tokio
//! broadcast channel per group. Each WebSocket connection subscribes and
//! unsubscribes from groups dynamically; a forwarder task per subscription copies
//! broadcast messages into the connection's outbound queue.
//!
//! Client protocol (JSON text frames):
//! * `{"type": "subscribe", "group_id": 42}`
//! * `{"type": "unsubscribe"}` (optionally with a `group_id` to detach just one)
//! * `{"type": "ping"}`
//!
//! Server frames mirror the engine's event wire format, `{"type": ..., "data": ...}`.
//! On subscribe, the server first sends a `subscribed` frame carrying a full group
//! snapshot so clients never have to reconstruct state from deltas.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use actix_ws::{Message, Session};
use bulkbuy_engine::{
    db_types::GroupId,
    traits::GroupManagement,
    GroupSnapshot,
};
use futures::StreamExt;
use log::*;
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};

/// Buffered events per group channel. Slow consumers that fall further behind than
/// this lose the oldest events, not the connection.
const GROUP_CHANNEL_CAPACITY: usize = 64;
/// Outbound frames buffered per connection.
const CONNECTION_QUEUE_CAPACITY: usize = 32;

/// One broadcast channel per group with at least one subscriber. Senders for groups
/// nobody watches are dropped lazily on the next publish.
#[derive(Clone, Default)]
pub struct BroadcastRegistry {
    channels: Arc<Mutex<HashMap<GroupId, broadcast::Sender<String>>>>,
}

impl BroadcastRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fan a serialized event out to everyone watching `group_id`. A group without
    /// watchers is a no-op.
    pub fn publish(&self, group_id: GroupId, message: String) {
        let mut channels = lock_poisoned_ok(&self.channels);
        if let Some(tx) = channels.get(&group_id) {
            if tx.send(message).is_err() {
                // last receiver is gone, drop the channel
                channels.remove(&group_id);
            }
        }
    }

    pub fn subscribe(&self, group_id: GroupId) -> broadcast::Receiver<String> {
        let mut channels = lock_poisoned_ok(&self.channels);
        channels.entry(group_id).or_insert_with(|| broadcast::channel(GROUP_CHANNEL_CAPACITY).0).subscribe()
    }

    #[cfg(test)]
    pub fn channel_count(&self) -> usize {
        lock_poisoned_ok(&self.channels).len()
    }
}

fn lock_poisoned_ok<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientCommand {
    Subscribe {
        group_id: Option<i64>,
    },
    /// A bare unsubscribe detaches from every group; a `group_id` detaches one.
    Unsubscribe {
        group_id: Option<i64>,
    },
    Ping,
}

fn greeting_frame(buyer_id: &str) -> String {
    serde_json::json!({
        "type": "connection_established",
        "data": { "authenticated": true, "user_id": buyer_id }
    })
    .to_string()
}

fn error_frame(message: &str) -> String {
    serde_json::json!({ "type": "error", "data": { "message": message } }).to_string()
}

/// Drives one WebSocket connection until the client disconnects.
///
/// `buyer_id` has already been authenticated from the access token. `db` is only
/// used to serve snapshots on subscribe, so the read-side trait is all we need.
pub async fn serve_connection<B: GroupManagement>(
    buyer_id: String,
    mut session: Session,
    mut msg_stream: actix_ws::MessageStream,
    registry: BroadcastRegistry,
    db: B,
) {
    debug!("🔌️ WebSocket connection established for buyer {buyer_id}");
    let (queue_tx, mut queue_rx) = mpsc::channel::<String>(CONNECTION_QUEUE_CAPACITY);
    let mut forwarders: HashMap<GroupId, tokio::task::JoinHandle<()>> = HashMap::new();

    if send_frame(&mut session, greeting_frame(&buyer_id)).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            // events fanned in from the subscription forwarders
            queued = queue_rx.recv() => {
                // the connection holds a sender, so recv never returns None here
                let Some(frame) = queued else { break };
                if send_frame(&mut session, frame).await.is_err() {
                    break;
                }
            },
            incoming = msg_stream.next() => {
                let Some(Ok(msg)) = incoming else { break };
                match msg {
                    Message::Text(text) => {
                        match serde_json::from_str::<ClientCommand>(&text) {
                            Ok(ClientCommand::Subscribe { group_id: None }) => {
                                if send_frame(&mut session, error_frame("subscribe requires a group_id")).await.is_err() {
                                    break;
                                }
                            },
                            Ok(ClientCommand::Subscribe { group_id: Some(group_id) }) => {
                                let group_id = GroupId(group_id);
                                if let Err(e) = subscribe(group_id, &registry, &db, &queue_tx, &mut forwarders).await {
                                    if send_frame(&mut session, e).await.is_err() {
                                        break;
                                    }
                                }
                            },
                            Ok(ClientCommand::Unsubscribe { group_id: Some(group_id) }) => {
                                if let Some(handle) = forwarders.remove(&GroupId(group_id)) {
                                    handle.abort();
                                }
                            },
                            Ok(ClientCommand::Unsubscribe { group_id: None }) => {
                                for (_, handle) in forwarders.drain() {
                                    handle.abort();
                                }
                            },
                            Ok(ClientCommand::Ping) => {
                                if send_frame(&mut session, r#"{"type":"pong"}"#.to_string()).await.is_err() {
                                    break;
                                }
                            },
                            Err(e) => {
                                debug!("🔌️ Dropping unparseable frame from {buyer_id}: {e}");
                                if send_frame(&mut session, error_frame("unrecognized command")).await.is_err() {
                                    break;
                                }
                            },
                        }
                    },
                    Message::Ping(payload) => {
                        if session.pong(&payload).await.is_err() {
                            break;
                        }
                    },
                    Message::Close(_) => break,
                    _ => {},
                }
            },
        }
    }

    for handle in forwarders.into_values() {
        handle.abort();
    }
    let _ = session.close(None).await;
    debug!("🔌️ WebSocket connection closed for buyer {buyer_id}");
}

/// Attach a forwarder for `group_id` to this connection. Returns the error frame to
/// send if the group does not exist. Subscribing twice is a no-op.
async fn subscribe<B: GroupManagement>(
    group_id: GroupId,
    registry: &BroadcastRegistry,
    db: &B,
    queue_tx: &mpsc::Sender<String>,
    forwarders: &mut HashMap<GroupId, tokio::task::JoinHandle<()>>,
) -> Result<(), String> {
    let group = match db.fetch_group(group_id).await {
        Ok(Some(g)) => g,
        Ok(None) => {
            return Err(serde_json::json!({
                "type": "error",
                "data": { "message": format!("group {group_id} does not exist"), "code": "GROUP_NOT_FOUND" }
            })
            .to_string());
        },
        Err(e) => {
            error!("🔌️ Could not serve snapshot for {group_id}: {e}");
            return Err(serde_json::json!({
                "type": "error",
                "data": { "message": "could not load group", "code": "BACKEND_ERROR" }
            })
            .to_string());
        },
    };
    if forwarders.contains_key(&group_id) {
        return Ok(());
    }
    let snapshot = GroupSnapshot::from(&group);
    let frame = serde_json::json!({ "type": "subscribed", "data": snapshot }).to_string();
    // best effort, the connection loop notices a full or closed queue on its own
    let _ = queue_tx.send(frame).await;

    let mut rx = registry.subscribe(group_id);
    let queue = queue_tx.clone();
    let handle = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if queue.send(event).await.is_err() {
                        break;
                    }
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("🔌️ Subscriber lagged and skipped {n} events for {group_id}");
                },
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
    forwarders.insert(group_id, handle);
    Ok(())
}

async fn send_frame(session: &mut Session, frame: String) -> Result<(), actix_ws::Closed> {
    session.text(frame).await
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn client_frames_use_the_type_tag() {
        let cmd = serde_json::from_str::<ClientCommand>(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(cmd, ClientCommand::Ping));

        let cmd = serde_json::from_str::<ClientCommand>(r#"{"type":"subscribe","group_id":42}"#).unwrap();
        assert!(matches!(cmd, ClientCommand::Subscribe { group_id: Some(42) }));

        // Unsubscribe carries no group_id in the wire protocol.
        let cmd = serde_json::from_str::<ClientCommand>(r#"{"type":"unsubscribe"}"#).unwrap();
        assert!(matches!(cmd, ClientCommand::Unsubscribe { group_id: None }));

        // A subscribe without a group_id still parses; the handler answers with an error frame.
        let cmd = serde_json::from_str::<ClientCommand>(r#"{"type":"subscribe"}"#).unwrap();
        assert!(matches!(cmd, ClientCommand::Subscribe { group_id: None }));
    }

    #[test]
    fn greeting_carries_the_auth_state() {
        let frame: serde_json::Value = serde_json::from_str(&greeting_frame("alice")).unwrap();
        assert_eq!(frame["type"], "connection_established");
        assert_eq!(frame["data"]["authenticated"], true);
        assert_eq!(frame["data"]["user_id"], "alice");
    }

    #[tokio::test]
    async fn publish_without_watchers_is_a_noop() {
        let registry = BroadcastRegistry::new();
        registry.publish(GroupId(1), "hello".into());
        assert_eq!(registry.channel_count(), 0);
    }

    #[tokio::test]
    async fn watchers_receive_published_events() {
        let registry = BroadcastRegistry::new();
        let mut rx_a = registry.subscribe(GroupId(7));
        let mut rx_b = registry.subscribe(GroupId(7));
        registry.publish(GroupId(7), "progress".into());
        assert_eq!(rx_a.recv().await.unwrap(), "progress");
        assert_eq!(rx_b.recv().await.unwrap(), "progress");
    }

    #[tokio::test]
    async fn channels_are_per_group() {
        let registry = BroadcastRegistry::new();
        let mut rx = registry.subscribe(GroupId(1));
        registry.subscribe(GroupId(2));
        registry.publish(GroupId(2), "other".into());
        registry.publish(GroupId(1), "mine".into());
        assert_eq!(rx.recv().await.unwrap(), "mine");
    }

    #[tokio::test]
    async fn dead_channels_are_reaped_on_publish() {
        let registry = BroadcastRegistry::new();
        drop(registry.subscribe(GroupId(5)));
        assert_eq!(registry.channel_count(), 1);
        registry.publish(GroupId(5), "into the void".into());
        assert_eq!(registry.channel_count(), 0);
    }
}
