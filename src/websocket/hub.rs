//! WebSocket connection hub
//!
//! Tracks connections and their topic subscriptions and fans store events
//! out to them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::messages::{ServerMessage, WsEvent};
use crate::store::{Collection, StoreEvent};

/// Topic matching every store update
pub const WILDCARD_TOPIC: &str = "*";

pub type ConnectionId = String;

/// Hub limits
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub max_connections: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: 1000,
        }
    }
}

struct ConnectionHandle {
    sender: mpsc::UnboundedSender<ServerMessage>,
    topics: HashSet<String>,
}

#[derive(Default)]
struct HubState {
    connections: HashMap<ConnectionId, ConnectionHandle>,
    /// Topic → subscribed connections
    subscriptions: HashMap<String, HashSet<ConnectionId>>,
}

/// Manages WebSocket connections and subscriptions
pub struct ConnectionHub {
    state: RwLock<HubState>,
    config: HubConfig,
}

impl ConnectionHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            state: RwLock::new(HubState::default()),
            config,
        }
    }

    /// Register a connection, enforcing the connection limit
    pub async fn register(
        &self,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<ConnectionId, HubError> {
        let mut state = self.state.write().await;
        if state.connections.len() >= self.config.max_connections {
            return Err(HubError::TooManyConnections(self.config.max_connections));
        }

        let id = Uuid::new_v4().to_string();
        state.connections.insert(
            id.clone(),
            ConnectionHandle {
                sender,
                topics: HashSet::new(),
            },
        );

        tracing::info!(connection_id = %id, "WebSocket connected");
        Ok(id)
    }

    /// Drop a connection and all its subscriptions
    pub async fn unregister(&self, id: &str) {
        let mut state = self.state.write().await;
        if let Some(handle) = state.connections.remove(id) {
            for topic in handle.topics {
                remove_subscriber(&mut state.subscriptions, &topic, id);
            }
        }

        tracing::info!(connection_id = %id, "WebSocket disconnected");
    }

    /// Subscribe to topics. Unknown topics are skipped.
    pub async fn subscribe(&self, id: &str, topics: Vec<String>) -> Result<Vec<String>, HubError> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let handle = state
            .connections
            .get_mut(id)
            .ok_or(HubError::ConnectionNotFound)?;

        let mut subscribed = Vec::new();
        for topic in topics {
            if !is_valid_topic(&topic) {
                tracing::warn!(topic = %topic, "Invalid topic ignored");
                continue;
            }

            handle.topics.insert(topic.clone());
            state
                .subscriptions
                .entry(topic.clone())
                .or_default()
                .insert(id.to_string());
            subscribed.push(topic);
        }

        tracing::debug!(connection_id = %id, topics = ?subscribed, "Subscribed to topics");
        Ok(subscribed)
    }

    pub async fn unsubscribe(&self, id: &str, topics: Vec<String>) -> Result<Vec<String>, HubError> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let handle = state
            .connections
            .get_mut(id)
            .ok_or(HubError::ConnectionNotFound)?;

        let mut unsubscribed = Vec::new();
        for topic in topics {
            if handle.topics.remove(&topic) {
                remove_subscriber(&mut state.subscriptions, &topic, id);
                unsubscribed.push(topic);
            }
        }

        tracing::debug!(connection_id = %id, topics = ?unsubscribed, "Unsubscribed from topics");
        Ok(unsubscribed)
    }

    /// Deliver an event to subscribers of its topic and of `*`.
    ///
    /// Returns the number of connections it was queued for.
    pub async fn broadcast(&self, event: &WsEvent) -> usize {
        let state = self.state.read().await;

        let mut targets: HashSet<&ConnectionId> = HashSet::new();
        for topic in [event.topic.as_str(), WILDCARD_TOPIC] {
            if let Some(ids) = state.subscriptions.get(topic) {
                targets.extend(ids.iter());
            }
        }

        let sent = targets
            .into_iter()
            .filter_map(|id| state.connections.get(id))
            .filter(|handle| handle.sender.send(event.message.clone()).is_ok())
            .count();

        if sent > 0 {
            tracing::trace!(topic = %event.topic, subscribers = sent, "Broadcast event");
        }
        sent
    }

    /// Forward store events to WebSocket subscribers until the channel closes
    pub fn forward_store_events(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<StoreEvent>,
    ) -> JoinHandle<()> {
        let hub = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        hub.broadcast(&WsEvent::store_update(event)).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // Tell everyone both collections may have changed
                        tracing::warn!(skipped, "WebSocket forwarding lagged");
                        for collection in Collection::all() {
                            hub.broadcast(&WsEvent::store_update(StoreEvent::external(*collection)))
                                .await;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!("Store event forwarding stopped");
        })
    }

    /// Send a message to one connection
    pub async fn send_to(&self, id: &str, message: ServerMessage) -> Result<(), HubError> {
        let state = self.state.read().await;
        let handle = state
            .connections
            .get(id)
            .ok_or(HubError::ConnectionNotFound)?;

        handle.sender.send(message).map_err(|_| HubError::SendFailed)
    }

    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }

    pub async fn subscription_count(&self, topic: &str) -> usize {
        self.state
            .read()
            .await
            .subscriptions
            .get(topic)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}

fn remove_subscriber(subs: &mut HashMap<String, HashSet<ConnectionId>>, topic: &str, id: &str) {
    if let Some(ids) = subs.get_mut(topic) {
        ids.remove(id);
        if ids.is_empty() {
            subs.remove(topic);
        }
    }
}

/// `reports`, `alerts` or `*`
fn is_valid_topic(topic: &str) -> bool {
    topic == WILDCARD_TOPIC || Collection::all().iter().any(|c| c.as_str() == topic)
}

#[derive(Debug, Error)]
pub enum HubError {
    #[error("Too many connections (limit: {0})")]
    TooManyConnections(usize),

    #[error("Connection not found")]
    ConnectionNotFound,

    #[error("Failed to send message")]
    SendFailed,
}
