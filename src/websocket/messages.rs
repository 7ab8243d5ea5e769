//! WebSocket message types

use serde::{Deserialize, Serialize};

use crate::store::{ChangeOrigin, Collection, StoreEvent};

/// Client → server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start receiving updates for topics (`reports`, `alerts`, `*`)
    Subscribe { topics: Vec<String> },
    Unsubscribe { topics: Vec<String> },
    Ping,
}

/// Server → client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A collection changed; clients re-fetch it
    StoreUpdate {
        collection: Collection,
        origin: ChangeOrigin,
    },
    Subscribed { topics: Vec<String> },
    Unsubscribed { topics: Vec<String> },
    Pong,
    Error { message: String },
    Connected { connection_id: String },
}

/// Message routed through the hub by topic
#[derive(Debug, Clone)]
pub struct WsEvent {
    pub topic: String,
    pub message: ServerMessage,
}

impl WsEvent {
    /// Store change, routed to the collection's topic
    pub fn store_update(event: StoreEvent) -> Self {
        Self {
            topic: event.collection.as_str().to_string(),
            message: ServerMessage::StoreUpdate {
                collection: event.collection,
                origin: event.origin,
            },
        }
    }
}
