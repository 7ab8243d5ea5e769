//! Live Store Updates over WebSocket
//!
//! Browsers connect to `/ws`, subscribe to topics and receive a
//! `store_update` message whenever a collection changes, local or external.
//!
//! Topics:
//! - `reports` - Report collection changes
//! - `alerts` - Alert collection changes
//! - `*` - Both collections
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:8080/api/v1/ws');
//! ws.onopen = () => ws.send(JSON.stringify({type: 'subscribe', topics: ['alerts']}));
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   if (msg.type === 'store_update') refetch(msg.collection);
//! };
//! ```

mod handler;
mod hub;
mod messages;

pub use handler::websocket_handler;
pub use hub::{ConnectionHub, HubConfig, HubError, WILDCARD_TOPIC};
pub use messages::{ClientMessage, ServerMessage, WsEvent};
