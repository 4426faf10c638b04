//! Transport capability the bridge is built against.
//!
//! A connector opens a socket, a socket hands out channels by topic, and a
//! channel joins, pushes and fans inbound messages out to subscribers.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use shared::protocol::ReplyPayload;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessage {
    pub event: String,
    pub payload: Value,
}

impl ChannelMessage {
    pub fn new(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }
}

#[async_trait]
pub trait SocketConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn Socket>>;
}

#[async_trait]
pub trait Socket: Send + Sync {
    async fn channel(&self, topic: &str, params: Value) -> Result<Arc<dyn Channel>>;
}

#[async_trait]
pub trait Channel: Send + Sync {
    fn topic(&self) -> &str;

    /// Requests membership of the topic and resolves with the server's
    /// acknowledgement. `Err` means the reply never arrived.
    async fn join(&self) -> Result<ReplyPayload>;

    async fn push(&self, event: &str, payload: Value) -> Result<()>;

    /// Every message delivered to the topic from now on, in arrival order.
    /// The stream ends when the socket goes away.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<ChannelMessage>;
}
