use shared::{domain::ConnectionState, protocol::ReplyPayload};
use tokio::sync::watch;
use tracing::debug;

/// Join lifecycle of one topic subscription.
///
/// `unjoined -> joining -> joined`, with an error ack falling back to
/// `unjoined`. Nothing leaves `joined`.
pub struct ChannelConnection {
    topic: String,
    state: watch::Sender<ConnectionState>,
}

impl ChannelConnection {
    pub fn new(topic: impl Into<String>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Unjoined);
        Self {
            topic: topic.into(),
            state,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn begin_join(&self) -> bool {
        self.transition(ConnectionState::Unjoined, ConnectionState::Joining)
    }

    pub fn acknowledge(&self, reply: &ReplyPayload) -> ConnectionState {
        let next = if reply.is_ok() {
            ConnectionState::Joined
        } else {
            ConnectionState::Unjoined
        };
        self.transition(ConnectionState::Joining, next);
        self.state()
    }

    /// The join reply never arrived.
    pub fn abandon_join(&self) {
        self.transition(ConnectionState::Joining, ConnectionState::Unjoined);
    }

    fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current != from {
                return false;
            }
            *current = to;
            true
        });
        if changed {
            debug!(topic = %self.topic, %from, %to, "session: connection state changed");
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn ok_ack_moves_joining_to_joined() {
        let connection = ChannelConnection::new("session:abc123");
        assert!(connection.begin_join());
        assert_eq!(connection.state(), ConnectionState::Joining);
        assert_eq!(
            connection.acknowledge(&ReplyPayload::ok(json!({}))),
            ConnectionState::Joined
        );
    }

    #[test]
    fn error_ack_returns_to_unjoined() {
        let connection = ChannelConnection::new("session:abc123");
        connection.begin_join();
        assert_eq!(
            connection.acknowledge(&ReplyPayload::error(json!({ "reason": "nope" }))),
            ConnectionState::Unjoined
        );
    }

    #[test]
    fn joined_is_terminal() {
        let connection = ChannelConnection::new("session:abc123");
        connection.begin_join();
        connection.acknowledge(&ReplyPayload::ok(json!({})));

        assert!(!connection.begin_join());
        connection.abandon_join();
        connection.acknowledge(&ReplyPayload::error(json!({})));
        assert_eq!(connection.state(), ConnectionState::Joined);
    }

    #[test]
    fn ack_without_pending_join_is_ignored() {
        let connection = ChannelConnection::new("session:abc123");
        assert_eq!(
            connection.acknowledge(&ReplyPayload::ok(json!({}))),
            ConnectionState::Unjoined
        );
    }

    #[test]
    fn watchers_see_transitions() {
        let connection = ChannelConnection::new("session:abc123");
        let watcher = connection.subscribe();
        connection.begin_join();
        assert_eq!(*watcher.borrow(), ConnectionState::Joining);
    }
}
