use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unable to join {topic}: {response}")]
    JoinFailed { topic: String, response: Value },
    #[error("no session identifier present in the presentation context")]
    MissingSessionContext,
    #[error("socket closed")]
    SocketClosed,
    #[error("invalid socket endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("ui port closed: {0}")]
    UiPortClosed(&'static str),
}
