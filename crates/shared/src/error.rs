use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("expected phx_reply frame, got {event}")]
    NotAReply { event: String },
}
