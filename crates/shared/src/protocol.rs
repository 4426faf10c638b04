use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{domain::MessageRef, error::FrameError};

/// Serializer version negotiated with the server on connect.
pub const PROTOCOL_VSN: &str = "2.0.0";

pub const PHOENIX_TOPIC: &str = "phoenix";
pub const PHX_JOIN: &str = "phx_join";
pub const PHX_REPLY: &str = "phx_reply";
pub const PHX_CLOSE: &str = "phx_close";
pub const PHX_ERROR: &str = "phx_error";
pub const HEARTBEAT: &str = "heartbeat";

pub const SET_NICK: &str = "set_nick";
pub const VOTING_ACTION: &str = "voting_action";

pub const JOINED: &str = "joined";
pub const NEW_VOTE: &str = "new_vote";
pub const SESSION_STATE: &str = "session_state";
pub const SHOW_VOTES: &str = "showvotes";

type RawFrame = (Option<MessageRef>, Option<MessageRef>, String, String, Value);

/// One message on the socket, encoded as `[join_ref, ref, topic, event, payload]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawFrame", into = "RawFrame")]
pub struct Frame {
    pub join_ref: Option<MessageRef>,
    pub msg_ref: Option<MessageRef>,
    pub topic: String,
    pub event: String,
    pub payload: Value,
}

impl From<RawFrame> for Frame {
    fn from((join_ref, msg_ref, topic, event, payload): RawFrame) -> Self {
        Self {
            join_ref,
            msg_ref,
            topic,
            event,
            payload,
        }
    }
}

impl From<Frame> for RawFrame {
    fn from(frame: Frame) -> Self {
        (
            frame.join_ref,
            frame.msg_ref,
            frame.topic,
            frame.event,
            frame.payload,
        )
    }
}

impl Frame {
    pub fn new(topic: impl Into<String>, event: impl Into<String>, payload: Value) -> Self {
        Self {
            join_ref: None,
            msg_ref: None,
            topic: topic.into(),
            event: event.into(),
            payload,
        }
    }

    pub fn with_refs(mut self, join_ref: Option<MessageRef>, msg_ref: Option<MessageRef>) -> Self {
        self.join_ref = join_ref;
        self.msg_ref = msg_ref;
        self
    }

    pub fn heartbeat(msg_ref: MessageRef) -> Self {
        Self::new(PHOENIX_TOPIC, HEARTBEAT, json!({})).with_refs(None, Some(msg_ref))
    }

    pub fn decode(text: &str) -> Result<Self, FrameError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn encode(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn is_reply(&self) -> bool {
        self.event == PHX_REPLY
    }

    pub fn reply(&self) -> Result<ReplyPayload, FrameError> {
        if !self.is_reply() {
            return Err(FrameError::NotAReply {
                event: self.event.clone(),
            });
        }
        Ok(ReplyPayload::deserialize(&self.payload)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Ok,
    Error,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyPayload {
    pub status: ReplyStatus,
    #[serde(default)]
    pub response: Value,
}

impl ReplyPayload {
    pub fn ok(response: Value) -> Self {
        Self {
            status: ReplyStatus::Ok,
            response,
        }
    }

    pub fn error(response: Value) -> Self {
        Self {
            status: ReplyStatus::Error,
            response,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ReplyStatus::Ok
    }
}

/// Intents raised by the UI that leave the client as channel pushes.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundIntent {
    SetNick(String),
    VotingAction(Value),
}

impl OutboundIntent {
    pub fn event_name(&self) -> &'static str {
        match self {
            OutboundIntent::SetNick(_) => SET_NICK,
            OutboundIntent::VotingAction(_) => VOTING_ACTION,
        }
    }

    pub fn into_payload(self) -> Value {
        match self {
            OutboundIntent::SetNick(nick) => json!({ "nick": nick }),
            OutboundIntent::VotingAction(payload) => payload,
        }
    }
}

/// Application events the server broadcasts on a session topic.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Joined,
    NewVote(Value),
    SessionState(Value),
    ShowVotes(Value),
}

impl InboundEvent {
    /// Maps a wire event to its application event; `None` for anything else
    /// on the topic (control frames, unknown events).
    pub fn from_wire(event: &str, payload: Value) -> Option<Self> {
        match event {
            JOINED => Some(InboundEvent::Joined),
            NEW_VOTE => Some(InboundEvent::NewVote(payload)),
            SESSION_STATE => Some(InboundEvent::SessionState(payload)),
            SHOW_VOTES => Some(InboundEvent::ShowVotes(payload)),
            _ => None,
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            InboundEvent::Joined => JOINED,
            InboundEvent::NewVote(_) => NEW_VOTE,
            InboundEvent::SessionState(_) => SESSION_STATE,
            InboundEvent::ShowVotes(_) => SHOW_VOTES,
        }
    }
}
