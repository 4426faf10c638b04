//! Boundary between the bridge and the UI component.
//!
//! Inbound ports are calls the bridge makes into the UI; outbound ports are
//! streams of user intents the bridge drains.

use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::Value;
use shared::domain::SessionId;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::SessionError;

pub trait SessionUiPort: Send + Sync {
    /// Starts the UI component for a session, before any channel traffic.
    fn init(&self, session_id: &SessionId);
    fn confirm_join(&self, payload: Value);
    fn new_vote(&self, payload: Value);
    fn fresh_state(&self, payload: Value);
    fn show_votes(&self, payload: Value);
}

pub struct UiIntents {
    pub change_nick: BoxStream<'static, String>,
    pub voting_action: BoxStream<'static, Value>,
}

impl UiIntents {
    pub fn new(
        change_nick: BoxStream<'static, String>,
        voting_action: BoxStream<'static, Value>,
    ) -> Self {
        Self {
            change_nick,
            voting_action,
        }
    }

    /// Intent streams fed by an [`UiIntentSender`].
    pub fn channel() -> (UiIntentSender, Self) {
        let (nick_tx, nick_rx) = mpsc::unbounded_channel();
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let intents = Self::new(
            UnboundedReceiverStream::new(nick_rx).boxed(),
            UnboundedReceiverStream::new(action_rx).boxed(),
        );
        (
            UiIntentSender {
                change_nick: nick_tx,
                voting_action: action_tx,
            },
            intents,
        )
    }

    pub fn idle() -> Self {
        Self::new(
            futures::stream::empty().boxed(),
            futures::stream::empty().boxed(),
        )
    }
}

#[derive(Clone)]
pub struct UiIntentSender {
    change_nick: mpsc::UnboundedSender<String>,
    voting_action: mpsc::UnboundedSender<Value>,
}

impl UiIntentSender {
    pub fn change_nick(&self, nick: impl Into<String>) -> Result<(), SessionError> {
        self.change_nick
            .send(nick.into())
            .map_err(|_| SessionError::UiPortClosed("changeNick"))
    }

    pub fn voting_action(&self, payload: Value) -> Result<(), SessionError> {
        self.voting_action
            .send(payload)
            .map_err(|_| SessionError::UiPortClosed("votingAction"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiPortEvent {
    Init(Value),
    ConfirmJoin(Value),
    NewVote(Value),
    FreshState(Value),
    ShowVotes(Value),
}

impl UiPortEvent {
    pub fn port_name(&self) -> &'static str {
        match self {
            UiPortEvent::Init(_) => "init",
            UiPortEvent::ConfirmJoin(_) => "confirmJoin",
            UiPortEvent::NewVote(_) => "newVote",
            UiPortEvent::FreshState(_) => "freshState",
            UiPortEvent::ShowVotes(_) => "showVotes",
        }
    }

    pub fn payload(&self) -> &Value {
        match self {
            UiPortEvent::Init(payload)
            | UiPortEvent::ConfirmJoin(payload)
            | UiPortEvent::NewVote(payload)
            | UiPortEvent::FreshState(payload)
            | UiPortEvent::ShowVotes(payload) => payload,
        }
    }
}

/// UI port that queues every inbound call for a consumer on another task.
pub struct ChannelUiPort {
    tx: mpsc::UnboundedSender<UiPortEvent>,
}

impl ChannelUiPort {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UiPortEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn emit(&self, event: UiPortEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("ui: port receiver dropped, discarding event");
        }
    }
}

impl SessionUiPort for ChannelUiPort {
    fn init(&self, session_id: &SessionId) {
        self.emit(UiPortEvent::Init(Value::String(session_id.to_string())));
    }

    fn confirm_join(&self, payload: Value) {
        self.emit(UiPortEvent::ConfirmJoin(payload));
    }

    fn new_vote(&self, payload: Value) {
        self.emit(UiPortEvent::NewVote(payload));
    }

    fn fresh_state(&self, payload: Value) {
        self.emit(UiPortEvent::FreshState(payload));
    }

    fn show_votes(&self, payload: Value) {
        self.emit(UiPortEvent::ShowVotes(payload));
    }
}
