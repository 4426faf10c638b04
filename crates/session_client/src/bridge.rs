//! Bridge between one session channel and the UI ports.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use serde_json::json;
use shared::{
    domain::{ConnectionState, SessionId},
    protocol::{InboundEvent, OutboundIntent},
};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    connection::ChannelConnection,
    context::SessionContext,
    error::SessionError,
    ports::{SessionUiPort, UiIntents},
    transport::{Channel, ChannelMessage, Socket, SocketConnector},
};

/// Owns the subscription to `session:<id>` and forwards traffic between the
/// channel and the UI until dropped.
pub struct SessionChannelBridge {
    session_id: SessionId,
    connection: Arc<ChannelConnection>,
    channel: Arc<dyn Channel>,
    socket: Option<Arc<dyn Socket>>,
    inbound_task: Option<JoinHandle<()>>,
    background_tasks: Vec<JoinHandle<()>>,
}

impl SessionChannelBridge {
    /// Starts the bridge only when the presentation context carries a session
    /// identifier. Without one nothing is connected or joined.
    pub async fn launch(
        context: &dyn SessionContext,
        connector: &dyn SocketConnector,
        ui: Arc<dyn SessionUiPort>,
        intents: UiIntents,
    ) -> Result<Option<Self>> {
        let Some(session_id) = context.session_identifier() else {
            debug!("session: {}", SessionError::MissingSessionContext);
            return Ok(None);
        };

        let socket = connector
            .connect()
            .await
            .context("failed to connect session socket")?;
        let mut bridge = Self::initialize(session_id, socket.as_ref(), ui, intents).await?;
        bridge.socket = Some(socket);
        Ok(Some(bridge))
    }

    pub async fn initialize(
        session_id: SessionId,
        socket: &dyn Socket,
        ui: Arc<dyn SessionUiPort>,
        intents: UiIntents,
    ) -> Result<Self> {
        ui.init(&session_id);

        let topic = session_id.topic();
        let channel = socket
            .channel(&topic, json!({}))
            .await
            .with_context(|| format!("failed to open channel {topic}"))?;
        let connection = Arc::new(ChannelConnection::new(topic.clone()));

        // Subscribe before joining so events pushed right after the join are seen.
        let inbound = channel.subscribe();
        let inbound_task = tokio::spawn(forward_inbound(topic.clone(), inbound, ui));

        connection.begin_join();
        info!(topic = %topic, "session: joining channel");
        let join_task = tokio::spawn(observe_join(Arc::clone(&channel), Arc::clone(&connection)));
        let outbound_task = tokio::spawn(forward_outbound(Arc::clone(&channel), intents));

        Ok(Self {
            session_id,
            connection,
            channel,
            socket: None,
            inbound_task: Some(inbound_task),
            background_tasks: vec![join_task, outbound_task],
        })
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn topic(&self) -> &str {
        self.channel.topic()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    /// Resolves once the channel stops delivering inbound messages.
    pub async fn closed(&mut self) {
        if let Some(task) = self.inbound_task.as_mut() {
            let _ = task.await;
            self.inbound_task = None;
        }
    }
}

impl Drop for SessionChannelBridge {
    fn drop(&mut self) {
        if let Some(task) = self.inbound_task.take() {
            task.abort();
        }
        for task in self.background_tasks.drain(..) {
            task.abort();
        }
    }
}

/// Routes one application event to its UI port.
pub fn dispatch(ui: &dyn SessionUiPort, event: InboundEvent) {
    match event {
        InboundEvent::Joined => ui.confirm_join(json!({})),
        InboundEvent::NewVote(payload) => ui.new_vote(payload),
        InboundEvent::SessionState(payload) => ui.fresh_state(payload),
        InboundEvent::ShowVotes(payload) => ui.show_votes(payload),
    }
}

async fn observe_join(channel: Arc<dyn Channel>, connection: Arc<ChannelConnection>) {
    let topic = channel.topic().to_string();
    match channel.join().await {
        Ok(reply) if reply.is_ok() => {
            connection.acknowledge(&reply);
            info!(topic = %topic, response = %reply.response, "session: joined successfully");
        }
        Ok(reply) => {
            connection.acknowledge(&reply);
            let err = SessionError::JoinFailed {
                topic: topic.clone(),
                response: reply.response,
            };
            warn!(topic = %topic, status = ?reply.status, "session: {err}");
        }
        Err(err) => {
            connection.abandon_join();
            warn!(topic = %topic, "session: join request failed: {err:#}");
        }
    }
}

async fn forward_inbound(
    topic: String,
    mut inbound: mpsc::UnboundedReceiver<ChannelMessage>,
    ui: Arc<dyn SessionUiPort>,
) {
    while let Some(message) = inbound.recv().await {
        match InboundEvent::from_wire(&message.event, message.payload) {
            Some(event) => {
                debug!(topic = %topic, event = event.event_name(), "session: forwarding event to ui");
                dispatch(ui.as_ref(), event);
            }
            None => {
                debug!(topic = %topic, event = %message.event, "session: ignoring unhandled event");
            }
        }
    }
    info!(topic = %topic, "session: inbound stream closed");
}

async fn forward_outbound(channel: Arc<dyn Channel>, intents: UiIntents) {
    let UiIntents {
        change_nick,
        voting_action,
    } = intents;
    let mut intents = futures::stream::select(
        change_nick.map(OutboundIntent::SetNick),
        voting_action.map(OutboundIntent::VotingAction),
    );

    while let Some(intent) = intents.next().await {
        let event = intent.event_name();
        if let Err(err) = channel.push(event, intent.into_payload()).await {
            warn!(topic = %channel.topic(), event, "session: push failed: {err:#}");
        }
    }
    debug!(topic = %channel.topic(), "session: ui intent streams ended");
}

#[cfg(test)]
#[path = "tests/bridge_tests.rs"]
mod tests;
