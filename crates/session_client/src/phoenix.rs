//! Phoenix channels client over `tokio-tungstenite`, V2 JSON serializer.
//!
//! One socket multiplexes every channel. Replies are matched to requests by
//! ref; every other frame is fanned out to the subscribers of its topic,
//! unless it carries a join ref from an earlier membership.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde_json::Value;
use shared::{
    domain::MessageRef,
    protocol::{
        Frame, ReplyPayload, PHOENIX_TOPIC, PHX_CLOSE, PHX_ERROR, PHX_JOIN, PROTOCOL_VSN,
    },
};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    error::SessionError,
    transport::{Channel, ChannelMessage, Socket, SocketConnector},
};

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone)]
pub struct PhoenixConnector {
    endpoint: String,
    params: Vec<(String, String)>,
    heartbeat_interval: Duration,
}

impl PhoenixConnector {
    /// `endpoint` is the socket mount point, e.g. `ws://localhost:4000/socket`.
    /// `http(s)` endpoints are rewritten to `ws(s)`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: Vec::new(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn with_heartbeat_interval(mut self, heartbeat_interval: Duration) -> Self {
        self.heartbeat_interval = heartbeat_interval;
        self
    }

    pub fn websocket_url(&self) -> Result<Url, SessionError> {
        let invalid = |reason: String| SessionError::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            reason,
        };

        let endpoint = self.endpoint.trim().trim_end_matches('/');
        let endpoint = if let Some(rest) = endpoint.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = endpoint.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            endpoint.to_string()
        };

        let mut url = Url::parse(&endpoint).map_err(|err| invalid(err.to_string()))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(invalid(format!("unsupported scheme {}", url.scheme())));
        }
        if !url.path().ends_with("/websocket") {
            let path = format!("{}/websocket", url.path().trim_end_matches('/'));
            url.set_path(&path);
        }
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in &self.params {
                query.append_pair(key, value);
            }
            query.append_pair("vsn", PROTOCOL_VSN);
        }
        Ok(url)
    }
}

#[async_trait]
impl SocketConnector for PhoenixConnector {
    async fn connect(&self) -> Result<Arc<dyn Socket>> {
        let url = self.websocket_url()?;
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .with_context(|| format!("failed to connect websocket: {url}"))?;
        info!(url = %url, "phoenix: socket connected");
        Ok(Arc::new(PhoenixSocket::start(
            ws_stream,
            self.heartbeat_interval,
        )))
    }
}

#[derive(Default)]
struct TopicMembers {
    join_ref: Option<MessageRef>,
    subscribers: Vec<mpsc::UnboundedSender<ChannelMessage>>,
}

struct SocketShared {
    outbound: mpsc::UnboundedSender<Frame>,
    next_ref: AtomicU64,
    closed: AtomicBool,
    pending: Mutex<HashMap<MessageRef, oneshot::Sender<ReplyPayload>>>,
    pending_heartbeat: Mutex<Option<MessageRef>>,
    topics: Mutex<HashMap<String, TopicMembers>>,
}

impl SocketShared {
    fn new(outbound: mpsc::UnboundedSender<Frame>) -> Self {
        Self {
            outbound,
            next_ref: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            pending: Mutex::new(HashMap::new()),
            pending_heartbeat: Mutex::new(None),
            topics: Mutex::new(HashMap::new()),
        }
    }

    fn make_ref(&self) -> MessageRef {
        MessageRef((self.next_ref.fetch_add(1, Ordering::SeqCst) + 1).to_string())
    }

    fn send(&self, frame: Frame) -> Result<(), SessionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::SocketClosed);
        }
        self.outbound
            .send(frame)
            .map_err(|_| SessionError::SocketClosed)
    }

    fn await_reply(&self, msg_ref: MessageRef) -> oneshot::Receiver<ReplyPayload> {
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(msg_ref, tx);
        rx
    }

    fn route(&self, frame: Frame) {
        if frame.is_reply() {
            self.resolve_reply(frame);
            return;
        }

        if frame.event == PHX_ERROR || frame.event == PHX_CLOSE {
            warn!(topic = %frame.topic, event = %frame.event, payload = %frame.payload, "phoenix: channel reported {}", frame.event);
        }

        let mut topics = lock(&self.topics);
        let Some(members) = topics.get_mut(&frame.topic) else {
            debug!(topic = %frame.topic, event = %frame.event, "phoenix: frame for unknown topic");
            return;
        };
        if let Some(join_ref) = &frame.join_ref {
            if members.join_ref.as_ref() != Some(join_ref) {
                debug!(topic = %frame.topic, event = %frame.event, join_ref = %join_ref, "phoenix: dropping frame for stale membership");
                return;
            }
        }

        let message = ChannelMessage::new(frame.event, frame.payload);
        members
            .subscribers
            .retain(|subscriber| subscriber.send(message.clone()).is_ok());
    }

    fn resolve_reply(&self, frame: Frame) {
        let Some(msg_ref) = frame.msg_ref.clone() else {
            debug!(topic = %frame.topic, "phoenix: reply without ref");
            return;
        };

        if frame.topic == PHOENIX_TOPIC {
            let mut pending = lock(&self.pending_heartbeat);
            if pending.as_ref() == Some(&msg_ref) {
                *pending = None;
            }
            return;
        }

        let Some(waiter) = lock(&self.pending).remove(&msg_ref) else {
            debug!(topic = %frame.topic, msg_ref = %msg_ref, "phoenix: reply without waiter");
            return;
        };
        match frame.reply() {
            Ok(reply) => {
                let _ = waiter.send(reply);
            }
            Err(err) => {
                warn!(topic = %frame.topic, msg_ref = %msg_ref, "phoenix: unreadable reply: {err}");
            }
        }
    }

    fn shut_down(&self) {
        self.closed.store(true, Ordering::SeqCst);
        lock(&self.pending).clear();
        lock(&self.topics).clear();
    }
}

pub struct PhoenixSocket {
    shared: Arc<SocketShared>,
    tasks: Vec<JoinHandle<()>>,
}

impl PhoenixSocket {
    pub fn start<S>(ws_stream: S, heartbeat_interval: Duration) -> Self
    where
        S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Send + 'static,
    {
        let (writer, reader) = ws_stream.split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(SocketShared::new(outbound));

        let tasks = vec![
            tokio::spawn(write_frames(writer, outbound_rx)),
            tokio::spawn(read_frames(reader, Arc::clone(&shared))),
            tokio::spawn(send_heartbeats(Arc::clone(&shared), heartbeat_interval)),
        ];
        Self { shared, tasks }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

impl Drop for PhoenixSocket {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.shared.shut_down();
    }
}

#[async_trait]
impl Socket for PhoenixSocket {
    async fn channel(&self, topic: &str, params: Value) -> Result<Arc<dyn Channel>> {
        if self.is_closed() {
            return Err(SessionError::SocketClosed.into());
        }
        lock(&self.shared.topics).insert(topic.to_string(), TopicMembers::default());
        Ok(Arc::new(PhoenixChannel {
            topic: topic.to_string(),
            params,
            shared: Arc::clone(&self.shared),
            state: Mutex::new(PushState::default()),
        }))
    }
}

#[derive(Default)]
struct PushState {
    join_ref: Option<MessageRef>,
    joined: bool,
    rejection: Option<Value>,
    buffer: Vec<(String, Value)>,
}

pub struct PhoenixChannel {
    topic: String,
    params: Value,
    shared: Arc<SocketShared>,
    state: Mutex<PushState>,
}

impl PhoenixChannel {
    fn push_frame(&self, join_ref: Option<MessageRef>, event: &str, payload: Value) -> Frame {
        Frame::new(&self.topic, event, payload).with_refs(join_ref, Some(self.shared.make_ref()))
    }
}

#[async_trait]
impl Channel for PhoenixChannel {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn join(&self) -> Result<ReplyPayload> {
        let join_ref = self.shared.make_ref();
        let reply = self.shared.await_reply(join_ref.clone());
        lock(&self.state).join_ref = Some(join_ref.clone());
        if let Some(members) = lock(&self.shared.topics).get_mut(&self.topic) {
            members.join_ref = Some(join_ref.clone());
        }
        self.shared.send(
            Frame::new(&self.topic, PHX_JOIN, self.params.clone())
                .with_refs(Some(join_ref.clone()), Some(join_ref)),
        )?;

        let reply = reply.await.map_err(|_| SessionError::SocketClosed)?;
        let mut guard = lock(&self.state);
        let state = &mut *guard;
        if reply.is_ok() {
            state.joined = true;
            if !state.buffer.is_empty() {
                debug!(topic = %self.topic, buffered = state.buffer.len(), "phoenix: flushing buffered pushes");
            }
            for (event, payload) in state.buffer.drain(..) {
                self.shared
                    .send(self.push_frame(state.join_ref.clone(), &event, payload))?;
            }
        } else {
            if !state.buffer.is_empty() {
                warn!(topic = %self.topic, dropped = state.buffer.len(), "phoenix: join rejected, discarding buffered pushes");
            }
            state.buffer.clear();
            state.rejection = Some(reply.response.clone());
        }
        Ok(reply)
    }

    async fn push(&self, event: &str, payload: Value) -> Result<()> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(SessionError::SocketClosed.into());
        }
        let mut state = lock(&self.state);
        if let Some(response) = &state.rejection {
            return Err(SessionError::JoinFailed {
                topic: self.topic.clone(),
                response: response.clone(),
            }
            .into());
        }
        if !state.joined {
            debug!(topic = %self.topic, event, "phoenix: buffering push until joined");
            state.buffer.push((event.to_string(), payload));
            return Ok(());
        }
        let frame = self.push_frame(state.join_ref.clone(), event, payload);
        self.shared.send(frame)?;
        Ok(())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<ChannelMessage> {
        let (subscriber, inbound) = mpsc::unbounded_channel();
        match lock(&self.shared.topics).get_mut(&self.topic) {
            Some(members) => members.subscribers.push(subscriber),
            // Socket already gone: the stream is closed from the start.
            None => drop(subscriber),
        }
        inbound
    }
}

async fn write_frames<W>(mut writer: W, mut outbound: mpsc::UnboundedReceiver<Frame>)
where
    W: Sink<Message, Error = WsError> + Unpin,
{
    while let Some(frame) = outbound.recv().await {
        let text = match frame.encode() {
            Ok(text) => text,
            Err(err) => {
                warn!(topic = %frame.topic, event = %frame.event, "phoenix: failed to encode frame: {err}");
                continue;
            }
        };
        if let Err(err) = writer.send(Message::Text(text)).await {
            warn!("phoenix: websocket send failed: {err}");
            break;
        }
    }
    let _ = writer.close().await;
}

async fn read_frames<R>(mut reader: R, shared: Arc<SocketShared>)
where
    R: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(message) = reader.next().await {
        match message {
            Ok(Message::Text(text)) => match Frame::decode(&text) {
                Ok(frame) => shared.route(frame),
                Err(err) => warn!("phoenix: dropping undecodable frame: {err}"),
            },
            Ok(Message::Close(close)) => {
                info!(?close, "phoenix: socket closed by server");
                break;
            }
            Ok(_) => {}
            Err(err) => {
                warn!("phoenix: websocket receive failed: {err}");
                break;
            }
        }
    }
    shared.shut_down();
}

async fn send_heartbeats(shared: Arc<SocketShared>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let msg_ref = shared.make_ref();
        let overdue = lock(&shared.pending_heartbeat).replace(msg_ref.clone());
        if let Some(overdue) = overdue {
            warn!(msg_ref = %overdue, "phoenix: heartbeat reply overdue");
        }
        if shared.send(Frame::heartbeat(msg_ref)).is_err() {
            debug!("phoenix: socket closed, stopping heartbeat");
            break;
        }
    }
}

#[cfg(test)]
#[path = "tests/phoenix_tests.rs"]
mod tests;
