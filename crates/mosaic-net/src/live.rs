//! Per-conversation live channel with reconnect.
//!
//! The socket runs in a dedicated tokio task. Callers talk to it through a
//! [`LiveHandle`] (commands in) and a notification receiver (events out),
//! so the session above never touches the socket directly.
//!
//! The first connect happens before the task is spawned and its failure is
//! returned to the caller. Later drops are retried with exponential backoff;
//! once the schedule is exhausted the task reports
//! [`LiveNotification::Failed`] and exits. An access token that expired
//! while the socket was up is refreshed before the next attempt; only a
//! refused refresh ends the channel early.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use url::Url;

use mosaic_shared::constants::LIVE_CHANNEL_BUFFER;
use mosaic_shared::models::Message;
use mosaic_shared::protocol::LiveEnvelope;
use mosaic_shared::types::ConversationId;
use mosaic_shared::{AuthContext, MosaicError, TransportError};

use crate::backoff::{Backoff, BackoffPolicy};
use crate::endpoints;
use crate::rest::{fresh_token, join_base, TokenRefresher};

/// Text frames from one live connection. An `Err` or the end of the stream
/// means the connection is gone.
pub type FrameStream = BoxStream<'static, Result<String, TransportError>>;

/// Opens the transport for one conversation.
#[async_trait]
pub trait LiveConnector: Send + Sync {
    async fn connect(
        &self,
        conversation: ConversationId,
        token: &str,
    ) -> Result<FrameStream, TransportError>;
}

// ---------------------------------------------------------------------------
// WebSocket connector
// ---------------------------------------------------------------------------

pub struct WsConnector {
    base: String,
}

impl WsConnector {
    pub fn new(live_url: &str) -> Result<Self, MosaicError> {
        // Validate eagerly so a typo shows up at startup, not on first chat.
        join_base(live_url, "")?;
        Ok(Self {
            base: live_url.to_string(),
        })
    }

    fn url_for(&self, conversation: ConversationId) -> Result<Url, TransportError> {
        join_base(&self.base, &endpoints::live_chat(conversation))
            .map_err(|e| TransportError::Connect(e.to_string()))
    }
}

#[async_trait]
impl LiveConnector for WsConnector {
    async fn connect(
        &self,
        conversation: ConversationId,
        token: &str,
    ) -> Result<FrameStream, TransportError> {
        let url = self.url_for(conversation)?;

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (ws, _response) = connect_async(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        debug!(conversation = %conversation, url = %url, "WebSocket open");

        let frames = ws.filter_map(|item| async move {
            match item {
                Ok(WsMessage::Text(text)) => Some(Ok(text)),
                Ok(WsMessage::Binary(data)) => match String::from_utf8(data) {
                    Ok(text) => Some(Ok(text)),
                    Err(_) => Some(Err(TransportError::Protocol(
                        "non UTF-8 binary frame".into(),
                    ))),
                },
                Ok(WsMessage::Close(frame)) => Some(Err(TransportError::Dropped(format!(
                    "closed by server: {frame:?}"
                )))),
                Ok(_) => None,
                Err(e) => Some(Err(TransportError::Dropped(e.to_string()))),
            }
        });

        Ok(frames.boxed())
    }
}

// ---------------------------------------------------------------------------
// Command / notification types
// ---------------------------------------------------------------------------

/// Commands sent *into* the live task.
#[derive(Debug)]
pub enum LiveCommand {
    Shutdown,
}

/// Notifications sent *from* the live task.
#[derive(Debug)]
pub enum LiveNotification {
    /// A message pushed by the server.
    Message(Message),
    /// The connection dropped; the next attempt starts after `delay`.
    Reconnecting {
        attempt: u32,
        delay: Duration,
        reason: String,
    },
    /// A new connection is up. Pushes sent while down were not delivered.
    Reconnected { attempt: u32 },
    /// Shut down on request.
    Closed,
    /// Gave up. Terminal.
    Failed(MosaicError),
}

#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub backoff: BackoffPolicy,
    pub buffer: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            buffer: LIVE_CHANNEL_BUFFER,
        }
    }
}

/// Sending half of a running live channel.
#[derive(Debug, Clone)]
pub struct LiveHandle {
    conversation: ConversationId,
    cmd_tx: mpsc::Sender<LiveCommand>,
}

impl LiveHandle {
    pub fn conversation(&self) -> ConversationId {
        self.conversation
    }

    /// Ask the task to stop. Safe to call any number of times, from sync code.
    pub fn shutdown(&self) {
        if self.cmd_tx.try_send(LiveCommand::Shutdown).is_err() {
            debug!(conversation = %self.conversation, "Live channel already stopping");
        }
    }

    pub fn is_running(&self) -> bool {
        !self.cmd_tx.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// Connect the live channel for `conversation` and spawn its task.
pub async fn spawn_live_channel(
    connector: Arc<dyn LiveConnector>,
    auth: AuthContext,
    refresher: Arc<dyn TokenRefresher>,
    conversation: ConversationId,
    config: LiveConfig,
) -> Result<(LiveHandle, mpsc::Receiver<LiveNotification>), MosaicError> {
    let token = fresh_token(&auth, refresher.as_ref()).await?;
    let stream = connector.connect(conversation, &token).await?;

    info!(conversation = %conversation, "Live channel connected");

    let (cmd_tx, cmd_rx) = mpsc::channel::<LiveCommand>(8);
    let (notif_tx, notif_rx) = mpsc::channel::<LiveNotification>(config.buffer.max(1));

    let task = LiveTask {
        connector,
        auth,
        refresher,
        conversation,
        backoff: Backoff::new(config.backoff),
        cmd_rx,
        notif_tx,
    };
    tokio::spawn(task.run(stream));

    Ok((
        LiveHandle {
            conversation,
            cmd_tx,
        },
        notif_rx,
    ))
}

struct LiveTask {
    connector: Arc<dyn LiveConnector>,
    auth: AuthContext,
    refresher: Arc<dyn TokenRefresher>,
    conversation: ConversationId,
    backoff: Backoff,
    cmd_rx: mpsc::Receiver<LiveCommand>,
    notif_tx: mpsc::Sender<LiveNotification>,
}

enum Event {
    Shutdown,
    Frame(Option<Result<String, TransportError>>),
}

enum Reconnect {
    Connected(FrameStream, u32),
    Shutdown,
    GaveUp(MosaicError),
}

impl LiveTask {
    async fn run(mut self, mut stream: FrameStream) {
        loop {
            let event = tokio::select! {
                _ = self.cmd_rx.recv() => Event::Shutdown,
                frame = stream.next() => Event::Frame(frame),
            };

            let reason = match event {
                Event::Shutdown => {
                    let _ = self.notif_tx.send(LiveNotification::Closed).await;
                    break;
                }
                Event::Frame(Some(Ok(text))) => {
                    match LiveEnvelope::from_json(&text) {
                        Ok(envelope) => {
                            let notif = LiveNotification::Message(envelope.message);
                            if self.notif_tx.send(notif).await.is_err() {
                                debug!(conversation = %self.conversation, "Listener gone");
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(
                                conversation = %self.conversation,
                                error = %e,
                                len = text.len(),
                                "Skipping malformed live frame"
                            );
                        }
                    }
                    continue;
                }
                Event::Frame(Some(Err(e))) => e.to_string(),
                Event::Frame(None) => "stream ended".to_string(),
            };

            warn!(conversation = %self.conversation, reason = %reason, "Live channel dropped");

            match self.reconnect(reason).await {
                Reconnect::Connected(next, attempt) => {
                    stream = next;
                    self.backoff.reset();
                    info!(conversation = %self.conversation, attempt, "Live channel reconnected");
                    if self
                        .notif_tx
                        .send(LiveNotification::Reconnected { attempt })
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Reconnect::Shutdown => {
                    let _ = self.notif_tx.send(LiveNotification::Closed).await;
                    break;
                }
                Reconnect::GaveUp(err) => {
                    warn!(conversation = %self.conversation, error = %err, "Live channel gave up");
                    let _ = self.notif_tx.send(LiveNotification::Failed(err)).await;
                    break;
                }
            }
        }

        debug!(conversation = %self.conversation, "Live channel task terminated");
    }

    async fn reconnect(&mut self, mut last_error: String) -> Reconnect {
        loop {
            let Some(delay) = self.backoff.next_delay() else {
                return Reconnect::GaveUp(
                    TransportError::Dropped(format!(
                        "gave up after {} attempts: {last_error}",
                        self.backoff.attempt()
                    ))
                    .into(),
                );
            };
            let attempt = self.backoff.attempt();

            let notif = LiveNotification::Reconnecting {
                attempt,
                delay,
                reason: last_error.clone(),
            };
            if self.notif_tx.send(notif).await.is_err() {
                return Reconnect::Shutdown;
            }

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.cmd_rx.recv() => return Reconnect::Shutdown,
            }

            let token = match fresh_token(&self.auth, self.refresher.as_ref()).await {
                Ok(token) => token,
                Err(e) if e.is_auth() => return Reconnect::GaveUp(e),
                Err(e) => {
                    debug!(conversation = %self.conversation, attempt, error = %e, "Token refresh failed");
                    last_error = e.to_string();
                    continue;
                }
            };

            match self.connector.connect(self.conversation, &token).await {
                Ok(stream) => return Reconnect::Connected(stream, attempt),
                Err(e) => {
                    debug!(conversation = %self.conversation, attempt, error = %e, "Reconnect attempt failed");
                    last_error = e.to_string();
                }
            }
        }
    }
}
