//! Real-time chat session for one conversation.
//!
//! A session merges three sources into one ordered, duplicate-free message
//! list: the history fetched at open, messages pushed on the live channel
//! and the server echo of our own sends. A background pump task consumes
//! live-channel notifications; after a reconnect it fetches everything past
//! the resume cursor so nothing pushed while the socket was down is lost.
//! Pushes queue behind that fetch, so the cursor never skips past a gap.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use mosaic_net::{
    fresh_token, spawn_live_channel, Backoff, BackoffPolicy, ChatApi, LiveConfig, LiveConnector,
    LiveHandle, LiveNotification, TokenRefresher,
};
use mosaic_shared::constants::MAX_MESSAGE_LEN;
use mosaic_shared::models::Message;
use mosaic_shared::types::{ConversationId, MessageId, UserId};
use mosaic_shared::{AuthContext, MosaicError, RemoteCallError};

use crate::view::ViewScope;

/// Lifecycle of a session. `Closed` and `Errored` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Reconnecting { attempt: u32 },
    Closed,
    Errored(String),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Errored(_))
    }
}

/// Everything a session needs from the outside world.
#[derive(Clone)]
pub struct SessionDeps {
    pub api: Arc<dyn ChatApi>,
    pub connector: Arc<dyn LiveConnector>,
    pub auth: AuthContext,
    pub refresher: Arc<dyn TokenRefresher>,
    pub live: LiveConfig,
}

type Handler = Arc<dyn Fn(&Message) + Send + Sync>;

struct Shared {
    state: SessionState,
    messages: Vec<Message>,
    seen: HashSet<MessageId>,
    cursor: Option<MessageId>,
    handlers: Vec<Handler>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: SessionState::Connecting,
            messages: Vec::new(),
            seen: HashSet::new(),
            cursor: None,
            handlers: Vec::new(),
        }
    }

    /// Insert `msg` at its `(timestamp, id)` position. `false` if the id was
    /// already present.
    fn merge(&mut self, msg: Message) -> bool {
        if !self.seen.insert(msg.id) {
            return false;
        }

        self.cursor = Some(self.cursor.map_or(msg.id, |c| c.max(msg.id)));

        let key = (msg.timestamp, msg.id);
        let pos = self
            .messages
            .partition_point(|m| (m.timestamp, m.id) <= key);
        self.messages.insert(pos, msg);
        true
    }

    fn set_state(&mut self, state: SessionState) {
        if !self.state.is_terminal() {
            self.state = state;
        }
    }
}

pub struct ChatSession {
    conversation: ConversationId,
    api: Arc<dyn ChatApi>,
    shared: Arc<Mutex<Shared>>,
    scope: ViewScope,
    live: Mutex<Option<LiveHandle>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSession")
            .field("conversation", &self.conversation)
            .field("state", &self.state())
            .finish()
    }
}

impl ChatSession {
    /// Fetch history and connect the live channel for `conversation`, then
    /// fetch once more past the newest id so nothing posted in between is
    /// missed.
    ///
    /// If `scope` is unmounted while this is pending, the channel is torn
    /// down again and `RemoteCallError::Cancelled` is returned.
    pub async fn open(
        deps: &SessionDeps,
        conversation: ConversationId,
        scope: ViewScope,
    ) -> Result<Self, MosaicError> {
        fresh_token(&deps.auth, deps.refresher.as_ref()).await?;

        let history = scope.settle(deps.api.message_history(conversation).await)?;

        let mut shared = Shared::new();
        let total = history.len();
        let kept = history.into_iter().filter(|m| shared.merge(m.clone())).count();
        if kept < total {
            debug!(conversation = %conversation, dropped = total - kept, "Duplicate ids in history");
        }

        let (handle, notif_rx) = spawn_live_channel(
            deps.connector.clone(),
            deps.auth.clone(),
            deps.refresher.clone(),
            conversation,
            deps.live.clone(),
        )
        .await?;

        // Anything posted between the history fetch and the socket coming up
        // was neither in the history nor pushed.
        let caught_up = fetch_after(deps.api.as_ref(), conversation, shared.cursor).await;
        let missed = match scope.settle(caught_up) {
            Ok(missed) => missed,
            Err(e) => {
                handle.shutdown();
                return Err(e);
            }
        };
        let late = missed.into_iter().filter(|m| shared.merge(m.clone())).count();
        if late > 0 {
            debug!(conversation = %conversation, late, "Merged messages posted while connecting");
        }

        shared.state = SessionState::Open;
        let shared = Arc::new(Mutex::new(shared));

        let pump = tokio::spawn(pump(
            conversation,
            deps.api.clone(),
            shared.clone(),
            scope.clone(),
            deps.live.backoff.clone(),
            notif_rx,
        ));

        info!(conversation = %conversation, messages = kept + late, "Chat session open");

        Ok(Self {
            conversation,
            api: deps.api.clone(),
            shared,
            scope,
            live: Mutex::new(Some(handle)),
            pump: Mutex::new(Some(pump)),
        })
    }

    pub fn conversation(&self) -> ConversationId {
        self.conversation
    }

    pub fn state(&self) -> SessionState {
        lock(&self.shared).state.clone()
    }

    /// Rendered messages, ordered by `(timestamp, id)`.
    pub fn messages(&self) -> Vec<Message> {
        lock(&self.shared).messages.clone()
    }

    /// Greatest message id seen so far.
    pub fn cursor(&self) -> Option<MessageId> {
        lock(&self.shared).cursor
    }

    /// Register a callback run once for every new inbound message.
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        lock(&self.shared).handlers.push(Arc::new(handler));
    }

    /// Post `text` to `receiver` and merge the server's copy.
    pub async fn send(&self, text: &str, receiver: UserId) -> Result<Message, MosaicError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(MosaicError::InvalidInput("Message is empty".into()));
        }
        let len = text.chars().count();
        if len > MAX_MESSAGE_LEN {
            return Err(MosaicError::InvalidInput(format!(
                "Message is {len} characters, max {MAX_MESSAGE_LEN}"
            )));
        }
        if !self.scope.is_mounted() {
            return Err(RemoteCallError::Cancelled.into());
        }

        let result = self.api.send_message(self.conversation, receiver, text).await;
        let msg = self.scope.settle(result)?;

        let merged = lock(&self.shared).merge(msg.clone());
        debug!(conversation = %self.conversation, id = %msg.id, merged, "Message sent");
        Ok(msg)
    }

    /// Stop the live channel and detach from all pending work. Idempotent.
    pub fn close(&self) {
        let first = self.scope.unmount();

        if let Some(handle) = take(&self.live) {
            handle.shutdown();
        }
        if let Some(pump) = take(&self.pump) {
            pump.abort();
        }

        lock(&self.shared).set_state(SessionState::Closed);

        if first {
            info!(conversation = %self.conversation, "Chat session closed");
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn take<T>(slot: &Mutex<Option<T>>) -> Option<T> {
    slot.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take()
}

/// Merge `incoming` and run handlers for the ids that were new. Handlers run
/// outside the lock so they may call back into the session.
fn deliver(shared: &Mutex<Shared>, incoming: Vec<Message>) -> usize {
    let (fresh, handlers) = {
        let mut guard = lock(shared);
        let fresh: Vec<Message> = incoming
            .into_iter()
            .filter(|m| guard.merge(m.clone()))
            .collect();
        (fresh, guard.handlers.clone())
    };

    for msg in &fresh {
        for handler in &handlers {
            handler(msg);
        }
    }
    fresh.len()
}

/// Messages past `cursor`, or the whole history when nothing is held yet.
async fn fetch_after(
    api: &dyn ChatApi,
    conversation: ConversationId,
    cursor: Option<MessageId>,
) -> Result<Vec<Message>, MosaicError> {
    match cursor {
        Some(after) => api.messages_since(conversation, after).await,
        None => api.message_history(conversation).await,
    }
}

/// [`fetch_after`], retried on the reconnect schedule. Auth failures and an
/// unmounted view end it at once.
async fn resume(
    api: &dyn ChatApi,
    conversation: ConversationId,
    cursor: Option<MessageId>,
    scope: &ViewScope,
    policy: BackoffPolicy,
) -> Result<Vec<Message>, MosaicError> {
    let mut backoff = Backoff::new(policy);
    loop {
        let err = match scope.settle(fetch_after(api, conversation, cursor).await) {
            Ok(missed) => return Ok(missed),
            Err(e) if e.is_auth() || e.is_cancelled() => return Err(e),
            Err(e) => e,
        };

        let Some(delay) = backoff.next_delay() else {
            return Err(err);
        };
        warn!(
            conversation = %conversation,
            attempt = backoff.attempt(),
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Resume fetch failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

async fn pump(
    conversation: ConversationId,
    api: Arc<dyn ChatApi>,
    shared: Arc<Mutex<Shared>>,
    scope: ViewScope,
    resume_policy: BackoffPolicy,
    mut notif_rx: mpsc::Receiver<LiveNotification>,
) {
    while let Some(notification) = notif_rx.recv().await {
        if !scope.is_mounted() {
            break;
        }

        match notification {
            LiveNotification::Message(msg) => {
                let id = msg.id;
                if deliver(&shared, vec![msg]) == 0 {
                    debug!(conversation = %conversation, id = %id, "Duplicate push ignored");
                }
            }

            LiveNotification::Reconnecting { attempt, delay, reason } => {
                debug!(
                    conversation = %conversation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    reason = %reason,
                    "Session reconnecting"
                );
                lock(&shared).set_state(SessionState::Reconnecting { attempt });
            }

            LiveNotification::Reconnected { attempt } => {
                let cursor = lock(&shared).cursor;

                // Pushes wait in the channel until this settles, so none of
                // them can move the cursor past a range not yet fetched.
                match resume(api.as_ref(), conversation, cursor, &scope, resume_policy.clone()).await {
                    Ok(missed) => {
                        lock(&shared).set_state(SessionState::Open);
                        let added = deliver(&shared, missed);
                        info!(conversation = %conversation, attempt, added, "Session resumed");
                    }
                    Err(e) if e.is_cancelled() => break,
                    Err(e) => {
                        warn!(conversation = %conversation, error = %e, "Could not resume session");
                        lock(&shared).set_state(SessionState::Errored(format!("Resume failed: {e}")));
                        break;
                    }
                }
            }

            LiveNotification::Closed => {
                lock(&shared).set_state(SessionState::Closed);
                break;
            }

            LiveNotification::Failed(e) => {
                warn!(conversation = %conversation, error = %e, "Chat session errored");
                lock(&shared).set_state(SessionState::Errored(e.to_string()));
                break;
            }
        }
    }

    debug!(conversation = %conversation, "Session pump stopped");
}
