//! In-memory stand-ins for the backend, shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::channel::mpsc as fmpsc;
use futures::StreamExt;
use tokio::sync::oneshot;

use mosaic_net::{
    BackoffPolicy, ChatApi, FrameStream, LiveConfig, LiveConnector, SocialApi, TokenRefresher,
};
use mosaic_shared::models::{
    Comment, Conversation, Engagement, FeedItem, Message, Page, Post, Profile, ToggleAck, User,
    UserSummary,
};
use mosaic_shared::protocol::{LiveEnvelope, PublishDraft};
use mosaic_shared::types::{
    ActionKind, CommentId, ConversationId, EntityKey, MessageId, PostId, UserId,
};
use mosaic_shared::{AuthContext, AuthError, MosaicError, RemoteCallError, TokenPair, TransportError};

pub const ME: UserId = UserId(1);
pub const PEER: UserId = UserId(2);

pub fn message(id: i64) -> Message {
    Message {
        id: MessageId(id),
        sender: PEER,
        receiver: ME,
        content: format!("message {id}"),
        timestamp: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
    }
}

pub fn ids(messages: &[Message]) -> Vec<i64> {
    messages.iter().map(|m| m.id.0).collect()
}

pub fn frame(msg: &Message) -> Result<String, TransportError> {
    Ok(LiveEnvelope {
        message: msg.clone(),
    }
    .to_json()
    .unwrap())
}

/// A signed-looking JWT whose `exp` is `offset` seconds from now.
pub fn jwt(offset: i64) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    let exp = Utc::now().timestamp() + offset;
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp},"user_id":1}}"#));
    format!("{header}.{payload}.sig")
}

pub fn auth() -> AuthContext {
    AuthContext::new(Some(TokenPair {
        access: "test-token".into(),
        refresh: None,
    }))
}

pub fn fast_live(max_attempts: u32) -> LiveConfig {
    LiveConfig {
        backoff: BackoffPolicy {
            base: Duration::from_millis(1),
            max: Duration::from_millis(5),
            max_attempts,
            jitter: false,
        },
        buffer: 16,
    }
}

/// Poll `check` until it holds, panicking after two seconds.
pub async fn eventually<F: Fn() -> bool>(what: &str, check: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for: {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Run `fut` and fail the test if it does not finish in two seconds.
pub async fn within<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(2), fut)
        .await
        .expect("operation timed out")
}

// ---------------------------------------------------------------------------
// Chat backend
// ---------------------------------------------------------------------------

/// Server-side message log plus hooks to hold a send in flight.
#[derive(Default)]
pub struct FakeChat {
    log: Mutex<Vec<Message>>,
    since_calls: Mutex<Vec<MessageId>>,
    since_failures: Mutex<u32>,
    send_gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl FakeChat {
    pub fn with_log(ids: &[i64]) -> Self {
        let chat = Self::default();
        for id in ids {
            chat.add(message(*id));
        }
        chat
    }

    /// A message that reached the server without us seeing it.
    pub fn add(&self, msg: Message) {
        self.log.lock().unwrap().push(msg);
    }

    pub fn since_calls(&self) -> Vec<MessageId> {
        self.since_calls.lock().unwrap().clone()
    }

    /// Make the next `n` calls to `messages_since` fail with a 503.
    pub fn fail_next_since(&self, n: u32) {
        *self.since_failures.lock().unwrap() = n;
    }

    /// Hold the next `send_message` until the returned sender fires.
    pub fn gate_next_send(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.send_gate.lock().unwrap() = Some(rx);
        tx
    }

    /// A gated send has started and is waiting on its gate.
    pub fn send_in_flight(&self) -> bool {
        self.send_gate.lock().unwrap().is_none()
    }
}

#[async_trait]
impl ChatApi for FakeChat {
    async fn conversations(&self) -> Result<Vec<Conversation>, MosaicError> {
        Ok(vec![Conversation {
            id: ConversationId(42),
            participants: [ME, PEER],
        }])
    }

    async fn open_conversation(&self, with: UserId) -> Result<Conversation, MosaicError> {
        Ok(Conversation {
            id: ConversationId(42),
            participants: [ME, with],
        })
    }

    async fn message_history(
        &self,
        _conversation: ConversationId,
    ) -> Result<Vec<Message>, MosaicError> {
        Ok(self.log.lock().unwrap().clone())
    }

    async fn messages_since(
        &self,
        _conversation: ConversationId,
        after: MessageId,
    ) -> Result<Vec<Message>, MosaicError> {
        self.since_calls.lock().unwrap().push(after);

        {
            let mut failures = self.since_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(RemoteCallError::Status {
                    status: 503,
                    body: "busy".into(),
                }
                .into());
            }
        }

        Ok(self
            .log
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.id > after)
            .cloned()
            .collect())
    }

    async fn send_message(
        &self,
        _conversation: ConversationId,
        receiver: UserId,
        text: &str,
    ) -> Result<Message, MosaicError> {
        let gate = self.send_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let mut log = self.log.lock().unwrap();
        let id = log.iter().map(|m| m.id.0).max().unwrap_or(0) + 1;
        let msg = Message {
            id: MessageId(id),
            sender: ME,
            receiver,
            content: text.to_string(),
            timestamp: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
        };
        log.push(msg.clone());
        Ok(msg)
    }
}

// ---------------------------------------------------------------------------
// Live connector
// ---------------------------------------------------------------------------

pub type FrameSender = fmpsc::UnboundedSender<Result<String, TransportError>>;

type ConnectHook = Box<dyn Fn() + Send + Sync>;

/// Hands out pre-arranged connections in order; refuses once they run out.
#[derive(Default)]
pub struct ScriptedConnector {
    script: Mutex<VecDeque<Result<FrameStream, TransportError>>>,
    connects: Mutex<u32>,
    tokens: Mutex<Vec<String>>,
    on_connect: Mutex<Option<ConnectHook>>,
}

impl ScriptedConnector {
    pub fn push_connection(&self) -> FrameSender {
        let (tx, rx) = fmpsc::unbounded();
        self.script.lock().unwrap().push_back(Ok(rx.boxed()));
        tx
    }

    pub fn push_failure(&self) {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(TransportError::Connect("refused".into())));
    }

    pub fn connects(&self) -> u32 {
        *self.connects.lock().unwrap()
    }

    /// Bearer tokens presented, one per connect attempt.
    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }

    /// Run `hook` during every connect, before the connection is handed out.
    pub fn on_connect<F: Fn() + Send + Sync + 'static>(&self, hook: F) {
        *self.on_connect.lock().unwrap() = Some(Box::new(hook));
    }
}

#[async_trait]
impl LiveConnector for ScriptedConnector {
    async fn connect(
        &self,
        _conversation: ConversationId,
        token: &str,
    ) -> Result<FrameStream, TransportError> {
        *self.connects.lock().unwrap() += 1;
        self.tokens.lock().unwrap().push(token.to_string());
        if let Some(hook) = self.on_connect.lock().unwrap().as_ref() {
            hook();
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connect("no more connections".into())))
    }
}

// ---------------------------------------------------------------------------
// Token refresh
// ---------------------------------------------------------------------------

/// Hands out `next` on the first refresh; expires the context after that,
/// the way a rejected refresh does.
pub struct FakeRefresher {
    auth: AuthContext,
    next: Mutex<Option<TokenPair>>,
    calls: Mutex<u32>,
}

impl FakeRefresher {
    pub fn new(auth: &AuthContext, next: Option<TokenPair>) -> Self {
        Self {
            auth: auth.clone(),
            next: Mutex::new(next),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl TokenRefresher for FakeRefresher {
    async fn refresh_access(&self) -> Result<(), MosaicError> {
        *self.calls.lock().unwrap() += 1;
        let next = self.next.lock().unwrap().take();
        match next {
            Some(pair) => {
                self.auth.replace(pair);
                Ok(())
            }
            None => {
                self.auth.expire();
                Err(AuthError::Expired.into())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Social backend
// ---------------------------------------------------------------------------

pub fn post(id: i64, likes: u64, is_liked: bool) -> FeedItem {
    FeedItem::Post(Post {
        id: PostId(id),
        author: UserSummary {
            id: PEER,
            username: "peer".into(),
            avatar: None,
        },
        content: format!("post {id}"),
        media: Vec::new(),
        created_at: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
        engagement: Engagement {
            like_count: likes,
            comment_count: 0,
            is_liked,
            is_saved: false,
        },
    })
}

pub fn profile(id: i64, followers: u64, is_following: bool) -> Profile {
    Profile {
        user: User {
            id: UserId(id),
            username: format!("user{id}"),
            display_name: None,
            avatar: None,
            bio: None,
            website: None,
            birth_date: None,
            is_active: true,
        },
        followers_count: followers,
        following_count: 0,
        post_count: 0,
        is_following,
    }
}

/// Toggle endpoint whose outcome the test controls.
#[derive(Default)]
pub struct FakeSocial {
    pub fail: AtomicBool,
    pub ack_count: Mutex<Option<u64>>,
    pub pages: Mutex<Vec<Page<FeedItem>>>,
    calls: Mutex<Vec<(EntityKey, ActionKind, bool)>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl FakeSocial {
    pub fn failing() -> Self {
        let social = Self::default();
        social.fail.store(true, Ordering::SeqCst);
        social
    }

    pub fn calls(&self) -> Vec<(EntityKey, ActionKind, bool)> {
        self.calls.lock().unwrap().clone()
    }

    /// Hold the next toggle until the returned sender fires.
    pub fn gate_next_toggle(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }
}

fn not_faked<T>() -> Result<T, MosaicError> {
    Err(MosaicError::InvalidInput("not faked".into()))
}

#[async_trait]
impl SocialApi for FakeSocial {
    async fn current_user(&self) -> Result<User, MosaicError> {
        Ok(profile(ME.0, 0, false).user)
    }

    async fn profile(&self, user: UserId) -> Result<Profile, MosaicError> {
        Ok(profile(user.0, 0, false))
    }

    async fn feed(&self, page: u32) -> Result<Page<FeedItem>, MosaicError> {
        let pages = self.pages.lock().unwrap();
        pages
            .get(page as usize - 1)
            .cloned()
            .ok_or_else(|| RemoteCallError::Status {
                status: 404,
                body: "Invalid page.".into(),
            }
            .into())
    }

    async fn reels(&self, _page: u32) -> Result<Page<FeedItem>, MosaicError> {
        not_faked()
    }

    async fn feed_item(&self, _key: EntityKey) -> Result<FeedItem, MosaicError> {
        not_faked()
    }

    async fn set_toggle(
        &self,
        target: EntityKey,
        action: ActionKind,
        active: bool,
    ) -> Result<ToggleAck, MosaicError> {
        self.calls.lock().unwrap().push((target, action, active));

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(RemoteCallError::Status {
                status: 500,
                body: "boom".into(),
            }
            .into());
        }
        Ok(ToggleAck {
            active,
            count: *self.ack_count.lock().unwrap(),
        })
    }

    async fn comments(&self, _target: EntityKey) -> Result<Vec<Comment>, MosaicError> {
        not_faked()
    }

    async fn add_comment(
        &self,
        _target: EntityKey,
        _text: &str,
        _reply_to: Option<CommentId>,
    ) -> Result<Comment, MosaicError> {
        not_faked()
    }

    async fn search_users(&self, _query: &str) -> Result<Vec<UserSummary>, MosaicError> {
        not_faked()
    }

    async fn publish(&self, _draft: &PublishDraft) -> Result<FeedItem, MosaicError> {
        not_faked()
    }
}
