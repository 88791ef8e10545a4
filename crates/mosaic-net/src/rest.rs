//! Bearer-authenticated REST client.
//!
//! The two traits are the seams the session manager and the mutation
//! coordinator depend on; [`HttpApi`] is the `reqwest` implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use mosaic_shared::models::{
    Comment, Conversation, FeedItem, Message, Page, Post, Profile, Reel, ToggleAck, User,
    UserSummary,
};
use mosaic_shared::protocol::{DraftKind, PublishDraft};
use mosaic_shared::types::{ActionKind, CommentId, ConversationId, EntityKey, MessageId, UserId};
use mosaic_shared::{AuthContext, AuthError, MosaicError, RemoteCallError, TokenPair};

use crate::endpoints;

/// Longest error body kept in a `RemoteCallError::Status`.
const MAX_ERROR_BODY: usize = 512;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Request-channel operations of the chat screen.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn conversations(&self) -> Result<Vec<Conversation>, MosaicError>;

    /// Ask the server for the room shared with `with`, creating it if needed.
    async fn open_conversation(&self, with: UserId) -> Result<Conversation, MosaicError>;

    /// Full history, oldest first.
    async fn message_history(
        &self,
        conversation: ConversationId,
    ) -> Result<Vec<Message>, MosaicError>;

    /// Messages with an id greater than `after`, oldest first.
    async fn messages_since(
        &self,
        conversation: ConversationId,
        after: MessageId,
    ) -> Result<Vec<Message>, MosaicError>;

    async fn send_message(
        &self,
        conversation: ConversationId,
        receiver: UserId,
        text: &str,
    ) -> Result<Message, MosaicError>;
}

/// Feed, profile and follow-graph operations.
#[async_trait]
pub trait SocialApi: Send + Sync {
    async fn current_user(&self) -> Result<User, MosaicError>;

    async fn profile(&self, user: UserId) -> Result<Profile, MosaicError>;

    async fn feed(&self, page: u32) -> Result<Page<FeedItem>, MosaicError>;

    async fn reels(&self, page: u32) -> Result<Page<FeedItem>, MosaicError>;

    /// A single post or reel.
    async fn feed_item(&self, key: EntityKey) -> Result<FeedItem, MosaicError>;

    /// Set like/save/follow on `target` to `active`.
    async fn set_toggle(
        &self,
        target: EntityKey,
        action: ActionKind,
        active: bool,
    ) -> Result<ToggleAck, MosaicError>;

    async fn comments(&self, target: EntityKey) -> Result<Vec<Comment>, MosaicError>;

    async fn add_comment(
        &self,
        target: EntityKey,
        text: &str,
        reply_to: Option<CommentId>,
    ) -> Result<Comment, MosaicError>;

    async fn search_users(&self, query: &str) -> Result<Vec<UserSummary>, MosaicError>;

    async fn publish(&self, draft: &PublishDraft) -> Result<FeedItem, MosaicError>;
}

/// Renews the access token held in an [`AuthContext`].
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Install a new access token, or expire the context when the backend
    /// will not issue one. Network failures leave the context untouched.
    async fn refresh_access(&self) -> Result<(), MosaicError>;
}

/// The access token to use next, refreshed first if it has expired.
pub async fn fresh_token(
    auth: &AuthContext,
    refresher: &dyn TokenRefresher,
) -> Result<String, MosaicError> {
    match auth.token() {
        Err(AuthError::Expired) => {
            refresher.refresh_access().await?;
            Ok(auth.token()?)
        }
        other => Ok(other?),
    }
}

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshBody<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

#[derive(Serialize)]
struct OpenConversationBody {
    user_id: UserId,
}

#[derive(Serialize)]
struct SendMessageBody<'a> {
    receiver: UserId,
    content: &'a str,
}

#[derive(Serialize)]
struct CommentBody<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<CommentId>,
}

// ---------------------------------------------------------------------------
// HttpApi
// ---------------------------------------------------------------------------

pub struct HttpApi {
    client: Client,
    base: Url,
    auth: AuthContext,
}

impl HttpApi {
    pub fn new(base_url: &str, auth: AuthContext, timeout: Duration) -> Result<Self, MosaicError> {
        let base = parse_base(base_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteCallError::Network(e.to_string()))?;

        Ok(Self { client, base, auth })
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    /// Exchange credentials for a token pair and install it in the context.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, MosaicError> {
        let resp = self
            .client
            .post(self.url(&endpoints::token())?)
            .json(&LoginBody { username, password })
            .send()
            .await
            .map_err(network)?;

        if matches!(resp.status(), StatusCode::UNAUTHORIZED | StatusCode::BAD_REQUEST) {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::Rejected(truncate(body)).into());
        }

        let body: TokenResponse = decode(check_status(resp).await?).await?;
        let pair = TokenPair {
            access: body.access,
            refresh: body.refresh,
        };
        self.auth.replace(pair.clone());

        info!(username, "Logged in");
        Ok(pair)
    }

    /// Trade the refresh token for a new access token. Expires the context
    /// when that is impossible.
    async fn refresh(&self) -> Result<(), MosaicError> {
        let Some(refresh) = self.auth.refresh_token() else {
            self.auth.expire();
            return Err(AuthError::Expired.into());
        };

        let resp = self
            .client
            .post(self.url(&endpoints::token_refresh())?)
            .json(&RefreshBody { refresh: &refresh })
            .send()
            .await
            .map_err(network)?;

        if !resp.status().is_success() {
            warn!(status = %resp.status(), "Token refresh rejected");
            self.auth.expire();
            return Err(AuthError::Expired.into());
        }

        let body: TokenResponse = decode(resp).await?;
        self.auth.replace(TokenPair {
            access: body.access,
            refresh: body.refresh.or(Some(refresh)),
        });

        debug!("Access token refreshed");
        Ok(())
    }

    fn url(&self, path: &str) -> Result<Url, MosaicError> {
        self.base
            .join(path)
            .map_err(|e| MosaicError::InvalidInput(format!("Bad endpoint {path}: {e}")))
    }

    /// Send an authenticated request built by `build`, refreshing the token
    /// once on `401`.
    async fn execute<F>(&self, build: F) -> Result<Response, MosaicError>
    where
        F: Fn(&Client, &str) -> RequestBuilder + Send + Sync,
    {
        let token = fresh_token(&self.auth, self).await?;

        let resp = build(&self.client, &token).send().await.map_err(network)?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return check_status(resp).await;
        }

        debug!("Got 401, refreshing access token");
        self.refresh().await?;
        let token = self.auth.token()?;

        let resp = build(&self.client, &token).send().await.map_err(network)?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            self.auth.expire();
            return Err(AuthError::Expired.into());
        }
        check_status(resp).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, MosaicError> {
        let url = self.url(path)?;
        let resp = self
            .execute(|client, token| client.get(url.clone()).bearer_auth(token))
            .await?;
        decode(resp).await
    }

    async fn get_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, MosaicError> {
        let url = self.url(path)?;
        let resp = self
            .execute(|client, token| client.get(url.clone()).query(query).bearer_auth(token))
            .await?;
        decode(resp).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, MosaicError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path)?;
        let resp = self
            .execute(|client, token| client.post(url.clone()).json(body).bearer_auth(token))
            .await?;
        decode(resp).await
    }
}

#[async_trait]
impl TokenRefresher for HttpApi {
    async fn refresh_access(&self) -> Result<(), MosaicError> {
        self.refresh().await
    }
}

#[async_trait]
impl ChatApi for HttpApi {
    async fn conversations(&self) -> Result<Vec<Conversation>, MosaicError> {
        self.get(&endpoints::chatrooms()).await
    }

    async fn open_conversation(&self, with: UserId) -> Result<Conversation, MosaicError> {
        self.post_json(&endpoints::chatrooms(), &OpenConversationBody { user_id: with })
            .await
    }

    async fn message_history(
        &self,
        conversation: ConversationId,
    ) -> Result<Vec<Message>, MosaicError> {
        self.get(&endpoints::chat_messages(conversation)).await
    }

    async fn messages_since(
        &self,
        conversation: ConversationId,
        after: MessageId,
    ) -> Result<Vec<Message>, MosaicError> {
        self.get_query(
            &endpoints::chat_messages(conversation),
            &[("after", after.to_string())],
        )
        .await
    }

    async fn send_message(
        &self,
        conversation: ConversationId,
        receiver: UserId,
        text: &str,
    ) -> Result<Message, MosaicError> {
        self.post_json(
            &endpoints::chat_messages(conversation),
            &SendMessageBody {
                receiver,
                content: text,
            },
        )
        .await
    }
}

#[async_trait]
impl SocialApi for HttpApi {
    async fn current_user(&self) -> Result<User, MosaicError> {
        self.get(&endpoints::me()).await
    }

    async fn profile(&self, user: UserId) -> Result<Profile, MosaicError> {
        self.get(&endpoints::user(user)).await
    }

    async fn feed(&self, page: u32) -> Result<Page<FeedItem>, MosaicError> {
        let page: Page<Post> = self
            .get_query(&endpoints::posts(), &[("page", page.to_string())])
            .await?;
        Ok(Page {
            results: page.results.into_iter().map(FeedItem::Post).collect(),
            next: page.next,
        })
    }

    async fn reels(&self, page: u32) -> Result<Page<FeedItem>, MosaicError> {
        let page: Page<Reel> = self
            .get_query(&endpoints::reels(), &[("page", page.to_string())])
            .await?;
        Ok(Page {
            results: page.results.into_iter().map(FeedItem::Reel).collect(),
            next: page.next,
        })
    }

    async fn feed_item(&self, key: EntityKey) -> Result<FeedItem, MosaicError> {
        let path = endpoints::entity(key);
        match key {
            EntityKey::Post(_) => Ok(FeedItem::Post(self.get(&path).await?)),
            EntityKey::Reel(_) => Ok(FeedItem::Reel(self.get(&path).await?)),
            EntityKey::User(_) => Err(MosaicError::InvalidInput(format!(
                "{key} is not a feed item"
            ))),
        }
    }

    async fn set_toggle(
        &self,
        target: EntityKey,
        action: ActionKind,
        active: bool,
    ) -> Result<ToggleAck, MosaicError> {
        if !target.supports(action) {
            return Err(MosaicError::InvalidInput(format!(
                "{action} is not defined for {target}"
            )));
        }

        let url = self.url(&endpoints::toggle(target, action))?;
        let resp = self
            .execute(|client, token| {
                let req = if active {
                    client.post(url.clone())
                } else {
                    client.delete(url.clone())
                };
                req.bearer_auth(token)
            })
            .await?;

        let body = resp.bytes().await.map_err(network)?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(ToggleAck {
                active,
                count: None,
            });
        }
        serde_json::from_slice(&body).map_err(|e| RemoteCallError::Decode(e.to_string()).into())
    }

    async fn comments(&self, target: EntityKey) -> Result<Vec<Comment>, MosaicError> {
        let mut comments: Vec<Comment> = self.get(&endpoints::comments(target)).await?;
        for comment in &mut comments {
            comment.target = Some(target);
        }
        Ok(comments)
    }

    async fn add_comment(
        &self,
        target: EntityKey,
        text: &str,
        reply_to: Option<CommentId>,
    ) -> Result<Comment, MosaicError> {
        let mut comment: Comment = self
            .post_json(
                &endpoints::comments(target),
                &CommentBody {
                    text,
                    parent: reply_to,
                },
            )
            .await?;
        comment.target = Some(target);
        Ok(comment)
    }

    async fn search_users(&self, query: &str) -> Result<Vec<UserSummary>, MosaicError> {
        self.get_query(&endpoints::search(), &[("q", query.to_string())])
            .await
    }

    async fn publish(&self, draft: &PublishDraft) -> Result<FeedItem, MosaicError> {
        let fields = draft
            .text_fields()
            .map_err(|e| MosaicError::InvalidInput(format!("Unserializable media meta: {e}")))?;

        let path = match draft.kind {
            DraftKind::Post => endpoints::posts(),
            DraftKind::Reel => endpoints::reels(),
        };
        let url = self.url(&path)?;

        let resp = self
            .execute(|client, token| {
                let mut form = multipart::Form::new();
                for (name, value) in &fields {
                    form = form.text(name.clone(), value.clone());
                }
                for upload in &draft.media {
                    let part = multipart::Part::stream(reqwest::Body::from(upload.bytes.clone()))
                        .file_name(upload.file_name.clone());
                    let part = match part.mime_str(&upload.mime) {
                        Ok(part) => part,
                        Err(e) => {
                            warn!(file = %upload.file_name, error = %e, "Bad mime type, sending untyped");
                            multipart::Part::stream(reqwest::Body::from(upload.bytes.clone()))
                                .file_name(upload.file_name.clone())
                        }
                    };
                    form = form.part("media", part);
                }
                client.post(url.clone()).multipart(form).bearer_auth(token)
            })
            .await?;

        let item = match draft.kind {
            DraftKind::Post => FeedItem::Post(decode(resp).await?),
            DraftKind::Reel => FeedItem::Reel(decode(resp).await?),
        };

        info!(kind = ?draft.kind, files = draft.media.len(), "Published");
        Ok(item)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a base URL, making sure relative joins keep its path.
fn parse_base(base_url: &str) -> Result<Url, MosaicError> {
    let mut raw = base_url.trim().to_string();
    if !raw.ends_with('/') {
        raw.push('/');
    }
    Url::parse(&raw).map_err(|e| MosaicError::InvalidInput(format!("Bad base URL {base_url}: {e}")))
}

pub(crate) fn join_base(base_url: &str, path: &str) -> Result<Url, MosaicError> {
    parse_base(base_url)?
        .join(path)
        .map_err(|e| MosaicError::InvalidInput(format!("Bad endpoint {path}: {e}")))
}

fn network(e: reqwest::Error) -> MosaicError {
    RemoteCallError::Network(e.to_string()).into()
}

async fn check_status(resp: Response) -> Result<Response, MosaicError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), "Remote call failed");
    Err(RemoteCallError::Status {
        status: status.as_u16(),
        body: truncate(body),
    }
    .into())
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, MosaicError> {
    resp.json::<T>()
        .await
        .map_err(|e| RemoteCallError::Decode(e.to_string()).into())
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}
