//! Endpoint paths, relative to the configured base URLs.

use mosaic_shared::constants::{API_PREFIX, LIVE_CHAT_PREFIX};
use mosaic_shared::types::{ActionKind, ConversationId, EntityKey, UserId};

pub fn token() -> String {
    format!("{API_PREFIX}/token/")
}

pub fn token_refresh() -> String {
    format!("{API_PREFIX}/token/refresh/")
}

pub fn me() -> String {
    format!("{API_PREFIX}/users/me/")
}

pub fn user(id: UserId) -> String {
    format!("{API_PREFIX}/users/{id}/")
}

pub fn search() -> String {
    format!("{API_PREFIX}/search/")
}

pub fn posts() -> String {
    format!("{API_PREFIX}/posts/")
}

pub fn reels() -> String {
    format!("{API_PREFIX}/reels/")
}

/// Collection path of a post, reel or user.
pub fn entity(key: EntityKey) -> String {
    match key {
        EntityKey::Post(id) => format!("{API_PREFIX}/posts/{id}/"),
        EntityKey::Reel(id) => format!("{API_PREFIX}/reels/{id}/"),
        EntityKey::User(id) => user(id),
    }
}

/// `.../like/`, `.../save/` or `.../follow/` under the entity.
pub fn toggle(key: EntityKey, action: ActionKind) -> String {
    format!("{}{}/", entity(key), action.segment())
}

pub fn comments(key: EntityKey) -> String {
    format!("{}comments/", entity(key))
}

pub fn chatrooms() -> String {
    format!("{API_PREFIX}/chatrooms/")
}

pub fn chat_messages(id: ConversationId) -> String {
    format!("{API_PREFIX}/chatrooms/{id}/messages/")
}

pub fn live_chat(id: ConversationId) -> String {
    format!("{LIVE_CHAT_PREFIX}/{id}/")
}
