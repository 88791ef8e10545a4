// Remote collaborator boundary: REST calls and the per-conversation live channel.

pub mod backoff;
pub mod endpoints;
pub mod live;
pub mod rest;

pub use backoff::{Backoff, BackoffPolicy};
pub use live::{
    spawn_live_channel, FrameStream, LiveCommand, LiveConfig, LiveConnector, LiveHandle,
    LiveNotification, WsConnector,
};
pub use rest::{fresh_token, ChatApi, HttpApi, SocialApi, TokenRefresher};
