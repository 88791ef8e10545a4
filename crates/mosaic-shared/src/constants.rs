/// Path prefix of every REST endpoint, relative to the base URL
pub const API_PREFIX: &str = "api";

/// Path prefix of the live chat sockets, relative to the live base URL
pub const LIVE_CHAT_PREFIX: &str = "ws/chat";

/// Default REST base URL (local development backend)
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

/// Default live channel base URL
pub const DEFAULT_LIVE_URL: &str = "ws://127.0.0.1:8000";

/// Maximum chat message length in characters
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Maximum media upload size in bytes (50 MiB)
pub const MAX_UPLOAD_SIZE: usize = 50 * 1024 * 1024;

/// Reconnect backoff defaults for the live channel
pub const RECONNECT_BASE_MS: u64 = 500;
pub const RECONNECT_MAX_MS: u64 = 30_000;
pub const RECONNECT_MAX_ATTEMPTS: u32 = 8;

/// Capacity of the live channel notification queue
pub const LIVE_CHANNEL_BUFFER: usize = 256;

/// HTTP request timeout in seconds
pub const HTTP_TIMEOUT_SECS: u64 = 30;
