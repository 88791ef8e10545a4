use thiserror::Error;

#[derive(Error, Debug)]
pub enum MosaicError {
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Remote call error: {0}")]
    Remote(#[from] RemoteCallError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MosaicError {
    /// The caller has to send the user back to the login boundary.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// The request was abandoned because its view went away.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Remote(RemoteCallError::Cancelled))
    }
}

/// Missing or unusable credentials.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("No access token, login required")]
    MissingToken,

    #[error("Access token expired")]
    Expired,

    #[error("Credentials rejected: {0}")]
    Rejected(String),
}

/// Live channel failures. Never fatal to the view.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Failed to connect live channel: {0}")]
    Connect(String),

    #[error("Live channel dropped: {0}")]
    Dropped(String),

    #[error("Live channel closed")]
    Closed,

    #[error("Live channel protocol error: {0}")]
    Protocol(String),
}

/// A request/response call to the backend failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteCallError {
    #[error("Server responded {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("Request cancelled, originating view is gone")]
    Cancelled,
}

/// Decoding, editing or encoding of user media failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MediaError {
    #[error("Failed to decode {file}: {reason}")]
    Decode { file: String, reason: String },

    #[error("Failed to encode {file}: {reason}")]
    Encode { file: String, reason: String },

    #[error("Crop rectangle {width}x{height}+{x}+{y} exceeds image {image_width}x{image_height}")]
    InvalidCrop {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },

    #[error("Zoom must be a finite value >= 1.0, got {0}")]
    InvalidZoom(f32),

    #[error("Invalid trim window {start}s..{end}s for a {duration}s clip")]
    InvalidTrim { start: f64, end: f64, duration: f64 },

    #[error("Unknown filter: {0}")]
    UnknownFilter(String),

    #[error("No media selected")]
    EmptySelection,

    #[error("No image at index {0}")]
    IndexOutOfRange(usize),

    #[error("Not allowed in the {actual} step (needs {expected})")]
    WrongStep {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("{file} is {size} bytes (max {max})")]
    TooLarge { file: String, size: usize, max: usize },
}
