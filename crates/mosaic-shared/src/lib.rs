// Domain types, wire shapes and the error taxonomy shared by every crate.

pub mod auth;
pub mod constants;
pub mod error;
pub mod models;
pub mod protocol;
pub mod types;

pub use auth::{AuthContext, TokenPair};
pub use error::{AuthError, MediaError, MosaicError, RemoteCallError, TransportError};
