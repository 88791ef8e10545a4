//! Explicitly passed credentials.
//!
//! Every remote call site receives an [`AuthContext`] instead of reading a
//! token from ambient storage. The context hands out the current access
//! token and fires an `on_expire` callback when the backend (or the token's
//! own `exp` claim) says the session is over.

use std::fmt;
use std::sync::{Arc, RwLock};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Access + refresh bearer tokens, opaque to the client.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &"<redacted>")
            .field("refresh", &self.refresh.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

type ExpireHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
pub struct AuthContext {
    tokens: Arc<RwLock<Option<TokenPair>>>,
    on_expire: Option<ExpireHook>,
}

impl AuthContext {
    pub fn new(tokens: Option<TokenPair>) -> Self {
        Self {
            tokens: Arc::new(RwLock::new(tokens)),
            on_expire: None,
        }
    }

    /// A context with no credentials; every call fails with `MissingToken`.
    pub fn anonymous() -> Self {
        Self::new(None)
    }

    /// Install the callback run when the session expires (redirect to login).
    pub fn with_on_expire<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_expire = Some(Arc::new(hook));
        self
    }

    /// The bearer token to attach to the next call.
    pub fn token(&self) -> Result<String, AuthError> {
        let guard = self.tokens.read().map_err(|_| AuthError::MissingToken)?;
        let pair = guard.as_ref().ok_or(AuthError::MissingToken)?;

        if jwt_expired(&pair.access, chrono::Utc::now().timestamp()) {
            return Err(AuthError::Expired);
        }

        Ok(pair.access.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.tokens
            .read()
            .ok()
            .and_then(|guard| guard.as_ref().and_then(|p| p.refresh.clone()))
    }

    pub fn tokens(&self) -> Option<TokenPair> {
        self.tokens.read().ok().and_then(|guard| guard.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_ok()
    }

    /// Swap in a new pair after login or refresh.
    pub fn replace(&self, tokens: TokenPair) {
        if let Ok(mut guard) = self.tokens.write() {
            *guard = Some(tokens);
        }
    }

    /// Drop the credentials and notify the login boundary.
    pub fn expire(&self) {
        let had_tokens = match self.tokens.write() {
            Ok(mut guard) => guard.take().is_some(),
            Err(_) => false,
        };

        tracing::info!(had_tokens, "Auth session expired");

        if let Some(ref hook) = self.on_expire {
            hook();
        }
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

#[derive(Deserialize)]
struct Claims {
    exp: Option<i64>,
}

/// True only for a well-formed JWT whose `exp` is not in the future.
/// Opaque tokens never expire client-side; the backend decides.
fn jwt_expired(token: &str, now: i64) -> bool {
    let mut parts = token.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    let Ok(raw) = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')) else {
        return false;
    };

    match serde_json::from_slice::<Claims>(&raw) {
        Ok(Claims { exp: Some(exp) }) => exp <= now,
        _ => false,
    }
}
