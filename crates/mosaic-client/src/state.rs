//! Application state shared by every command of the client.

use std::sync::Arc;

use tracing::{info, warn};

use mosaic_net::{HttpApi, WsConnector};
use mosaic_shared::models::User;
use mosaic_shared::AuthContext;
use mosaic_store::Database;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::session::SessionDeps;

/// Central application state.
///
/// Owns the local database, the credentials every remote call goes through
/// and the REST and live-channel clients built from the configuration.
pub struct AppState {
    pub config: ClientConfig,

    /// Token pair and settings storage.
    pub database: Database,

    /// Credentials handed to every remote call.
    pub auth: AuthContext,

    pub api: Arc<HttpApi>,

    pub connector: Arc<WsConnector>,

    /// Signed-in user, fetched once per run.
    pub current_user: Option<User>,
}

impl AppState {
    /// Open the database and build the clients. Stored settings fill in any
    /// server URL the environment left unset.
    pub fn open(mut config: ClientConfig) -> Result<Self, ClientError> {
        let database = match config.db_path {
            Some(ref path) => Database::open_at(path)?,
            None => Database::new()?,
        };

        config.apply_settings(&database.get_settings()?);

        let tokens = database.load_tokens()?;
        let auth = AuthContext::new(tokens)
            .with_on_expire(|| warn!("Session expired, log in again with `mosaic login`"));

        let api = Arc::new(HttpApi::new(&config.api_url, auth.clone(), config.http_timeout)?);
        let connector = Arc::new(WsConnector::new(&config.live_url)?);

        info!(api = %config.api_url, live = %config.live_url, "Client state ready");

        Ok(Self {
            config,
            database,
            auth,
            api,
            connector,
            current_user: None,
        })
    }

    pub fn session_deps(&self) -> SessionDeps {
        SessionDeps {
            api: self.api.clone(),
            connector: self.connector.clone(),
            auth: self.auth.clone(),
            refresher: self.api.clone(),
            live: self.config.live(),
        }
    }

    /// Fetch the signed-in user unless already cached.
    pub async fn current_user(&mut self) -> Result<&User, ClientError> {
        use mosaic_net::SocialApi;

        let user = match self.current_user.take() {
            Some(user) => user,
            None => self.api.current_user().await?,
        };
        Ok(self.current_user.insert(user))
    }

    /// Write the in-memory token pair back to the database. A refresh may
    /// have rotated it, an expiry may have cleared it.
    pub fn persist_tokens(&self) -> Result<(), ClientError> {
        match self.auth.tokens() {
            Some(pair) => self.database.save_tokens(&pair)?,
            None => self.database.clear_tokens()?,
        }
        Ok(())
    }
}
