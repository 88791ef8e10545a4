use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::error::Result;

/// User-editable client settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// REST base URL; empty means "use the configured default".
    pub api_url: String,
    /// Live channel base URL; empty means "use the configured default".
    pub live_url: String,
    /// Username remembered from the last login.
    pub last_username: Option<String>,
}

impl Database {
    /// Stored settings, or defaults when none were saved yet.
    pub fn get_settings(&self) -> Result<ClientSettings> {
        let json: Option<String> = self
            .conn()
            .query_row(
                "SELECT json FROM client_settings WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(ClientSettings::default()),
        }
    }

    pub fn update_settings(&self, settings: &ClientSettings) -> Result<()> {
        let json = serde_json::to_string(settings)?;
        self.conn().execute(
            "INSERT OR REPLACE INTO client_settings (id, json) VALUES (1, ?1)",
            params![json],
        )?;
        tracing::info!("settings updated");
        Ok(())
    }
}
