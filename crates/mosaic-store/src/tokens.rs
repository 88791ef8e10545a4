//! Persistence of the access/refresh token pair.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use mosaic_shared::TokenPair;

use crate::database::Database;
use crate::error::Result;

const ACCESS: &str = "access";
const REFRESH: &str = "refresh";

impl Database {
    /// Replace the stored pair. A pair without a refresh token removes any
    /// previously stored one.
    pub fn save_tokens(&self, tokens: &TokenPair) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn().unchecked_transaction()?;

        tx.execute(
            "INSERT OR REPLACE INTO tokens (kind, value, updated_at) VALUES (?1, ?2, ?3)",
            params![ACCESS, tokens.access, now],
        )?;

        match tokens.refresh {
            Some(ref refresh) => {
                tx.execute(
                    "INSERT OR REPLACE INTO tokens (kind, value, updated_at) VALUES (?1, ?2, ?3)",
                    params![REFRESH, refresh, now],
                )?;
            }
            None => {
                tx.execute("DELETE FROM tokens WHERE kind = ?1", params![REFRESH])?;
            }
        }

        tx.commit()?;
        tracing::debug!("tokens saved");
        Ok(())
    }

    /// The stored pair, or `None` when logged out.
    pub fn load_tokens(&self) -> Result<Option<TokenPair>> {
        let access = self.token_value(ACCESS)?;
        let Some(access) = access else {
            return Ok(None);
        };
        let refresh = self.token_value(REFRESH)?;
        Ok(Some(TokenPair { access, refresh }))
    }

    pub fn clear_tokens(&self) -> Result<()> {
        self.conn().execute("DELETE FROM tokens", [])?;
        tracing::info!("tokens cleared");
        Ok(())
    }

    fn token_value(&self, kind: &str) -> Result<Option<String>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT value FROM tokens WHERE kind = ?1",
                params![kind],
                |row| row.get(0),
            )
            .optional()?)
    }
}
