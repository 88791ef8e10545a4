//! SQLite handle. Every constructor migrates before handing it out.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::migrations;

const DB_FILE: &str = "mosaic.db";

pub struct Database {
    conn: Connection,
}

impl Database {
    /// `mosaic.db` in the platform data directory, e.g.
    /// `~/.local/share/mosaic/mosaic.db` on Linux.
    pub fn new() -> Result<Self> {
        let dirs = ProjectDirs::from("org", "mosaic", "mosaic").ok_or(StoreError::NoDataDir)?;
        Self::open_at(&dirs.data_dir().join(DB_FILE))
    }

    /// Open or create the file at `path`, creating missing parent dirs.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        tracing::info!(path = %path.display(), "Opening client store");

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        migrations::run_migrations(&conn)?;

        Ok(Self { conn })
    }

    /// In-memory database, for tests and throwaway sessions.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run_migrations(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Backing file, `None` for in-memory stores.
    pub fn path(&self) -> Option<PathBuf> {
        self.conn.path().map(PathBuf::from)
    }
}
