//! Schema migrations, tracked in `PRAGMA user_version`.

pub mod v001_initial;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

type Step = fn(&Connection) -> rusqlite::Result<()>;

/// Ordered schema steps; entry `i` brings the file to version `i + 1`.
const STEPS: &[(&str, Step)] = &[("v001_initial", v001_initial::up)];

/// Version a fully migrated file reports.
pub const CURRENT_VERSION: u32 = STEPS.len() as u32;

/// Bring `conn` up to [`CURRENT_VERSION`].
///
/// A file written by a newer client is refused rather than downgraded.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let found: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if found > CURRENT_VERSION {
        return Err(StoreError::SchemaTooNew {
            found,
            supported: CURRENT_VERSION,
        });
    }

    for (version, (name, up)) in (1u32..).zip(STEPS).skip(found as usize) {
        tracing::info!(migration = name, version, "Applying store migration");
        up(conn).map_err(|e| StoreError::Migration(format!("{name}: {e}")))?;
        conn.pragma_update(None, "user_version", version)?;
    }

    Ok(())
}
