//! v001 -- Initial schema: `tokens` and `client_settings`.

use rusqlite::Connection;

const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Bearer tokens (one row per kind: 'access', 'refresh')
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS tokens (
    kind       TEXT PRIMARY KEY NOT NULL,
    value      TEXT NOT NULL,
    updated_at TEXT NOT NULL                  -- RFC-3339
);

-- ----------------------------------------------------------------
-- Client settings (single JSON row)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS client_settings (
    id   INTEGER PRIMARY KEY CHECK (id = 1),
    json TEXT NOT NULL
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
