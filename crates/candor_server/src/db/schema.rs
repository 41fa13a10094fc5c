use rusqlite::Connection;

/// SQL schema for the board tables
const SCHEMA: &str = r#"
-- Confessions table
CREATE TABLE IF NOT EXISTS confessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    language TEXT NOT NULL DEFAULT '',
    snippet TEXT NOT NULL DEFAULT '',
    sentiment TEXT NOT NULL DEFAULT 'neutral',
    is_flagged INTEGER NOT NULL DEFAULT 0,
    upvotes INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_confessions_created ON confessions(created_at);
CREATE INDEX IF NOT EXISTS idx_confessions_upvotes ON confessions(upvotes);

-- Tags table
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE
);

-- Confession <-> tag join table
CREATE TABLE IF NOT EXISTS confession_tags (
    confession_id INTEGER NOT NULL REFERENCES confessions(id) ON DELETE CASCADE,
    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (confession_id, tag_id)
);

-- One row per recorded vote. The two unique indexes are independent:
-- either signal alone marks a prior vote. Partial so an absent (empty)
-- signal never collides across voters.
CREATE TABLE IF NOT EXISTS upvotes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    confession_id INTEGER NOT NULL REFERENCES confessions(id) ON DELETE CASCADE,
    ip_hash TEXT NOT NULL DEFAULT '',
    client_hash TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_upvotes_conf_ip
    ON upvotes(confession_id, ip_hash) WHERE ip_hash <> '';
CREATE UNIQUE INDEX IF NOT EXISTS idx_upvotes_conf_client
    ON upvotes(confession_id, client_hash) WHERE client_hash <> '';
"#;

/// Create tables and indexes if they do not exist
pub fn init_database(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA)
}
