use candor_core::identity::VoteIdentity;
use candor_core::vote::{VoteStore, VoteStoreError};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, ToSql, params, params_from_iter};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// A confession with its tags and vote counter
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Confession {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub language: String,
    pub snippet: String,
    pub sentiment: String,
    pub is_flagged: bool,
    pub tags: Vec<String>,
    pub upvotes: i64,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a confession
#[derive(Debug, Clone, Default)]
pub struct NewConfession {
    pub title: String,
    pub description: String,
    pub language: String,
    pub snippet: String,
    pub tags: Vec<String>,
    pub is_flagged: bool,
}

/// Tag information
#[derive(Debug, Clone, Serialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

const CONFESSION_COLUMNS: &str =
    "id, title, description, language, snippet, sentiment, is_flagged, upvotes, created_at";

fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}

fn row_to_confession(row: &rusqlite::Row<'_>) -> Result<Confession, rusqlite::Error> {
    Ok(Confession {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        language: row.get(3)?,
        snippet: row.get(4)?,
        sentiment: row.get(5)?,
        is_flagged: row.get::<_, i64>(6)? != 0,
        tags: Vec::new(),
        upvotes: row.get(7)?,
        created_at: timestamp_to_datetime(row.get(8)?),
    })
}

fn tags_for(conn: &Connection, confession_id: i64) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT t.name FROM tags t
         JOIN confession_tags ct ON ct.tag_id = t.id
         WHERE ct.confession_id = ? ORDER BY t.name",
    )?;
    let tags = stmt
        .query_map([confession_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(tags)
}

fn collect_confessions(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Confession>, rusqlite::Error> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, row_to_confession)?;
    let mut out = Vec::new();
    for row in rows {
        let mut confession = row?;
        confession.tags = tags_for(conn, confession.id)?;
        out.push(confession);
    }
    Ok(out)
}

/// Board repository for database operations
#[derive(Clone)]
pub struct BoardRepo {
    conn: Arc<Mutex<Connection>>,
}

impl BoardRepo {
    /// Create a new BoardRepo with the given connection
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    // ===== Confession operations =====

    /// Create a confession with its tags (tags are created on demand)
    pub fn create_confession(&self, new: &NewConfession) -> Result<Confession, rusqlite::Error> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = Utc::now().timestamp();

        tx.execute(
            "INSERT INTO confessions (title, description, language, snippet, is_flagged, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                new.title,
                new.description,
                new.language,
                new.snippet,
                new.is_flagged as i64,
                now
            ],
        )?;
        let id = tx.last_insert_rowid();

        for name in &new.tags {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            tx.execute("INSERT OR IGNORE INTO tags (name) VALUES (?)", [name])?;
            let tag_id: i64 =
                tx.query_row("SELECT id FROM tags WHERE name = ?", [name], |row| {
                    row.get(0)
                })?;
            tx.execute(
                "INSERT OR IGNORE INTO confession_tags (confession_id, tag_id) VALUES (?, ?)",
                params![id, tag_id],
            )?;
        }
        tx.commit()?;

        let mut confession = conn.query_row(
            &format!("SELECT {CONFESSION_COLUMNS} FROM confessions WHERE id = ?"),
            [id],
            row_to_confession,
        )?;
        confession.tags = tags_for(&conn, id)?;
        Ok(confession)
    }

    /// List confessions, newest first
    pub fn list_confessions(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Confession>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        collect_confessions(
            &conn,
            &format!(
                "SELECT {CONFESSION_COLUMNS} FROM confessions
                 ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
            ),
            params![limit, offset],
        )
    }

    /// Get a confession by ID
    pub fn get_confession(&self, id: i64) -> Result<Option<Confession>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        let confession = conn
            .query_row(
                &format!("SELECT {CONFESSION_COLUMNS} FROM confessions WHERE id = ?"),
                [id],
                row_to_confession,
            )
            .optional()?;
        match confession {
            Some(mut c) => {
                c.tags = tags_for(&conn, c.id)?;
                Ok(Some(c))
            }
            None => Ok(None),
        }
    }

    /// Delete a confession (votes and tag links cascade). Returns false if
    /// no such row existed.
    pub fn delete_confession(&self, id: i64) -> Result<bool, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM confessions WHERE id = ?", [id])?;
        Ok(deleted > 0)
    }

    /// List confessions in a given language, newest first
    pub fn list_by_language(
        &self,
        language: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Confession>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        collect_confessions(
            &conn,
            &format!(
                "SELECT {CONFESSION_COLUMNS} FROM confessions
                 WHERE language = ? COLLATE NOCASE
                 ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
            ),
            params![language, limit, offset],
        )
    }

    /// All-time top confessions by vote counter
    pub fn top_confessions(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Confession>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        collect_confessions(
            &conn,
            &format!(
                "SELECT {CONFESSION_COLUMNS} FROM confessions
                 ORDER BY upvotes DESC, created_at DESC LIMIT ? OFFSET ?"
            ),
            params![limit, offset],
        )
    }

    /// All-time leaderboard: only confessions that actually collected votes
    pub fn hall_of_fame(&self, offset: i64, limit: i64) -> Result<Vec<Confession>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        collect_confessions(
            &conn,
            &format!(
                "SELECT {CONFESSION_COLUMNS} FROM confessions
                 WHERE upvotes > 0
                 ORDER BY upvotes DESC, created_at DESC LIMIT ? OFFSET ?"
            ),
            params![limit, offset],
        )
    }

    /// Top confessions created since a given time (weekly/monthly trending)
    pub fn top_confessions_since(
        &self,
        since: DateTime<Utc>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Confession>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        collect_confessions(
            &conn,
            &format!(
                "SELECT {CONFESSION_COLUMNS} FROM confessions
                 WHERE created_at >= ?
                 ORDER BY upvotes DESC, created_at DESC LIMIT ? OFFSET ?"
            ),
            params![since.timestamp(), limit, offset],
        )
    }

    /// A single random confession
    pub fn random_confession(&self) -> Result<Option<Confession>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        let confession = conn
            .query_row(
                &format!("SELECT {CONFESSION_COLUMNS} FROM confessions ORDER BY RANDOM() LIMIT 1"),
                [],
                row_to_confession,
            )
            .optional()?;
        match confession {
            Some(mut c) => {
                c.tags = tags_for(&conn, c.id)?;
                Ok(Some(c))
            }
            None => Ok(None),
        }
    }

    /// Search confessions by free text, language and/or tag name
    pub fn search_confessions(
        &self,
        q: &str,
        language: &str,
        tag: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Confession>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();

        let mut sql = String::from(
            "SELECT DISTINCT c.id, c.title, c.description, c.language, c.snippet, c.sentiment, c.is_flagged, c.upvotes, c.created_at FROM confessions c",
        );
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if !tag.is_empty() {
            sql.push_str(
                " JOIN confession_tags ct ON ct.confession_id = c.id
                  JOIN tags t ON t.id = ct.tag_id",
            );
        }
        sql.push_str(" WHERE 1=1");
        if !tag.is_empty() {
            sql.push_str(" AND t.name = ? COLLATE NOCASE");
            values.push(Box::new(tag.to_string()));
        }
        if !language.is_empty() {
            sql.push_str(" AND c.language = ? COLLATE NOCASE");
            values.push(Box::new(language.to_string()));
        }
        if !q.is_empty() {
            sql.push_str(" AND (c.title LIKE ? OR c.description LIKE ? OR c.snippet LIKE ?)");
            let like = format!("%{q}%");
            values.push(Box::new(like.clone()));
            values.push(Box::new(like.clone()));
            values.push(Box::new(like));
        }
        sql.push_str(" ORDER BY c.created_at DESC, c.id DESC LIMIT ? OFFSET ?");
        values.push(Box::new(limit));
        values.push(Box::new(offset));

        collect_confessions(&conn, &sql, params_from_iter(values.iter().map(|v| v.as_ref())))
    }

    // ===== Tag operations =====

    /// List all tags
    pub fn list_tags(&self) -> Result<Vec<Tag>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id, name FROM tags ORDER BY name")?;
        let tags = stmt
            .query_map([], |row| {
                Ok(Tag {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    /// Create a tag, or return the existing one with the same name
    pub fn get_or_create_tag(&self, name: &str) -> Result<Tag, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute("INSERT OR IGNORE INTO tags (name) VALUES (?)", [name])?;
        conn.query_row("SELECT id, name FROM tags WHERE name = ?", [name], |row| {
            Ok(Tag {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })
    }

    /// Tags whose name starts with the given prefix (for autocomplete)
    pub fn suggest_tags(&self, prefix: &str) -> Result<Vec<Tag>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT id, name FROM tags WHERE name LIKE ? ORDER BY name ASC LIMIT 6")?;
        let tags = stmt
            .query_map([format!("{prefix}%")], |row| {
                Ok(Tag {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    /// Delete a tag by ID. Returns false if no such row existed.
    pub fn delete_tag(&self, id: i64) -> Result<bool, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM tags WHERE id = ?", [id])?;
        Ok(deleted > 0)
    }

    // ===== Vote operations =====

    /// True if any non-empty signal of `identity` already voted on the
    /// confession.
    pub fn has_vote(
        &self,
        confession_id: i64,
        identity: &VoteIdentity,
    ) -> Result<bool, rusqlite::Error> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(confession_id)];
        for (column, value) in [
            ("ip_hash", identity.ip_hash.as_str()),
            ("client_hash", identity.client_hash.as_str()),
        ] {
            if !value.is_empty() {
                clauses.push(format!("{column} = ?"));
                values.push(Box::new(value.to_string()));
            }
        }
        if clauses.is_empty() {
            return Ok(false);
        }

        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM upvotes WHERE confession_id = ? AND ({}))",
            clauses.join(" OR ")
        );
        let exists: i64 = conn.query_row(
            &sql,
            params_from_iter(values.iter().map(|v| v.as_ref())),
            |row| row.get(0),
        )?;
        Ok(exists != 0)
    }

    /// Insert one vote row; the partial unique indexes enforce the dual
    /// per-identity invariants.
    pub fn insert_vote(
        &self,
        confession_id: i64,
        identity: &VoteIdentity,
    ) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().timestamp();
        conn.execute(
            "INSERT INTO upvotes (confession_id, ip_hash, client_hash, created_at) VALUES (?, ?, ?, ?)",
            params![confession_id, identity.ip_hash, identity.client_hash, now],
        )?;
        Ok(())
    }

    /// Atomic counter bump, done by the store rather than read-modify-write
    pub fn increment_upvotes(&self, confession_id: i64) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE confessions SET upvotes = upvotes + 1 WHERE id = ?",
            [confession_id],
        )?;
        Ok(())
    }
}

fn vote_store_err(err: rusqlite::Error) -> VoteStoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            VoteStoreError::Duplicate
        }
        _ => VoteStoreError::Backend(err.to_string()),
    }
}

impl VoteStore for BoardRepo {
    fn has_vote(&self, target_id: i64, identity: &VoteIdentity) -> Result<bool, VoteStoreError> {
        BoardRepo::has_vote(self, target_id, identity).map_err(vote_store_err)
    }

    fn insert_vote(&self, target_id: i64, identity: &VoteIdentity) -> Result<(), VoteStoreError> {
        BoardRepo::insert_vote(self, target_id, identity).map_err(vote_store_err)
    }

    fn increment_vote_count(&self, target_id: i64) -> Result<(), VoteStoreError> {
        self.increment_upvotes(target_id).map_err(vote_store_err)
    }
}
