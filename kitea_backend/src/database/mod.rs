pub mod models;
pub mod repositories;

use crate::config::KiteaPaths;
use anyhow::{anyhow, Result};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub(crate) const MIGRATIONS: &str = r#"
    PRAGMA journal_mode = WAL;
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS counters (
        name TEXT PRIMARY KEY,
        value INTEGER NOT NULL
    );

    INSERT OR IGNORE INTO counters (name, value) VALUES ('user_count', 0);

    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        user_count INTEGER NOT NULL UNIQUE,
        username TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL UNIQUE,
        is_active INTEGER NOT NULL DEFAULT 1,
        comments_posted INTEGER NOT NULL DEFAULT 0,
        total_upvotes INTEGER NOT NULL DEFAULT 0,
        total_downvotes INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS posts (
        id TEXT PRIMARY KEY,
        photo_url TEXT NOT NULL,
        photo_public_id TEXT NOT NULL,
        photo_mime TEXT NOT NULL,
        photo_size_bytes INTEGER NOT NULL,
        photo_checksum TEXT NOT NULL,
        person_name TEXT NOT NULL,
        caption TEXT NOT NULL,
        uploaded_by TEXT NOT NULL,
        red_flags INTEGER NOT NULL DEFAULT 0,
        green_flags INTEGER NOT NULL DEFAULT 0,
        is_active INTEGER NOT NULL DEFAULT 1,
        version INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (uploaded_by) REFERENCES users(id)
    );

    -- post_id has no foreign key: soft-deleted comments outlive their post
    CREATE TABLE IF NOT EXISTS comments (
        id TEXT PRIMARY KEY,
        post_id TEXT NOT NULL,
        commenter_id TEXT NOT NULL,
        content TEXT NOT NULL,
        upvotes INTEGER NOT NULL DEFAULT 0,
        downvotes INTEGER NOT NULL DEFAULT 0,
        is_active INTEGER NOT NULL DEFAULT 1,
        version INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (commenter_id) REFERENCES users(id)
    );

    CREATE TABLE IF NOT EXISTS votes (
        target_type TEXT NOT NULL,
        target_id TEXT NOT NULL,
        voter_id TEXT NOT NULL,
        vote_kind TEXT NOT NULL,
        cast_at TEXT NOT NULL,
        PRIMARY KEY (target_type, target_id, voter_id),
        FOREIGN KEY (voter_id) REFERENCES users(id)
    );

    CREATE INDEX IF NOT EXISTS idx_posts_uploaded_by ON posts(uploaded_by, created_at DESC);
    CREATE INDEX IF NOT EXISTS idx_posts_safety ON posts(is_active, green_flags DESC, red_flags ASC);
    CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created_at DESC);
"#;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    newly_created: bool,
}

impl Database {
    pub fn connect(paths: &KiteaPaths) -> Result<Self> {
        let newly_created = !paths.db_path.exists();
        let conn = Connection::open(&paths.db_path)?;
        Ok(Self::from_connection(conn, newly_created))
    }

    pub fn from_connection(conn: Connection, newly_created: bool) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            newly_created,
        }
    }

    /// Applies the schema. Returns whether the database file was new.
    pub fn ensure_migrations(&self) -> Result<bool> {
        self.with_conn(|conn| {
            conn.execute_batch(MIGRATIONS)?;
            Ok(())
        })?;
        Ok(self.newly_created)
    }

    pub fn with_repositories<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(repositories::SqliteRepositories<'_>) -> Result<T>,
    {
        self.with_conn(|conn| {
            let repos = repositories::SqliteRepositories::new(conn);
            f(repos)
        })
    }

    fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let guard = self
            .conn
            .lock()
            .map_err(|_| anyhow!("database mutex poisoned"))?;
        f(&guard)
    }
}

#[cfg(test)]
pub(crate) fn in_memory() -> Database {
    let conn = Connection::open_in_memory().expect("in-memory db");
    let db = Database::from_connection(conn, true);
    db.ensure_migrations().expect("migrations");
    db
}
