use super::atomically;
use crate::database::models::{NewUser, UserRecord};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteUserRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const USER_COLUMNS: &str = "id, user_count, username, password, is_active, comments_posted, \
     total_upvotes, total_downvotes, created_at, updated_at";

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        user_count: row.get(1)?,
        username: row.get(2)?,
        password: row.get(3)?,
        is_active: row.get::<_, i64>(4)? != 0,
        comments_posted: row.get(5)?,
        total_upvotes: row.get(6)?,
        total_downvotes: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl<'conn> super::UserRepository for SqliteUserRepository<'conn> {
    fn create(&self, user: &NewUser) -> Result<UserRecord> {
        atomically(self.conn, |conn| {
            let user_count: i64 = conn
                .query_row(
                    r#"
                    UPDATE counters SET value = value + 1
                    WHERE name = 'user_count'
                    RETURNING value
                    "#,
                    [],
                    |row| row.get(0),
                )
                .context("user_count counter row missing")?;
            conn.execute(
                r#"
                INSERT INTO users (id, user_count, username, password, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                "#,
                params![user.id, user_count, user.username, user.password, user.created_at],
            )?;
            Ok(UserRecord {
                id: user.id.clone(),
                user_count,
                username: user.username.clone(),
                password: user.password.clone(),
                is_active: true,
                comments_posted: 0,
                total_upvotes: 0,
                total_downvotes: 0,
                created_at: user.created_at.clone(),
                updated_at: user.created_at.clone(),
            })
        })
    }

    fn get(&self, id: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                map_user,
            )
            .optional()?)
    }

    fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                params![username],
                map_user,
            )
            .optional()?)
    }

    fn increment_comments_posted(&self, id: &str, delta: i64) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE users
            SET comments_posted = comments_posted + ?1,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE id = ?2
            "#,
            params![delta, id],
        )?;
        Ok(())
    }

    fn adjust_received_votes(&self, id: &str, upvotes: i64, downvotes: i64) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE users
            SET total_upvotes = total_upvotes + ?1,
                total_downvotes = total_downvotes + ?2,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE id = ?3
            "#,
            params![upvotes, downvotes, id],
        )?;
        Ok(())
    }
}
