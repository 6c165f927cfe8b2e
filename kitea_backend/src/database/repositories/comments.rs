use super::users::SqliteUserRepository;
use super::votes::SqliteVoteRepository;
use super::{atomically, author_from_row, UserRepository, VoteRepository};
use crate::database::models::{CommentRecord, CommentWithAuthor};
use crate::votes::TargetType;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteCommentRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.post_id, c.commenter_id, c.content, c.upvotes, c.downvotes,
           c.is_active, c.version, c.created_at, c.updated_at,
           u.id, u.user_count, u.username
    FROM comments c
    LEFT JOIN users u ON u.id = c.commenter_id
"#;

fn map_comment_with_author(row: &Row<'_>) -> rusqlite::Result<CommentWithAuthor> {
    Ok(CommentWithAuthor {
        comment: CommentRecord {
            id: row.get(0)?,
            post_id: row.get(1)?,
            commenter_id: row.get(2)?,
            content: row.get(3)?,
            upvotes: row.get(4)?,
            downvotes: row.get(5)?,
            is_active: row.get::<_, i64>(6)? != 0,
            version: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        },
        author: author_from_row(row, 10)?,
    })
}

impl<'conn> super::CommentRepository for SqliteCommentRepository<'conn> {
    fn create(&self, record: &CommentRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO comments (id, post_id, commenter_id, content, upvotes, downvotes,
                                  is_active, version, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                record.id,
                record.post_id,
                record.commenter_id,
                record.content,
                record.upvotes,
                record.downvotes,
                if record.is_active { 1 } else { 0 },
                record.version,
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<CommentRecord>> {
        Ok(self.get_with_author(id)?.map(|joined| joined.comment))
    }

    fn get_with_author(&self, id: &str) -> Result<Option<CommentWithAuthor>> {
        Ok(self
            .conn
            .query_row(
                &format!("{COMMENT_SELECT} WHERE c.id = ?1"),
                params![id],
                map_comment_with_author,
            )
            .optional()?)
    }

    fn list_for_post(&self, post_id: &str, limit: usize) -> Result<Vec<CommentWithAuthor>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            {COMMENT_SELECT}
            WHERE c.post_id = ?1 AND c.is_active = 1
            ORDER BY c.created_at DESC, c.rowid DESC
            LIMIT ?2
            "#
        ))?;
        let limit = i64::try_from(limit)?;
        let rows = stmt.query_map(params![post_id, limit], map_comment_with_author)?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }

    fn set_active_for_post(&self, post_id: &str, active: bool) -> Result<usize> {
        let changed = self.conn.execute(
            r#"
            UPDATE comments
            SET is_active = ?1,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE post_id = ?2 AND is_active != ?1
            "#,
            params![if active { 1 } else { 0 }, post_id],
        )?;
        Ok(changed)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        atomically(self.conn, |conn| {
            let counters = conn
                .query_row(
                    "SELECT commenter_id, upvotes, downvotes FROM comments WHERE id = ?1",
                    params![id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, i64>(2)?,
                        ))
                    },
                )
                .optional()?;
            let Some((commenter_id, upvotes, downvotes)) = counters else {
                return Ok(false);
            };
            SqliteUserRepository { conn }.adjust_received_votes(&commenter_id, -upvotes, -downvotes)?;
            SqliteVoteRepository { conn }.clear_target(TargetType::Comment, id)?;
            let removed = conn.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
            Ok(removed > 0)
        })
    }
}
