use super::comments::SqliteCommentRepository;
use super::votes::SqliteVoteRepository;
use super::{atomically, author_from_row, CommentRepository, VoteRepository};
use crate::database::models::{PhotoRecord, PostPage, PostRecord, PostWithAuthor};
use crate::votes::TargetType;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqlitePostRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const POST_SELECT: &str = r#"
    SELECT p.id, p.photo_url, p.photo_public_id, p.photo_mime, p.photo_size_bytes,
           p.photo_checksum, p.person_name, p.caption, p.uploaded_by,
           p.red_flags, p.green_flags, p.is_active, p.version, p.created_at, p.updated_at,
           u.id, u.user_count, u.username
    FROM posts p
    LEFT JOIN users u ON u.id = p.uploaded_by
"#;

fn map_post(row: &Row<'_>) -> rusqlite::Result<PostRecord> {
    Ok(PostRecord {
        id: row.get(0)?,
        photo: PhotoRecord {
            url: row.get(1)?,
            public_id: row.get(2)?,
            mime: row.get(3)?,
            size_bytes: row.get(4)?,
            checksum: row.get(5)?,
        },
        person_name: row.get(6)?,
        caption: row.get(7)?,
        uploaded_by: row.get(8)?,
        red_flags: row.get(9)?,
        green_flags: row.get(10)?,
        is_active: row.get::<_, i64>(11)? != 0,
        version: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

fn map_post_with_author(row: &Row<'_>) -> rusqlite::Result<PostWithAuthor> {
    Ok(PostWithAuthor {
        post: map_post(row)?,
        author: author_from_row(row, 15)?,
    })
}

impl<'conn> SqlitePostRepository<'conn> {
    fn query_many(&self, clause: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<PostWithAuthor>> {
        let mut stmt = self.conn.prepare(&format!("{POST_SELECT} {clause}"))?;
        let rows = stmt.query_map(params, map_post_with_author)?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }
}

impl<'conn> super::PostRepository for SqlitePostRepository<'conn> {
    fn create(&self, record: &PostRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO posts (id, photo_url, photo_public_id, photo_mime, photo_size_bytes,
                               photo_checksum, person_name, caption, uploaded_by, red_flags,
                               green_flags, is_active, version, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                record.id,
                record.photo.url,
                record.photo.public_id,
                record.photo.mime,
                record.photo.size_bytes,
                record.photo.checksum,
                record.person_name,
                record.caption,
                record.uploaded_by,
                record.red_flags,
                record.green_flags,
                if record.is_active { 1 } else { 0 },
                record.version,
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<PostRecord>> {
        Ok(self
            .get_with_author(id)?
            .map(|joined| joined.post))
    }

    fn get_with_author(&self, id: &str) -> Result<Option<PostWithAuthor>> {
        Ok(self
            .conn
            .query_row(
                &format!("{POST_SELECT} WHERE p.id = ?1"),
                params![id],
                map_post_with_author,
            )
            .optional()?)
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<PostWithAuthor>> {
        self.query_many(
            "WHERE p.is_active = 1 ORDER BY p.created_at DESC, p.rowid DESC LIMIT ?1",
            params![i64::try_from(limit)?],
        )
    }

    fn list_for_user(&self, user_id: &str, page: usize, page_size: usize) -> Result<PostPage> {
        let limit = i64::try_from(page_size)?;
        // an offset past i64::MAX lies beyond any row SQLite can hold
        let offset = page
            .checked_sub(1)
            .and_then(|skipped| skipped.checked_mul(page_size))
            .and_then(|offset| i64::try_from(offset).ok());
        let posts = match offset {
            Some(offset) => self.query_many(
                r#"
                WHERE p.uploaded_by = ?1 AND p.is_active = 1
                ORDER BY p.created_at DESC, p.rowid DESC
                LIMIT ?2 OFFSET ?3
                "#,
                params![user_id, limit, offset],
            )?,
            None => Vec::new(),
        };
        let total: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE uploaded_by = ?1 AND is_active = 1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(PostPage {
            posts,
            total: u64::try_from(total)?,
        })
    }

    fn list_safest(&self, limit: usize) -> Result<Vec<PostWithAuthor>> {
        self.query_many(
            r#"
            WHERE p.is_active = 1
            ORDER BY p.green_flags DESC, p.red_flags ASC, p.created_at DESC, p.rowid DESC
            LIMIT ?1
            "#,
            params![i64::try_from(limit)?],
        )
    }

    fn delete_cascade(&self, id: &str) -> Result<bool> {
        atomically(self.conn, |conn| {
            SqliteCommentRepository { conn }.set_active_for_post(id, false)?;
            SqliteVoteRepository { conn }.clear_target(TargetType::Post, id)?;
            let removed = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
            Ok(removed > 0)
        })
    }
}
