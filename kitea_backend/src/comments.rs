use crate::database::models::{CommentRecord, CommentWithAuthor};
use crate::database::repositories::{CommentRepository, PostRepository, UserRepository};
use crate::database::Database;
use crate::error::DomainError;
use crate::posts::required_text;
use crate::utils::now_utc_iso;
use uuid::Uuid;

pub const COMMENT_LIST_LIMIT: usize = 50;
pub const MAX_COMMENT_CHARS: usize = 300;

#[derive(Debug, Clone, Default)]
pub struct CreateCommentInput {
    pub post_id: Option<String>,
    pub content: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DeletedComment {
    pub comment_id: String,
    pub post_id: String,
}

#[derive(Clone)]
pub struct CommentService {
    database: Database,
}

impl CommentService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn create(&self, input: CreateCommentInput) -> Result<CommentWithAuthor, DomainError> {
        let (Some(post_id), Some(content), Some(user_id)) = (
            non_blank(input.post_id),
            non_blank(input.content),
            non_blank(input.user_id),
        ) else {
            return Err(DomainError::validation(
                "postId, content, and userId are required",
            ));
        };
        let content = required_text("content", Some(content), MAX_COMMENT_CHARS)?;

        let now = now_utc_iso();
        let record = CommentRecord {
            id: Uuid::new_v4().to_string(),
            post_id,
            commenter_id: user_id,
            content,
            upvotes: 0,
            downvotes: 0,
            is_active: true,
            version: 0,
            created_at: now.clone(),
            updated_at: now,
        };

        let created = self.database.with_repositories(|repos| {
            let post_active = repos
                .posts()
                .get(&record.post_id)?
                .map(|post| post.is_active)
                .unwrap_or(false);
            if !post_active {
                return Ok(Err(DomainError::not_found("Post not found")));
            }
            if repos.users().get(&record.commenter_id)?.is_none() {
                return Ok(Err(DomainError::not_found("User not found")));
            }
            repos.transaction(|repos| {
                repos.comments().create(&record)?;
                repos.users().increment_comments_posted(&record.commenter_id, 1)
            })?;
            Ok(Ok(repos.comments().get_with_author(&record.id)?))
        })??;

        let created = created.ok_or_else(|| {
            DomainError::Storage(anyhow::anyhow!("comment {} vanished after insert", record.id))
        })?;
        tracing::info!(comment_id = %record.id, post_id = %record.post_id, "comment created");
        Ok(created)
    }

    /// Up to [`COMMENT_LIST_LIMIT`] active comments, newest first.
    pub fn list_for_post(&self, post_id: &str) -> Result<Vec<CommentWithAuthor>, DomainError> {
        let listed = self.database.with_repositories(|repos| {
            if repos.posts().get(post_id)?.is_none() {
                return Ok(None);
            }
            Ok(Some(repos.comments().list_for_post(post_id, COMMENT_LIST_LIMIT)?))
        })?;
        listed.ok_or_else(|| DomainError::not_found("Post not found"))
    }

    /// Owner-only hard delete; also removes the comment's ledger, takes its
    /// votes off the author's received totals and one off `commentsPosted`.
    pub fn delete(&self, comment_id: &str, user_id: &str) -> Result<DeletedComment, DomainError> {
        let comment = self
            .database
            .with_repositories(|repos| repos.comments().get(comment_id))?
            .ok_or_else(|| DomainError::not_found("Comment not found"))?;
        if comment.commenter_id != user_id {
            return Err(DomainError::forbidden("You can only delete your own comments"));
        }

        self.database.with_repositories(|repos| {
            repos.transaction(|repos| {
                repos.comments().delete(comment_id)?;
                repos.users().increment_comments_posted(user_id, -1)
            })
        })?;
        tracing::info!(comment_id, user_id, "comment deleted");

        Ok(DeletedComment {
            comment_id: comment.id,
            post_id: comment.post_id,
        })
    }
}

fn non_blank(raw: Option<String>) -> Option<String> {
    raw.filter(|value| !value.trim().is_empty())
}
