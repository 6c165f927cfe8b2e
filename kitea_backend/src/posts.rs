use crate::database::models::{PostRecord, PostWithAuthor, UserRecord};
use crate::database::repositories::{PostRepository, UserRepository};
use crate::database::Database;
use crate::error::DomainError;
use crate::photos::{PhotoStore, PhotoUpload};
use crate::utils::now_utc_iso;
use serde::Serialize;
use uuid::Uuid;

pub const FEED_LIMIT: usize = 20;
pub const DEFAULT_PAGE_SIZE: usize = 20;
/// Upper bound for `limit` on the user listing and the safest ranking.
pub const MAX_PAGE_SIZE: usize = 100;
pub const DEFAULT_SAFEST_LIMIT: usize = 20;
pub const MAX_PERSON_NAME_CHARS: usize = 50;
pub const MAX_CAPTION_CHARS: usize = 2000;

#[derive(Debug, Clone, Default)]
pub struct CreatePostInput {
    pub person_name: Option<String>,
    pub caption: Option<String>,
    pub user_id: Option<String>,
    pub photo: Option<PhotoUpload>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageStats {
    pub total_posts: u64,
    pub total_pages: u64,
    pub current_page: usize,
    pub posts_on_page: usize,
}

#[derive(Debug, Clone)]
pub struct UserPosts {
    pub user: UserRecord,
    pub stats: PageStats,
    pub posts: Vec<PostWithAuthor>,
}

#[derive(Debug, Clone)]
pub struct DeletedPost {
    pub post_id: String,
    pub person_name: String,
}

#[derive(Clone)]
pub struct PostService {
    database: Database,
    photos: PhotoStore,
}

impl PostService {
    pub fn new(database: Database, photos: PhotoStore) -> Self {
        Self { database, photos }
    }

    pub async fn create_post(&self, input: CreatePostInput) -> Result<PostRecord, DomainError> {
        let Some(photo) = input.photo else {
            return Err(DomainError::validation("Please upload a photo"));
        };
        let person_name = required_text("personName", input.person_name, MAX_PERSON_NAME_CHARS)?;
        let caption = required_text("caption", input.caption, MAX_CAPTION_CHARS)?;
        let user_id = required_text("userId", input.user_id, usize::MAX)?;

        let uploader = self
            .database
            .with_repositories(|repos| repos.users().get(&user_id))?;
        if uploader.is_none() {
            return Err(DomainError::not_found("User not found"));
        }

        let stored = self.photos.save(photo).await?;
        let now = now_utc_iso();
        let record = PostRecord {
            id: Uuid::new_v4().to_string(),
            photo: stored,
            person_name,
            caption,
            uploaded_by: user_id,
            red_flags: 0,
            green_flags: 0,
            is_active: true,
            version: 0,
            created_at: now.clone(),
            updated_at: now,
        };

        if let Err(err) = self
            .database
            .with_repositories(|repos| repos.posts().create(&record))
        {
            if let Err(cleanup) = self.photos.destroy(&record.photo.public_id).await {
                tracing::warn!(error = %cleanup, public_id = %record.photo.public_id, "orphaned photo left behind");
            }
            return Err(DomainError::Storage(err));
        }

        tracing::info!(post_id = %record.id, user_id = %record.uploaded_by, "post created");
        Ok(record)
    }

    pub fn list_feed(&self) -> Result<Vec<PostWithAuthor>, DomainError> {
        Ok(self
            .database
            .with_repositories(|repos| repos.posts().list_recent(FEED_LIMIT))?)
    }

    /// Active post with its uploader. Hard-deleted or inactive posts are not found.
    pub fn get_post(&self, post_id: &str) -> Result<PostWithAuthor, DomainError> {
        self.database
            .with_repositories(|repos| repos.posts().get_with_author(post_id))?
            .filter(|joined| joined.post.is_active)
            .ok_or_else(|| DomainError::not_found("Post not found"))
    }

    pub fn list_for_user(
        &self,
        user_id: &str,
        limit: usize,
        page: usize,
    ) -> Result<UserPosts, DomainError> {
        check_limit(limit)?;
        if page == 0 {
            return Err(DomainError::validation("page must be a positive integer"));
        }
        let (user, page_data) = self.database.with_repositories(|repos| {
            let Some(user) = repos.users().get(user_id)? else {
                return Ok((None, None));
            };
            let page_data = repos.posts().list_for_user(user_id, page, limit)?;
            Ok((Some(user), Some(page_data)))
        })?;
        let (Some(user), Some(page_data)) = (user, page_data) else {
            return Err(DomainError::not_found("User not found"));
        };

        let stats = PageStats {
            total_posts: page_data.total,
            total_pages: page_data.total.div_ceil(limit as u64),
            current_page: page,
            posts_on_page: page_data.posts.len(),
        };
        Ok(UserPosts {
            user,
            stats,
            posts: page_data.posts,
        })
    }

    /// Active posts ranked safest first. `None` uses the default limit.
    pub fn list_safest(&self, limit: Option<usize>) -> Result<Vec<PostWithAuthor>, DomainError> {
        let limit = limit.unwrap_or(DEFAULT_SAFEST_LIMIT);
        check_limit(limit)?;
        Ok(self
            .database
            .with_repositories(|repos| repos.posts().list_safest(limit))?)
    }

    /// Owner-only. Comments are deactivated and the ledger dropped in one
    /// transaction; the photo goes afterwards and may fail without undoing it.
    pub async fn delete_post(&self, post_id: &str, user_id: &str) -> Result<DeletedPost, DomainError> {
        let post = self
            .database
            .with_repositories(|repos| repos.posts().get(post_id))?
            .ok_or_else(|| DomainError::not_found("Post not found"))?;
        if post.uploaded_by != user_id {
            return Err(DomainError::forbidden("You can only delete your own posts"));
        }

        let removed = self
            .database
            .with_repositories(|repos| repos.posts().delete_cascade(post_id))?;
        if !removed {
            return Err(DomainError::not_found("Post not found"));
        }

        match self.photos.destroy(&post.photo.public_id).await {
            Ok(true) => tracing::info!(public_id = %post.photo.public_id, "post photo deleted"),
            Ok(false) => tracing::warn!(public_id = %post.photo.public_id, "post photo already gone"),
            Err(err) => tracing::warn!(error = %err, public_id = %post.photo.public_id, "could not delete post photo"),
        }
        tracing::info!(post_id, user_id, "post deleted");

        Ok(DeletedPost {
            post_id: post.id,
            person_name: post.person_name,
        })
    }
}

fn check_limit(limit: usize) -> Result<(), DomainError> {
    if (1..=MAX_PAGE_SIZE).contains(&limit) {
        Ok(())
    } else {
        Err(DomainError::validation(format!(
            "limit must be between 1 and {MAX_PAGE_SIZE}"
        )))
    }
}

/// Trims `raw` and checks it is present and at most `max_chars` long.
pub(crate) fn required_text(
    field: &str,
    raw: Option<String>,
    max_chars: usize,
) -> Result<String, DomainError> {
    let value = raw.as_deref().map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(DomainError::validation(format!("{field} is required")));
    }
    if value.chars().count() > max_chars {
        return Err(DomainError::validation(format!(
            "{field} must be at most {max_chars} characters"
        )));
    }
    Ok(value.to_string())
}
