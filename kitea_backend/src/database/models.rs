use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub user_count: i64,
    pub username: String,
    /// Plaintext secret; never serialized into responses except at creation.
    #[serde(skip_serializing)]
    pub password: String,
    pub is_active: bool,
    pub comments_posted: i64,
    pub total_upvotes: i64,
    pub total_downvotes: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

/// Public face of a user attached to posts and comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub user_count: i64,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    pub url: String,
    pub public_id: String,
    /// Sniffed from the stored bytes, not the declared upload type.
    pub mime: String,
    pub size_bytes: i64,
    /// `blake3:<hex>` of the stored bytes.
    pub checksum: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    pub photo: PhotoRecord,
    pub person_name: String,
    pub caption: String,
    pub uploaded_by: String,
    pub red_flags: i64,
    pub green_flags: i64,
    pub is_active: bool,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl PostRecord {
    pub fn total_votes(&self) -> i64 {
        self.red_flags + self.green_flags
    }
}

/// A post joined with its uploader, as listed in feeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostWithAuthor {
    pub post: PostRecord,
    pub author: Option<UserSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    pub post_id: String,
    pub commenter_id: String,
    pub content: String,
    pub upvotes: i64,
    pub downvotes: i64,
    pub is_active: bool,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentWithAuthor {
    pub comment: CommentRecord,
    pub author: Option<UserSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostPage {
    pub posts: Vec<PostWithAuthor>,
    pub total: u64,
}
