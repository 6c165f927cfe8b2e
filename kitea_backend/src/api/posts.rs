use super::{respond, ApiError, ApiResult, AppState};
use crate::database::models::{PhotoRecord, PostRecord, PostWithAuthor, UserSummary};
use crate::photos::PhotoUpload;
use crate::posts::{CreatePostInput, PageStats, DEFAULT_PAGE_SIZE};
use crate::votes::scoring::{safety_rating, safety_score, SafetyRating};
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuthorView {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl AuthorView {
    /// Falls back to the bare id when the user row is gone.
    pub(crate) fn new(user_id: &str, summary: Option<UserSummary>) -> Self {
        match summary {
            Some(summary) => Self {
                user_id: summary.id,
                user_count: Some(summary.user_count),
                username: Some(summary.username),
            },
            None => Self {
                user_id: user_id.to_string(),
                user_count: None,
                username: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VotesView {
    pub red_flags: i64,
    pub green_flags: i64,
    pub total_votes: i64,
}

impl VotesView {
    pub(crate) fn new(red_flags: i64, green_flags: i64) -> Self {
        Self {
            red_flags,
            green_flags,
            total_votes: red_flags + green_flags,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PostView {
    pub post_id: String,
    pub person_name: String,
    pub caption: String,
    pub photo: PhotoRecord,
    pub uploaded_by: AuthorView,
    pub votes: VotesView,
    pub safety_score: i64,
    pub safety_rating: SafetyRating,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl PostView {
    pub(crate) fn from_joined(joined: PostWithAuthor) -> Self {
        let PostWithAuthor { post, author } = joined;
        let uploaded_by = AuthorView::new(&post.uploaded_by, author);
        Self::build(post, uploaded_by)
    }

    fn build(post: PostRecord, uploaded_by: AuthorView) -> Self {
        Self {
            votes: VotesView::new(post.red_flags, post.green_flags),
            safety_score: safety_score(post.red_flags, post.green_flags),
            safety_rating: safety_rating(post.red_flags, post.green_flags),
            post_id: post.id,
            person_name: post.person_name,
            caption: post.caption,
            photo: post.photo,
            uploaded_by,
            is_active: post.is_active,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

pub(crate) async fn create_post(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<PostView> {
    let mut multipart = multipart?;
    let mut input = CreatePostInput::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "photo" => {
                let file_name = field.file_name().map(|s| s.to_string());
                let mime = field.content_type().map(|s| s.to_string());
                let data = field.bytes().await?;
                tracing::debug!(size = data.len(), "photo field received");
                input.photo = Some(PhotoUpload {
                    data,
                    mime,
                    file_name,
                });
            }
            "personName" => input.person_name = Some(field.text().await?),
            "caption" => input.caption = Some(field.text().await?),
            "userId" => input.user_id = Some(field.text().await?),
            other => tracing::debug!(field = other, "ignored field in post upload"),
        }
    }

    let post = state.posts().create_post(input).await?;
    let author = state.users().get_user(&post.uploaded_by)?.map(|user| UserSummary {
        id: user.id,
        user_count: user.user_count,
        username: user.username,
    });
    let uploaded_by = AuthorView::new(&post.uploaded_by, author);
    respond("Post created successfully!", PostView::build(post, uploaded_by))
}

pub(crate) async fn list_feed(State(state): State<AppState>) -> ApiResult<Vec<PostView>> {
    let posts = state.posts().list_feed()?;
    respond(
        "Posts retrieved successfully",
        posts.into_iter().map(PostView::from_joined).collect(),
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeletePostRequest {
    #[serde(default)]
    post_id: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeletedPostResponse {
    deleted_post_id: String,
    person_name: String,
}

pub(crate) async fn delete_post(
    State(state): State<AppState>,
    payload: Result<Json<DeletePostRequest>, JsonRejection>,
) -> ApiResult<DeletedPostResponse> {
    let Json(request) = payload?;
    let (Some(post_id), Some(user_id)) = (request.post_id, request.user_id) else {
        return Err(ApiError::BadRequest("postId and userId are required".into()));
    };
    let deleted = state.posts().delete_post(&post_id, &user_id).await?;
    respond(
        "Post and associated comments deleted successfully",
        DeletedPostResponse {
            deleted_post_id: deleted.post_id,
            person_name: deleted.person_name,
        },
    )
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserPostsParams {
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    page: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserInfo {
    user_id: String,
    username: String,
    user_count: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserPostsResponse {
    user: UserInfo,
    stats: PageStats,
    posts: Vec<PostView>,
}

pub(crate) async fn list_user_posts(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    params: Result<Query<UserPostsParams>, QueryRejection>,
) -> ApiResult<UserPostsResponse> {
    let Query(params) = params?;
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let page = params.page.unwrap_or(1);
    let listing = state.posts().list_for_user(&user_id, limit, page)?;
    respond(
        "User posts retrieved successfully",
        UserPostsResponse {
            user: UserInfo {
                user_id: listing.user.id,
                username: listing.user.username,
                user_count: listing.user.user_count,
            },
            stats: listing.stats,
            posts: listing.posts.into_iter().map(PostView::from_joined).collect(),
        },
    )
}
