use super::posts::AuthorView;
use super::votes::{parse_ballot, BallotRequest};
use super::{respond, ApiError, ApiResult, AppState};
use crate::comments::CreateCommentInput;
use crate::database::models::CommentWithAuthor;
use crate::votes::scoring::{comment_engagement, comment_score};
use crate::votes::{BallotKind, CommentVoteKind, VoteOutcome};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommentView {
    comment_id: String,
    post_id: String,
    content: String,
    commenter: AuthorView,
    upvotes: i64,
    downvotes: i64,
    score: i64,
    total_engagement: i64,
    created_at: String,
}

impl CommentView {
    fn from_joined(joined: CommentWithAuthor) -> Self {
        let CommentWithAuthor { comment, author } = joined;
        Self {
            commenter: AuthorView::new(&comment.commenter_id, author),
            score: comment_score(comment.upvotes, comment.downvotes),
            total_engagement: comment_engagement(comment.upvotes, comment.downvotes),
            comment_id: comment.id,
            post_id: comment.post_id,
            content: comment.content,
            upvotes: comment.upvotes,
            downvotes: comment.downvotes,
            created_at: comment.created_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateCommentRequest {
    #[serde(default)]
    post_id: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

pub(crate) async fn create_comment(
    State(state): State<AppState>,
    payload: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> ApiResult<CommentView> {
    let Json(request) = payload?;
    let created = state.comments().create(CreateCommentInput {
        post_id: request.post_id,
        content: request.content,
        user_id: request.user_id,
    })?;
    respond("Comment added successfully!", CommentView::from_joined(created))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommentListResponse {
    post_id: String,
    comment_count: usize,
    comments: Vec<CommentView>,
}

pub(crate) async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> ApiResult<CommentListResponse> {
    let comments = state.comments().list_for_post(&post_id)?;
    let comments: Vec<_> = comments.into_iter().map(CommentView::from_joined).collect();
    respond(
        "Comments retrieved successfully",
        CommentListResponse {
            post_id,
            comment_count: comments.len(),
            comments,
        },
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommentVoteResponse {
    comment_id: String,
    upvotes: i64,
    downvotes: i64,
    score: i64,
    total_engagement: i64,
    vote_added: CommentVoteKind,
    vote_changed: bool,
}

pub(crate) async fn vote_on_comment(
    State(state): State<AppState>,
    payload: Result<Json<BallotRequest>, JsonRejection>,
) -> ApiResult<CommentVoteResponse> {
    let Json(request) = payload?;
    let (comment_id, raw_kind, user_id) = request.require("commentId")?;
    let kind: CommentVoteKind = parse_ballot(&raw_kind)?;

    let cast = state.votes().cast(&comment_id, &user_id, kind)?;
    let message = match cast.outcome {
        VoteOutcome::Duplicate => {
            return Err(ApiError::DuplicateVote(format!(
                "You have already {}d this comment",
                kind.as_str()
            )))
        }
        VoteOutcome::Changed { .. } => format!("Vote changed to {} successfully!", kind.as_str()),
        VoteOutcome::Added => format!("Comment {}d successfully!", kind.as_str()),
    };
    let [upvotes, downvotes] = cast.tally.counts();
    respond(
        message,
        CommentVoteResponse {
            comment_id: cast.target_id,
            upvotes,
            downvotes,
            score: comment_score(upvotes, downvotes),
            total_engagement: comment_engagement(upvotes, downvotes),
            vote_added: kind,
            vote_changed: cast.outcome.is_change(),
        },
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeleteCommentRequest {
    #[serde(default)]
    comment_id: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeletedCommentResponse {
    deleted_comment_id: String,
    post_id: String,
}

pub(crate) async fn delete_comment(
    State(state): State<AppState>,
    payload: Result<Json<DeleteCommentRequest>, JsonRejection>,
) -> ApiResult<DeletedCommentResponse> {
    let Json(request) = payload?;
    let (Some(comment_id), Some(user_id)) = (request.comment_id, request.user_id) else {
        return Err(ApiError::BadRequest(
            "commentId and userId are required".into(),
        ));
    };
    let deleted = state.comments().delete(&comment_id, &user_id)?;
    respond(
        "Comment permanently deleted",
        DeletedCommentResponse {
            deleted_comment_id: deleted.comment_id,
            post_id: deleted.post_id,
        },
    )
}
