use super::posts::{PostView, VotesView};
use super::{respond, ApiError, ApiResult, AppState};
use crate::votes::scoring::{flag_percentages, safety_rating, safety_score, SafetyRating};
use crate::votes::{BallotKind, FlagKind, VoteOutcome};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Body of both ballot routes; posts name their target `postId`, comments
/// `commentId`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BallotRequest {
    #[serde(default)]
    post_id: Option<String>,
    #[serde(default)]
    comment_id: Option<String>,
    #[serde(default)]
    vote_type: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

impl BallotRequest {
    /// Returns `(target id, raw vote type, user id)`; all three must be present.
    pub(crate) fn require(self, target_field: &str) -> Result<(String, String, String), ApiError> {
        let target = if target_field == "postId" {
            self.post_id
        } else {
            self.comment_id
        };
        let present = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        match (present(target), present(self.vote_type), present(self.user_id)) {
            (Some(target), Some(kind), Some(user)) => Ok((target, kind, user)),
            _ => Err(ApiError::BadRequest(format!(
                "{target_field}, voteType, and userId are required"
            ))),
        }
    }
}

pub(crate) fn parse_ballot<K: BallotKind>(raw: &str) -> Result<K, ApiError> {
    K::parse(raw).ok_or_else(|| {
        ApiError::BadRequest(format!("voteType must be either {}", K::expected()))
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PostVoteResponse {
    post_id: String,
    person_name: String,
    votes: VotesView,
    flag_added: FlagKind,
    flag_changed: bool,
    safety_score: i64,
    safety_rating: SafetyRating,
}

pub(crate) async fn vote_on_post(
    State(state): State<AppState>,
    payload: Result<Json<BallotRequest>, JsonRejection>,
) -> ApiResult<PostVoteResponse> {
    let Json(request) = payload?;
    let (post_id, raw_kind, user_id) = request.require("postId")?;
    let kind: FlagKind = parse_ballot(&raw_kind)?;

    let cast = state.votes().cast(&post_id, &user_id, kind)?;
    let message = match cast.outcome {
        VoteOutcome::Duplicate => {
            return Err(ApiError::DuplicateVote(format!(
                "You have already added a {} to this post",
                kind.label().to_lowercase()
            )))
        }
        VoteOutcome::Changed { .. } => {
            format!("Flag changed to {} successfully!", kind.label().to_lowercase())
        }
        VoteOutcome::Added => format!("{} added successfully!", kind.label()),
    };

    // counters come from the ballot, the display name from the post row
    let post = state.posts().get_post(&cast.target_id)?;
    let [red, green] = cast.tally.counts();
    respond(
        message,
        PostVoteResponse {
            post_id: cast.target_id,
            person_name: post.post.person_name,
            votes: VotesView::new(red, green),
            flag_added: kind,
            flag_changed: cast.outcome.is_change(),
            safety_score: safety_score(red, green),
            safety_rating: safety_rating(red, green),
        },
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FlagCounts {
    red_flags: i64,
    green_flags: i64,
    total_flags: i64,
}

impl FlagCounts {
    fn new(red_flags: i64, green_flags: i64) -> Self {
        Self {
            red_flags,
            green_flags,
            total_flags: red_flags + green_flags,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FlagStatistics {
    red_flag_percentage: i64,
    green_flag_percentage: i64,
    safety_score: i64,
    safety_rating: SafetyRating,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PostFlagsResponse {
    post_id: String,
    person_name: String,
    flags: FlagCounts,
    statistics: FlagStatistics,
}

pub(crate) async fn post_flags(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> ApiResult<PostFlagsResponse> {
    let post = state.posts().get_post(&post_id)?.post;
    let (red, green) = (post.red_flags, post.green_flags);
    let percentages = flag_percentages(red, green);
    respond(
        "Flag statistics retrieved successfully",
        PostFlagsResponse {
            post_id: post.id,
            person_name: post.person_name,
            flags: FlagCounts::new(red, green),
            statistics: FlagStatistics {
                red_flag_percentage: percentages.red_flag_percentage,
                green_flag_percentage: percentages.green_flag_percentage,
                safety_score: safety_score(red, green),
                safety_rating: safety_rating(red, green),
            },
        },
    )
}

#[derive(Debug, Deserialize)]
pub(crate) struct SafestParams {
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SafestResponse {
    posts: Vec<PostView>,
    count: usize,
}

pub(crate) async fn safest_people(
    State(state): State<AppState>,
    params: Result<Query<SafestParams>, QueryRejection>,
) -> ApiResult<SafestResponse> {
    let Query(params) = params?;
    let posts: Vec<_> = state
        .posts()
        .list_safest(params.limit)?
        .into_iter()
        .map(PostView::from_joined)
        .collect();
    respond(
        "Safest people retrieved successfully",
        SafestResponse {
            count: posts.len(),
            posts,
        },
    )
}
