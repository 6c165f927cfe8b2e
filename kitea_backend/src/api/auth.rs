use super::{respond, ApiError, ApiResult, AppState};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreatedUserResponse {
    user_id: String,
    user_count: i64,
    username: String,
    password: String,
    created_at: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LoginRequest {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginResponse {
    user_id: String,
    user_count: i64,
    username: String,
    is_active: bool,
    comments_posted: i64,
    total_upvotes: i64,
    total_downvotes: i64,
}

pub(crate) async fn create_user(State(state): State<AppState>) -> ApiResult<CreatedUserResponse> {
    let user = state.users().create_user()?;
    respond(
        "User created successfully",
        CreatedUserResponse {
            user_id: user.id,
            user_count: user.user_count,
            username: user.username,
            password: user.password,
            created_at: user.created_at,
        },
    )
}

pub(crate) async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let Json(request) = payload?;
    let (Some(username), Some(password)) = (request.username, request.password) else {
        return Err(ApiError::BadRequest(
            "username and password are required".into(),
        ));
    };
    let user = state.users().login(&username, &password)?;
    tracing::debug!(user_id = %user.id, "login succeeded");
    respond(
        "Login successful",
        LoginResponse {
            user_id: user.id,
            user_count: user.user_count,
            username: user.username,
            is_active: user.is_active,
            comments_posted: user.comments_posted,
            total_upvotes: user.total_upvotes,
            total_downvotes: user.total_downvotes,
        },
    )
}
