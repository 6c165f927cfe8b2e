mod auth;
mod comments;
mod photos;
mod posts;
mod votes;

use crate::comments::CommentService;
use crate::config::KiteaConfig;
use crate::database::Database;
use crate::error::DomainError;
use crate::identity::UserService;
use crate::photos::PhotoStore;
use crate::posts::PostService;
use crate::votes::VoteService;
use anyhow::Result;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Room for the multipart framing and text fields around the photo itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: KiteaConfig,
    pub database: Database,
    pub photos: PhotoStore,
}

impl AppState {
    pub fn new(config: KiteaConfig, database: Database) -> Self {
        let photos = PhotoStore::new(&config);
        Self {
            config,
            database,
            photos,
        }
    }

    fn users(&self) -> UserService {
        UserService::new(self.database.clone())
    }

    fn posts(&self) -> PostService {
        PostService::new(self.database.clone(), self.photos.clone())
    }

    fn comments(&self) -> CommentService {
        CommentService::new(self.database.clone())
    }

    fn votes(&self) -> VoteService {
        VoteService::new(self.database.clone())
    }
}

/// Success body shared by every route.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub(crate) type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

pub(crate) fn respond<T>(message: impl Into<String>, data: T) -> ApiResult<T> {
    Ok(Json(Envelope {
        success: true,
        message: message.into(),
        data: Some(data),
    }))
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Forbidden(String),
    Unauthorized(String),
    /// Same ballot cast twice: a client mistake rather than a failure.
    DuplicateVote(String),
    Internal(anyhow::Error),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    already_voted: Option<bool>,
}

impl ErrorResponse {
    fn new(message: String) -> Self {
        Self {
            success: false,
            message,
            error: None,
            already_voted: None,
        }
    }
}

impl ApiError {
    fn into_response_parts(self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse::new(msg)),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse::new(msg)),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, ErrorResponse::new(msg)),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, ErrorResponse::new(msg)),
            ApiError::DuplicateVote(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    already_voted: Some(true),
                    ..ErrorResponse::new(msg)
                },
            ),
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: Some(format!("{err:#}")),
                        ..ErrorResponse::new("Internal server error".into())
                    },
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.into_response_parts();
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => ApiError::BadRequest(msg),
            DomainError::NotFound(msg) => ApiError::NotFound(msg),
            DomainError::Forbidden(msg) => ApiError::Forbidden(msg),
            DomainError::Unauthorized(msg) => ApiError::Unauthorized(msg),
            DomainError::Storage(err) => ApiError::Internal(err),
            conflict @ DomainError::Conflict { .. } => ApiError::Internal(conflict.into()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(format!("malformed multipart body: {err}"))
    }
}

/// Tries to bind to the given port, or finds the next available port
async fn find_available_port(start_port: u16) -> Result<(TcpListener, u16)> {
    const MAX_PORT_ATTEMPTS: u16 = 100;

    for offset in 0..MAX_PORT_ATTEMPTS {
        let port = start_port.saturating_add(offset);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok((listener, port)),
            Err(e) => {
                if offset == 0 {
                    tracing::debug!(port, error = %e, "Port in use, trying next port");
                }
                continue;
            }
        }
    }

    anyhow::bail!(
        "Could not find available port in range {}-{}",
        start_port,
        start_port.saturating_add(MAX_PORT_ATTEMPTS - 1)
    )
}

pub fn router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.photos.max_upload_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let api = Router::new()
        .route("/auth/create-user", post(auth::create_user))
        .route("/auth/login", post(auth::login))
        .route("/posts", get(posts::list_feed))
        .route("/posts/create", post(posts::create_post))
        .route("/posts/delete", delete(posts::delete_post))
        .route("/posts/user/:user_id", get(posts::list_user_posts))
        .route("/comments/create", post(comments::create_comment))
        .route("/comments/post/:post_id", get(comments::list_comments))
        .route("/comments/vote", post(comments::vote_on_comment))
        .route("/comments/delete", delete(comments::delete_comment))
        .route("/votes/post", post(votes::vote_on_post))
        .route("/votes/post/:post_id", get(votes::post_flags))
        .route("/votes/safest", get(votes::safest_people))
        .route("/photos/:public_id", get(photos::get_photo));

    Router::new()
        .route("/", get(welcome))
        .route("/health", get(health))
        .nest("/api", api)
        .fallback(route_not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn serve_http(config: KiteaConfig, database: Database) -> Result<()> {
    let state = AppState::new(config.clone(), database);
    let router = router(state);

    // Try to bind to the configured port, or find the next available port
    let (listener, actual_port) = find_available_port(config.api_port).await?;
    let addr = SocketAddr::from(([0, 0, 0, 0], actual_port));

    if actual_port != config.api_port {
        tracing::warn!(
            requested_port = config.api_port,
            actual_port = actual_port,
            "Configured port was in use, bound to next available port"
        );
    }

    tracing::info!(?addr, "HTTP server listening");
    axum::serve(listener, router.into_make_service()).await?;
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    api_port: u16,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        api_port: state.config.api_port,
    })
}

async fn welcome() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Kitea API",
        "endpoints": {
            "createUser": "POST /api/auth/create-user",
            "login": "POST /api/auth/login",
            "createPost": "POST /api/posts/create",
            "getAllPosts": "GET /api/posts",
            "getUserPosts": "GET /api/posts/user/:userId",
            "deletePost": "DELETE /api/posts/delete",
            "createComment": "POST /api/comments/create",
            "getComments": "GET /api/comments/post/:postId",
            "voteOnComment": "POST /api/comments/vote",
            "deleteComment": "DELETE /api/comments/delete",
            "flagPerson": "POST /api/votes/post",
            "getPersonFlags": "GET /api/votes/post/:postId",
            "getSafestPeople": "GET /api/votes/safest",
            "getPhoto": "GET /api/photos/:publicId",
        },
    }))
}

async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("Route {uri} not found"))
}
