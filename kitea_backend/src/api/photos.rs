use super::{ApiError, AppState};
use anyhow::Context;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::response::Response;
use tokio::fs::File as TokioFile;
use tokio_util::io::ReaderStream;

pub(crate) async fn get_photo(
    State(state): State<AppState>,
    Path(public_id): Path<String>,
) -> Result<Response, ApiError> {
    let Some(photo) = state.photos.open(&public_id).await? else {
        return Err(ApiError::NotFound("Photo not found".into()));
    };

    let file = TokioFile::open(&photo.absolute_path)
        .await
        .with_context(|| format!("unable to open {}", photo.absolute_path.display()))?;
    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&photo.mime) {
        headers.insert(CONTENT_TYPE, value);
    }
    headers.insert(CONTENT_LENGTH, HeaderValue::from(photo.size_bytes));
    // public ids are never reused
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );
    Ok(response)
}
