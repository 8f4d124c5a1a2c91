use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use rust_embed::Embed;

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::uploads;

#[derive(Embed)]
#[folder = "assets/"]
struct Assets;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/assets/{*path}", get(asset))
        .route("/media/{*path}", get(media))
}

fn file_response(path: &str, data: Vec<u8>, cache_secs: u32) -> Response {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime.as_ref().to_string()),
            (header::CACHE_CONTROL, format!("public, max-age={}", cache_secs)),
        ],
        data,
    )
        .into_response()
}

/// Stylesheet and other files compiled into the binary.
async fn asset(Path(path): Path<String>) -> AppResult<Response> {
    let file = Assets::get(&path).ok_or(AppError::NotFound)?;
    Ok(file_response(&path, file.data.to_vec(), 86400))
}

/// Uploaded post images.
async fn media(State(state): State<AppState>, Path(path): Path<String>) -> AppResult<Response> {
    let full = uploads::resolve(&state.config.uploads_path(), &path).ok_or(AppError::NotFound)?;
    match tokio::fs::read(&full).await {
        Ok(data) => Ok(file_response(&path, data, 3600)),
        Err(e) => {
            tracing::debug!(path = %path, "Media file unavailable: {}", e);
            Err(AppError::NotFound)
        }
    }
}
