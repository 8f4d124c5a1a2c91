pub mod auth;
pub mod errors;
pub mod files;
pub mod follow;
pub mod posts;

use askama::Template;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => html_body(body),
            Err(e) => crate::error::AppError::Template(e).into_response(),
        }
    }
}

/// A 200 HTML response around an already rendered page.
pub fn html_body(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body,
    )
        .into_response()
}

/// The whole site. Static segments win over `{username}` when both match.
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes();

    Router::new()
        .route("/", get(posts::index))
        .route("/new/", get(posts::new_post_page).post(posts::create_post))
        .route("/follow/", get(follow::follow_index))
        .route("/group/{slug}/", get(posts::group_posts))
        .merge(auth::router())
        .merge(files::router())
        .route("/{username}/", get(posts::profile))
        .route("/{username}/follow/", get(follow::profile_follow))
        .route("/{username}/unfollow/", get(follow::profile_unfollow))
        .route("/{username}/{post_id}/", get(posts::post_detail))
        .route(
            "/{username}/{post_id}/edit/",
            get(posts::edit_post_page).post(posts::update_post),
        )
        .route("/{username}/{post_id}/comment/", post(posts::add_comment))
        .fallback(errors::not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(errors::panic_response))
        .layer(middleware::from_fn(errors::render_error_pages))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
