use std::any::Any;

use askama::Template;
use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::{AppError, ErrorPage};

#[derive(Template)]
#[template(path = "pages/error.html")]
pub struct ErrorTemplate {
    pub viewer: Option<String>,
    pub code: u16,
    pub title: &'static str,
    pub path: Option<String>,
}

/// Router fallback for paths nothing matches.
pub async fn not_found() -> AppError {
    AppError::NotFound
}

pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| err.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());
    AppError::Internal(format!("Handler panicked: {detail}")).into_response()
}

/// Replaces tagged 404/500 responses with the error templates.
pub async fn render_error_pages(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let response = next.run(req).await;

    let Some(kind) = response.extensions().get::<ErrorPage>().copied() else {
        return response;
    };

    let (status, template) = match kind {
        ErrorPage::NotFound => (
            StatusCode::NOT_FOUND,
            ErrorTemplate {
                viewer: None,
                code: 404,
                title: "Page not found",
                path: Some(path),
            },
        ),
        ErrorPage::ServerError => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorTemplate {
                viewer: None,
                code: 500,
                title: "Server error",
                path: None,
            },
        ),
    };

    match template.render() {
        Ok(body) => (
            status,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Error page render failed: {}", e);
            response
        }
    }
}
