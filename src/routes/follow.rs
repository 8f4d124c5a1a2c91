use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::Response;

use crate::db::follows;
use crate::db::models::PostView;
use crate::db::posts::PostFilter;
use crate::db::users;
use crate::error::{found, AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::pagination::{Page, PageQuery};
use crate::routes::posts::feed_page;
use crate::routes::Html;
use crate::state::AppState;

pub const FOLLOW_PAGE_SIZE: i64 = 10;

#[derive(Template)]
#[template(path = "pages/follow.html")]
pub struct FollowTemplate {
    pub viewer: Option<String>,
    pub page: Page<PostView>,
}

/// GET /follow/: posts by everyone the caller follows
pub async fn follow_index(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<FollowTemplate>> {
    let conn = state.db.get()?;
    let page = feed_page(
        &conn,
        PostFilter::FollowedBy(user.id),
        query.requested(),
        FOLLOW_PAGE_SIZE,
    )?;
    Ok(Html(FollowTemplate {
        viewer: Some(user.username),
        page,
    }))
}

/// GET /{username}/follow/
pub async fn profile_follow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let author = users::find_by_username(&conn, &username)?.ok_or(AppError::NotFound)?;

    if author.id != user.id {
        let created = follows::follow(&conn, user.id, author.id)?;
        tracing::info!(follower = %user.username, author = %author.username, created, "Follow");
    }

    Ok(found(&format!("/{}/", author.username)))
}

/// GET /{username}/unfollow/
pub async fn profile_unfollow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let author = users::find_by_username(&conn, &username)?.ok_or(AppError::NotFound)?;

    if !follows::unfollow(&conn, user.id, author.id)? {
        return Err(AppError::NotFound);
    }
    tracing::info!(follower = %user.username, author = %author.username, "Unfollow");

    Ok(found(&format!("/{}/", author.username)))
}
