use askama::Template;
use axum::extract::{Multipart, Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Form;
use rusqlite::Connection;

use crate::cache::PageCache;
use crate::db::models::{CommentView, Group, PostView, User};
use crate::db::posts::{self, NewPost, PostFilter};
use crate::db::users::{self, AuthorStats};
use crate::db::{comments, follows, groups};
use crate::error::{found, login_redirect_target, AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::forms::{CommentInput, FieldErrors, PostInput, PostSubmission};
use crate::pagination::{Page, PageQuery, PageWindow};
use crate::routes::{html_body, Html};
use crate::state::AppState;
use crate::uploads;

pub const INDEX_PAGE_SIZE: i64 = 10;
pub const GROUP_PAGE_SIZE: i64 = 4;
pub const PROFILE_PAGE_SIZE: i64 = 5;

// --- Templates ---

#[derive(Template)]
#[template(path = "pages/index.html")]
pub struct IndexTemplate {
    pub viewer: Option<String>,
    pub page: Page<PostView>,
}

#[derive(Template)]
#[template(path = "pages/group.html")]
pub struct GroupTemplate {
    pub viewer: Option<String>,
    pub group: Group,
    pub page: Page<PostView>,
}

#[derive(Template)]
#[template(path = "pages/profile.html")]
pub struct ProfileTemplate {
    pub viewer: Option<String>,
    pub author: User,
    pub stats: AuthorStats,
    pub following: bool,
    pub can_follow: bool,
    pub page: Page<PostView>,
}

#[derive(Template)]
#[template(path = "pages/post.html")]
pub struct PostTemplate {
    pub viewer: Option<String>,
    pub post: PostView,
    pub stats: AuthorStats,
    pub comments: Vec<CommentView>,
    pub is_author: bool,
    pub comment_text: String,
    pub errors: FieldErrors,
    pub login_url: String,
}

#[derive(Template)]
#[template(path = "pages/post_form.html")]
pub struct PostFormTemplate {
    pub viewer: Option<String>,
    pub form: PostInput,
    pub errors: FieldErrors,
    pub groups: Vec<Group>,
    /// Set when editing: where the form posts and the image already attached.
    pub editing: Option<EditTarget>,
    pub min_text_len: usize,
}

pub struct EditTarget {
    pub action: String,
    pub detail_url: String,
    pub image: Option<String>,
}

// --- Query helpers ---

/// One page of a feed: count, clamp the requested page, fetch its rows.
pub fn feed_page(
    conn: &Connection,
    filter: PostFilter,
    requested: i64,
    per_page: i64,
) -> rusqlite::Result<Page<PostView>> {
    let total = posts::count(conn, filter)?;
    let window = PageWindow::new(requested, total, per_page);
    let items = posts::list(conn, filter, window.limit(), window.offset())?;
    Ok(window.fill(items))
}

/// Post ids in paths that are not integers simply do not exist.
fn parse_post_id(raw: &str) -> AppResult<i64> {
    raw.parse().map_err(|_| AppError::NotFound)
}

fn load_post(conn: &Connection, username: &str, post_id: &str) -> AppResult<PostView> {
    let post_id = parse_post_id(post_id)?;
    posts::get_for_author(conn, username, post_id)?.ok_or(AppError::NotFound)
}

fn detail_url(username: &str, post_id: i64) -> String {
    format!("/{}/{}/", username, post_id)
}

fn render_detail(
    conn: &Connection,
    viewer: Option<&CurrentUser>,
    post: PostView,
    comment_text: String,
    errors: FieldErrors,
) -> AppResult<Html<PostTemplate>> {
    let stats = users::stats(conn, post.author_id)?;
    let comments = comments::for_post(conn, post.id)?;
    let is_author = viewer.is_some_and(|v| v.id == post.author_id);
    let login_url = login_redirect_target(&post.detail_url());
    Ok(Html(PostTemplate {
        viewer: viewer.map(|v| v.username.clone()),
        post,
        stats,
        comments,
        is_author,
        comment_text,
        errors,
        login_url,
    }))
}

// --- Feeds ---

/// GET /: served from the page cache when possible
pub async fn index(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let requested = query.requested();
    let key = PageCache::index_key(requested, maybe_user.id());
    let generation = state.page_cache.generation();
    if let Some(body) = state.page_cache.get(&key).await {
        return Ok(html_body(body.as_str().to_owned()));
    }

    let page = {
        let conn = state.db.get()?;
        feed_page(&conn, PostFilter::All, requested, INDEX_PAGE_SIZE)?
    };
    let body = IndexTemplate {
        viewer: maybe_user.username(),
        page,
    }
    .render()?;

    state.page_cache.insert(generation, &key, body.clone()).await;
    Ok(html_body(body))
}

/// GET /group/{slug}/
pub async fn group_posts(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<GroupTemplate>> {
    let conn = state.db.get()?;
    let group = groups::find_by_slug(&conn, &slug)?.ok_or(AppError::NotFound)?;
    let page = feed_page(
        &conn,
        PostFilter::Group(group.id),
        query.requested(),
        GROUP_PAGE_SIZE,
    )?;

    Ok(Html(GroupTemplate {
        viewer: maybe_user.username(),
        group,
        page,
    }))
}

/// GET /{username}/
pub async fn profile(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<ProfileTemplate>> {
    let conn = state.db.get()?;
    let author = users::find_by_username(&conn, &username)?.ok_or(AppError::NotFound)?;
    let stats = users::stats(&conn, author.id)?;
    let page = feed_page(
        &conn,
        PostFilter::Author(author.id),
        query.requested(),
        PROFILE_PAGE_SIZE,
    )?;

    let (following, can_follow) = match &maybe_user.0 {
        Some(viewer) if viewer.id != author.id => {
            (follows::is_following(&conn, viewer.id, author.id)?, true)
        }
        _ => (false, false),
    };

    Ok(Html(ProfileTemplate {
        viewer: maybe_user.username(),
        author,
        stats,
        following,
        can_follow,
        page,
    }))
}

/// GET /{username}/{post_id}/
pub async fn post_detail(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Path((username, post_id)): Path<(String, String)>,
) -> AppResult<Html<PostTemplate>> {
    let conn = state.db.get()?;
    let post = load_post(&conn, &username, &post_id)?;
    render_detail(
        &conn,
        maybe_user.0.as_ref(),
        post,
        String::new(),
        FieldErrors::default(),
    )
}

// --- Writing posts ---

/// GET /new/
pub async fn new_post_page(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Html<PostFormTemplate>> {
    let conn = state.db.get()?;
    Ok(Html(PostFormTemplate {
        viewer: Some(user.username),
        form: PostInput::default(),
        errors: FieldErrors::default(),
        groups: groups::list(&conn)?,
        editing: None,
        min_text_len: state.config.posts.min_text_len,
    }))
}

/// POST /new/: create a post owned by the caller
pub async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let submission = PostSubmission::from_multipart(multipart).await?;
    let min_text_len = state.config.posts.min_text_len;

    let all_groups = {
        let conn = state.db.get()?;
        groups::list(&conn)?
    };
    let valid = match submission.input.validate(min_text_len, &all_groups) {
        Ok(valid) => valid,
        Err(errors) => {
            return Ok(Html(PostFormTemplate {
                viewer: Some(user.username),
                form: submission.input,
                errors,
                groups: all_groups,
                editing: None,
                min_text_len,
            })
            .into_response());
        }
    };

    let image = match submission.image {
        Some(upload) => uploads::store_image(&state.config.uploads_path(), upload).await?,
        None => None,
    };

    let created = state.db.get().map_err(AppError::from).and_then(|conn| {
        posts::create(
            &conn,
            &NewPost {
                author_id: user.id,
                text: &valid.text,
                group_id: valid.group_id,
                image: image.as_deref(),
            },
        )
        .map_err(AppError::from)
    });
    let post_id = match created {
        Ok(id) => id,
        Err(e) => {
            if let Some(path) = &image {
                uploads::remove_image(&state.config.uploads_path(), path).await;
            }
            return Err(e);
        }
    };
    state.page_cache.clear();

    tracing::info!(post_id, author = %user.username, group_id = ?valid.group_id, has_image = image.is_some(), "Post created");
    Ok(found("/"))
}

/// GET /{username}/{post_id}/edit/
pub async fn edit_post_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((username, post_id)): Path<(String, String)>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let post = load_post(&conn, &username, &post_id)?;
    if post.author_id != user.id {
        return Ok(found(&post.detail_url()));
    }

    let stored = posts::find(&conn, post.id)?.ok_or(AppError::NotFound)?;
    let form = PostInput {
        text: stored.text,
        group: stored.group_id.map(|id| id.to_string()).unwrap_or_default(),
    };

    Ok(Html(PostFormTemplate {
        viewer: Some(user.username),
        form,
        errors: FieldErrors::default(),
        groups: groups::list(&conn)?,
        editing: Some(EditTarget {
            action: format!("{}edit/", post.detail_url()),
            detail_url: post.detail_url(),
            image: stored.image,
        }),
        min_text_len: state.config.posts.min_text_len,
    })
    .into_response())
}

/// POST /{username}/{post_id}/edit/: only the author may save
pub async fn update_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((username, post_id)): Path<(String, String)>,
    multipart: Multipart,
) -> AppResult<Response> {
    let min_text_len = state.config.posts.min_text_len;
    let (post, stored, all_groups) = {
        let conn = state.db.get()?;
        let post = load_post(&conn, &username, &post_id)?;
        if post.author_id != user.id {
            tracing::warn!(post_id = post.id, caller = %user.username, "Edit by non-author refused");
            return Ok(found(&post.detail_url()));
        }
        let stored = posts::find(&conn, post.id)?.ok_or(AppError::NotFound)?;
        (post, stored, groups::list(&conn)?)
    };

    let submission = PostSubmission::from_multipart(multipart).await?;
    let valid = match submission.input.validate(min_text_len, &all_groups) {
        Ok(valid) => valid,
        Err(errors) => {
            return Ok(Html(PostFormTemplate {
                viewer: Some(user.username),
                form: submission.input,
                errors,
                groups: all_groups,
                editing: Some(EditTarget {
                    action: format!("{}edit/", post.detail_url()),
                    detail_url: post.detail_url(),
                    image: stored.image,
                }),
                min_text_len,
            })
            .into_response());
        }
    };

    // A bad new upload keeps whatever was attached before.
    let uploaded = match submission.image {
        Some(upload) => uploads::store_image(&state.config.uploads_path(), upload).await?,
        None => None,
    };
    let image = match &uploaded {
        Some(path) => Some(path.clone()),
        None if submission.clear_image => None,
        None => stored.image.clone(),
    };

    let media_root = state.config.uploads_path();
    let saved = state.db.get().map_err(AppError::from).and_then(|conn| {
        posts::update(&conn, post.id, &valid.text, valid.group_id, image.as_deref())
            .map_err(AppError::from)
    });
    if let Err(e) = saved {
        if let Some(path) = &uploaded {
            uploads::remove_image(&media_root, path).await;
        }
        return Err(e);
    }
    state.page_cache.clear();

    // The previous file is unreferenced once it was replaced or cleared.
    if let Some(old) = stored.image.as_deref() {
        if image.as_deref() != Some(old) {
            uploads::remove_image(&media_root, old).await;
        }
    }

    tracing::info!(post_id = post.id, author = %user.username, "Post edited");
    Ok(found(&detail_url(&post.author_username, post.id)))
}

// --- Comments ---

/// POST /{username}/{post_id}/comment/
pub async fn add_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((username, post_id)): Path<(String, String)>,
    Form(form): Form<CommentInput>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let post = load_post(&conn, &username, &post_id)?;

    let text = match form.validate() {
        Ok(text) => text,
        Err(errors) => {
            return Ok(render_detail(&conn, Some(&user), post, form.text, errors)?.into_response());
        }
    };

    let comment_id = comments::create(&conn, post.id, user.id, &text)?;
    state.page_cache.clear();

    tracing::info!(comment_id, post_id = post.id, author = %user.username, "Comment added");
    Ok(found(&post.detail_url()))
}
