use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Form;
use rusqlite::Connection;
use serde::Deserialize;

use crate::auth::{password, session};
use crate::db::is_constraint_violation;
use crate::db::users::{self, NewUser};
use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::forms::{safe_next, FieldErrors, LoginInput, SignupInput, USERNAME_TAKEN};
use crate::routes::Html;
use crate::state::AppState;

// -- Templates --

#[derive(Template)]
#[template(path = "pages/signup.html")]
pub struct SignupTemplate {
    pub viewer: Option<String>,
    pub form: SignupInput,
    pub errors: FieldErrors,
}

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub viewer: Option<String>,
    pub username: String,
    pub next: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "pages/logged_out.html")]
pub struct LoggedOutTemplate {
    pub viewer: Option<String>,
}

#[derive(Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

const BAD_CREDENTIALS: &str = "Please enter a correct username and password.";

/// Response that starts a session and sends the browser on.
fn logged_in(state: &AppState, token: &str, location: &str) -> Response {
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, location.to_string()),
            (
                header::SET_COOKIE,
                session::session_cookie(
                    &state.config.auth.cookie_name,
                    token,
                    state.config.auth.session_hours,
                ),
            ),
        ],
    )
        .into_response()
}

// -- Signup --

/// Inserts the account; `None` when the username was claimed after the
/// form was validated.
fn create_account(
    conn: &Connection,
    username: &str,
    form: &SignupInput,
    password_hash: &str,
) -> rusqlite::Result<Option<i64>> {
    let created = users::create(
        conn,
        &NewUser {
            username,
            first_name: form.first_name.trim(),
            last_name: form.last_name.trim(),
            email: form.email.trim(),
            password_hash,
        },
    );
    match created {
        Ok(id) => Ok(Some(id)),
        Err(e) if is_constraint_violation(&e) => Ok(None),
        Err(e) => Err(e),
    }
}

/// GET /auth/signup/
pub async fn signup_page(maybe_user: MaybeUser) -> Html<SignupTemplate> {
    Html(SignupTemplate {
        viewer: maybe_user.username(),
        form: SignupInput::default(),
        errors: FieldErrors::default(),
    })
}

/// POST /auth/signup/: create the account and log it in
pub async fn signup(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Form(form): Form<SignupInput>,
) -> AppResult<Response> {
    let username = form.username.trim().to_string();
    let taken = {
        let conn = state.db.get()?;
        users::username_taken(&conn, &username)?
    };

    if let Err(errors) = form.validate(taken) {
        return Ok(Html(SignupTemplate {
            viewer: maybe_user.username(),
            form,
            errors,
        })
        .into_response());
    }

    let password_hash = password::hash_password(&form.password1)?;
    let conn = state.db.get()?;
    let created = create_account(&conn, &username, &form, &password_hash)?;
    let Some(user_id) = created else {
        // Lost a race with another signup for the same name.
        let mut errors = FieldErrors::default();
        errors.add("username", USERNAME_TAKEN);
        return Ok(Html(SignupTemplate {
            viewer: maybe_user.username(),
            form,
            errors,
        })
        .into_response());
    };
    let token = session::create_session(&conn, user_id, state.config.auth.session_hours)?;

    tracing::info!(user_id, username = %username, "User signed up");
    Ok(logged_in(&state, &token, "/"))
}

// -- Login --

/// GET /auth/login/
pub async fn login_page(maybe_user: MaybeUser, Query(query): Query<NextQuery>) -> Html<LoginTemplate> {
    Html(LoginTemplate {
        viewer: maybe_user.username(),
        username: String::new(),
        next: query.next.unwrap_or_default(),
        error: None,
    })
}

/// POST /auth/login/: check credentials and start a session
pub async fn login(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Form(form): Form<LoginInput>,
) -> AppResult<Response> {
    let username = form.username.trim();
    let conn = state.db.get()?;
    let user = users::find_by_username(&conn, username)?
        .filter(|u| password::verify_password(&form.password, &u.password_hash));

    let Some(user) = user else {
        tracing::info!(username = %username, "Failed login");
        return Ok(Html(LoginTemplate {
            viewer: maybe_user.username(),
            username: username.to_string(),
            next: form.next.clone().unwrap_or_default(),
            error: Some(BAD_CREDENTIALS.to_string()),
        })
        .into_response());
    };

    let token = session::create_session(&conn, user.id, state.config.auth.session_hours)?;
    tracing::info!(user_id = user.id, "User logged in");
    Ok(logged_in(&state, &token, safe_next(form.next.as_deref())))
}

// -- Logout --

/// GET or POST /auth/logout/: delete the session and clear the cookie
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let cookie_name = &state.config.auth.cookie_name;
    if let Some(token) = session::get_cookie_value(&headers, cookie_name) {
        let conn = state.db.get()?;
        session::delete_session(&conn, token)?;
    }

    Ok((
        AppendHeaders([(header::SET_COOKIE, session::clear_session_cookie(cookie_name))]),
        Html(LoggedOutTemplate { viewer: None }),
    )
        .into_response())
}
