#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use tempfile::TempDir;
use tower::ServiceExt;

use yatube::auth::session;
use yatube::config::Config;
use yatube::db;
use yatube::db::users::NewUser;
use yatube::routes;
use yatube::state::AppState;

pub const BOUNDARY: &str = "yatube-test-boundary";

/// A fresh database and router per test.
pub struct TestApp {
    pub dir: TempDir,
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = Config::for_data_dir(dir.path());
        let pool = db::create_pool(&config.db_path()).expect("Failed to create test database");
        db::run_migrations(&pool).expect("Failed to run migrations");
        let state = AppState::new(pool, config);
        let router = routes::app(state.clone());
        Self { dir, state, router }
    }

    /// Creates a user and a live session; returns (id, Cookie header value).
    pub fn user(&self, username: &str) -> (i64, String) {
        let conn = self.state.db.get().unwrap();
        let id = db::users::create(
            &conn,
            &NewUser {
                username,
                first_name: "",
                last_name: "",
                email: "user@example.com",
                password_hash: "!",
            },
        )
        .unwrap();
        let token = session::create_session(&conn, id, 1).unwrap();
        let cookie = format!("{}={}", self.state.config.auth.cookie_name, token);
        (id, cookie)
    }

    pub fn group(&self, slug: &str, title: &str) -> i64 {
        let conn = self.state.db.get().unwrap();
        db::groups::create(&conn, slug, title, "").unwrap()
    }

    pub fn count(&self, sql: &str) -> i64 {
        let conn = self.state.db.get().unwrap();
        conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    pub fn post_id_by_text(&self, text: &str) -> i64 {
        let conn = self.state.db.get().unwrap();
        conn.query_row(
            "SELECT id FROM posts WHERE text = ?1",
            rusqlite::params![text],
            |row| row.get(0),
        )
        .unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&self, path: &str, cookie: Option<&str>, body: &str) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn post_multipart(
        &self,
        path: &str,
        cookie: Option<&str>,
        fields: &[(&str, &str)],
        file: Option<(&str, &[u8])>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method("POST").uri(path).header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(multipart_body(fields, file))).unwrap())
            .await
    }

    /// Creates a post through `/new/` as the given session.
    pub async fn create_post(&self, cookie: &str, text: &str, group: Option<i64>) -> i64 {
        let group = group.map(|g| g.to_string()).unwrap_or_default();
        let response = self
            .post_multipart("/new/", Some(cookie), &[("text", text), ("group", &group)], None)
            .await;
        assert_eq!(response.status(), 302, "post creation should redirect");
        self.post_id_by_text(text)
    }
}

pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Response body with the entity forms of `/` and `'` undone, so assertions
/// can look for paths as written.
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec())
        .unwrap()
        .replace("&#x2f;", "/")
        .replace("&#x27;", "'")
}

pub fn location(response: &Response<Body>) -> String {
    response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string()
}

pub fn png_bytes() -> Vec<u8> {
    use std::io::Cursor;

    let img = image::RgbImage::from_pixel(3, 3, image::Rgb([10, 120, 200]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageOutputFormat::Png)
        .unwrap();
    buf
}
