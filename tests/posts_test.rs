mod common;

use askama::Template;
use common::{body_text, location, png_bytes, TestApp};
use yatube::cache::PageCache;
use yatube::db::posts::{self, NewPost, PostFilter};
use yatube::routes::posts::{feed_page, IndexTemplate, INDEX_PAGE_SIZE};

const TEXT: &str = "12345zxcvbbn";

#[tokio::test]
async fn new_post_page_sends_anonymous_visitors_to_login() {
    let app = TestApp::new();

    let response = app.get("/new/", None).await;
    assert_eq!(response.status(), 302);
    let target = location(&response);
    assert_eq!(target, "/auth/login/?next=/new/");

    let login = app.get(&target, None).await;
    assert_eq!(login.status(), 200);
    assert!(body_text(login).await.contains("value=\"/new/\""));
}

#[tokio::test]
async fn anonymous_post_creation_is_refused() {
    let app = TestApp::new();

    let response = app
        .post_multipart("/new/", None, &[("text", TEXT), ("group", "")], None)
        .await;
    assert_eq!(response.status(), 302);
    assert!(location(&response).starts_with("/auth/login/"));
    assert_eq!(app.count("SELECT COUNT(*) FROM posts"), 0);
}

#[tokio::test]
async fn new_post_appears_on_every_feed() {
    let app = TestApp::new();
    let (_, cookie) = app.user("timod");
    let group_id = app.group("cats", "Cats");

    let new_page = app.get("/new/", Some(&cookie)).await;
    assert_eq!(new_page.status(), 200);
    assert!(body_text(new_page).await.contains("Cats"));

    let post_id = app.create_post(&cookie, TEXT, Some(group_id)).await;

    for path in [
        "/".to_string(),
        "/timod/".to_string(),
        format!("/timod/{post_id}/"),
        "/group/cats/".to_string(),
    ] {
        let response = app.get(&path, Some(&cookie)).await;
        assert_eq!(response.status(), 200, "{path}");
        assert!(body_text(response).await.contains(TEXT), "{path}");
    }
}

#[tokio::test]
async fn short_text_rerenders_the_form() {
    let app = TestApp::new();
    let (_, cookie) = app.user("timod");

    let response = app
        .post_multipart("/new/", Some(&cookie), &[("text", "short"), ("group", "")], None)
        .await;
    assert_eq!(response.status(), 200);
    assert!(body_text(response).await.contains("Text is too short"));
    assert_eq!(app.count("SELECT COUNT(*) FROM posts"), 0);
}

#[tokio::test]
async fn unknown_group_choice_is_rejected() {
    let app = TestApp::new();
    let (_, cookie) = app.user("timod");

    let response = app
        .post_multipart("/new/", Some(&cookie), &[("text", TEXT), ("group", "999")], None)
        .await;
    assert_eq!(response.status(), 200);
    assert!(body_text(response).await.contains("Select a valid choice."));
    assert_eq!(app.count("SELECT COUNT(*) FROM posts"), 0);
}

#[tokio::test]
async fn author_edit_updates_every_feed() {
    let app = TestApp::new();
    let (_, cookie) = app.user("timod");
    let cats = app.group("cats", "Cats");
    let dogs = app.group("dogs", "Dogs");
    let post_id = app.create_post(&cookie, TEXT, Some(cats)).await;

    let edit_path = format!("/timod/{post_id}/edit/");
    let form = app.get(&edit_path, Some(&cookie)).await;
    assert_eq!(form.status(), 200);
    assert!(body_text(form).await.contains(TEXT));

    let edited = "edited 12345zxcvbbn";
    let dogs_id = dogs.to_string();
    let response = app
        .post_multipart(&edit_path, Some(&cookie), &[("text", edited), ("group", &dogs_id)], None)
        .await;
    assert_eq!(response.status(), 302);
    assert_eq!(location(&response), format!("/timod/{post_id}/"));

    for path in [
        "/".to_string(),
        "/timod/".to_string(),
        format!("/timod/{post_id}/"),
        "/group/dogs/".to_string(),
    ] {
        let body = body_text(app.get(&path, Some(&cookie)).await).await;
        assert!(body.contains(edited), "{path}");
    }
    let old_group = body_text(app.get("/group/cats/", None).await).await;
    assert!(!old_group.contains(edited));
}

#[tokio::test]
async fn non_author_cannot_edit() {
    let app = TestApp::new();
    let (_, author) = app.user("timod");
    let (_, intruder) = app.user("other");
    let post_id = app.create_post(&author, TEXT, None).await;
    let detail = format!("/timod/{post_id}/");
    let edit_path = format!("{detail}edit/");

    let page = app.get(&edit_path, Some(&intruder)).await;
    assert_eq!(page.status(), 302);
    assert_eq!(location(&page), detail);

    let response = app
        .post_multipart(&edit_path, Some(&intruder), &[("text", "hijacked text here"), ("group", "")], None)
        .await;
    assert_eq!(response.status(), 302);
    assert_eq!(location(&response), detail);

    let body = body_text(app.get(&detail, None).await).await;
    assert!(body.contains(TEXT));
    assert!(!body.contains("hijacked text here"));
}

#[tokio::test]
async fn post_under_wrong_author_is_not_found() {
    let app = TestApp::new();
    let (_, cookie) = app.user("timod");
    app.user("other");
    let post_id = app.create_post(&cookie, TEXT, None).await;

    let path = format!("/other/{post_id}/");
    let response = app.get(&path, None).await;
    assert_eq!(response.status(), 404);
    assert!(body_text(response).await.contains(&path));

    assert_eq!(app.get("/timod/abc/", None).await.status(), 404);
}

#[tokio::test]
async fn unknown_pages_render_404_with_path() {
    let app = TestApp::new();

    for path in ["/nobody/", "/group/missing/", "/a/b/c/d/"] {
        let response = app.get(path, None).await;
        assert_eq!(response.status(), 404, "{path}");
        let body = body_text(response).await;
        assert!(body.contains("Page not found"), "{path}");
        assert!(body.contains(path), "{path}");
    }
}

#[tokio::test]
async fn image_upload_is_stored_and_served() {
    let app = TestApp::new();
    let (_, cookie) = app.user("timod");
    let png = png_bytes();

    let response = app
        .post_multipart("/new/", Some(&cookie), &[("text", TEXT), ("group", "")], Some(("small.png", &png)))
        .await;
    assert_eq!(response.status(), 302);

    let post_id = app.post_id_by_text(TEXT);
    let conn = app.state.db.get().unwrap();
    let image = posts::find(&conn, post_id).unwrap().unwrap().image.unwrap();
    drop(conn);
    assert!(image.starts_with("posts/"));
    assert!(image.ends_with(".png"));

    let body = body_text(app.get("/", None).await).await;
    assert!(body.contains(&format!("/media/{image}")));

    let media = app.get(&format!("/media/{image}"), None).await;
    assert_eq!(media.status(), 200);
    assert_eq!(media.headers()["content-type"], "image/png");
}

#[tokio::test]
async fn non_image_upload_is_dropped_but_post_saved() {
    let app = TestApp::new();
    let (_, cookie) = app.user("timod");

    let response = app
        .post_multipart(
            "/new/",
            Some(&cookie),
            &[("text", TEXT), ("group", "")],
            Some(("notes.txt", b"definitely not a picture")),
        )
        .await;
    assert_eq!(response.status(), 302);

    let post_id = app.post_id_by_text(TEXT);
    let conn = app.state.db.get().unwrap();
    assert_eq!(posts::find(&conn, post_id).unwrap().unwrap().image, None);
}

#[tokio::test]
async fn edit_keeps_image_unless_cleared() {
    let app = TestApp::new();
    let (_, cookie) = app.user("timod");
    let png = png_bytes();
    app.post_multipart("/new/", Some(&cookie), &[("text", TEXT), ("group", "")], Some(("a.png", &png)))
        .await;
    let post_id = app.post_id_by_text(TEXT);
    let edit_path = format!("/timod/{post_id}/edit/");
    let image_of = |app: &TestApp| {
        let conn = app.state.db.get().unwrap();
        posts::find(&conn, post_id).unwrap().unwrap().image
    };

    app.post_multipart(&edit_path, Some(&cookie), &[("text", "kept image text"), ("group", "")], None)
        .await;
    assert!(image_of(&app).is_some());

    app.post_multipart(
        &edit_path,
        Some(&cookie),
        &[("text", "cleared image text"), ("group", ""), ("image-clear", "on")],
        None,
    )
    .await;
    assert_eq!(image_of(&app), None);
}

#[tokio::test]
async fn replaced_and_cleared_images_are_deleted() {
    let app = TestApp::new();
    let (_, cookie) = app.user("timod");
    let png = png_bytes();
    app.post_multipart("/new/", Some(&cookie), &[("text", TEXT), ("group", "")], Some(("a.png", &png)))
        .await;
    let post_id = app.post_id_by_text(TEXT);
    let edit_path = format!("/timod/{post_id}/edit/");
    let media = app.state.config.uploads_path();
    let image_of = |app: &TestApp| {
        let conn = app.state.db.get().unwrap();
        posts::find(&conn, post_id).unwrap().unwrap().image
    };

    let first = image_of(&app).unwrap();
    assert!(media.join(&first).exists());

    let response = app
        .post_multipart(
            &edit_path,
            Some(&cookie),
            &[("text", "replacement image text"), ("group", "")],
            Some(("b.png", &png)),
        )
        .await;
    assert_eq!(response.status(), 302);
    let second = image_of(&app).unwrap();
    assert_ne!(second, first);
    assert!(!media.join(&first).exists());
    assert!(media.join(&second).exists());

    app.post_multipart(
        &edit_path,
        Some(&cookie),
        &[("text", "no image any more"), ("group", ""), ("image-clear", "on")],
        None,
    )
    .await;
    assert_eq!(image_of(&app), None);
    assert!(!media.join(&second).exists());
}

#[tokio::test]
async fn index_is_cached_until_a_write() {
    let app = TestApp::new();
    let (author_id, cookie) = app.user("timod");

    let first = body_text(app.get("/", None).await).await;
    assert!(!first.contains("sneaky direct insert"));

    {
        let conn = app.state.db.get().unwrap();
        posts::create(
            &conn,
            &NewPost {
                author_id,
                text: "sneaky direct insert",
                group_id: None,
                image: None,
            },
        )
        .unwrap();
    }

    let cached = body_text(app.get("/", None).await).await;
    assert_eq!(cached, first);

    // Other pages are not cached.
    let profile = body_text(app.get("/timod/", None).await).await;
    assert!(profile.contains("sneaky direct insert"));

    app.create_post(&cookie, TEXT, None).await;
    let fresh = body_text(app.get("/", None).await).await;
    assert!(fresh.contains("sneaky direct insert"));
    assert!(fresh.contains(TEXT));
}

#[tokio::test]
async fn cache_clear_exposes_new_rows() {
    let app = TestApp::new();
    let (author_id, _) = app.user("timod");
    app.get("/", None).await;

    {
        let conn = app.state.db.get().unwrap();
        posts::create(
            &conn,
            &NewPost {
                author_id,
                text: "inserted behind the cache",
                group_id: None,
                image: None,
            },
        )
        .unwrap();
    }
    assert!(!body_text(app.get("/", None).await).await.contains("inserted behind the cache"));

    app.state.page_cache.clear();
    assert!(body_text(app.get("/", None).await).await.contains("inserted behind the cache"));
}

#[tokio::test]
async fn index_render_racing_a_write_is_not_cached() {
    let app = TestApp::new();
    let (author_id, _) = app.user("timod");
    let cache = &app.state.page_cache;

    // An index request reads its rows and renders...
    let read_at = cache.generation();
    let body = {
        let conn = app.state.db.get().unwrap();
        let page = feed_page(&conn, PostFilter::All, 1, INDEX_PAGE_SIZE).unwrap();
        IndexTemplate { viewer: None, page }.render().unwrap()
    };

    // ...while a post is written and the cache cleared...
    {
        let conn = app.state.db.get().unwrap();
        posts::create(
            &conn,
            &NewPost {
                author_id,
                text: "written mid render",
                group_id: None,
                image: None,
            },
        )
        .unwrap();
    }
    cache.clear();

    // ...and only then stores its now stale page.
    cache
        .insert(read_at, &PageCache::index_key(1, None), body)
        .await;

    let index = body_text(app.get("/", None).await).await;
    assert!(index.contains("written mid render"));
}

#[tokio::test]
async fn feeds_paginate() {
    let app = TestApp::new();
    let (author_id, _) = app.user("timod");
    let group_id = app.group("cats", "Cats");
    {
        let conn = app.state.db.get().unwrap();
        for n in 1..=12 {
            let text = format!("Post number {n:02}");
            posts::create(
                &conn,
                &NewPost {
                    author_id,
                    text: &text,
                    group_id: Some(group_id),
                    image: None,
                },
            )
            .unwrap();
        }
    }

    let first = body_text(app.get("/", None).await).await;
    assert!(first.contains("Page 1 of 2"));
    assert!(first.contains("Post number 12"));
    assert!(!first.contains("Post number 02"));

    let second = body_text(app.get("/?page=2", None).await).await;
    assert!(second.contains("Post number 01"));
    assert!(second.contains("Post number 02"));
    assert!(!second.contains("Post number 03"));

    // Out of range and junk page numbers fall back like Django's get_page.
    let last = body_text(app.get("/?page=99", None).await).await;
    assert!(last.contains("Page 2 of 2"));
    let junk = body_text(app.get("/?page=abc", None).await).await;
    assert!(junk.contains("Page 1 of 2"));

    let group = body_text(app.get("/group/cats/", None).await).await;
    assert!(group.contains("Page 1 of 3"));

    let profile = body_text(app.get("/timod/?page=3", None).await).await;
    assert!(profile.contains("Page 3 of 3"));
    assert!(profile.contains("Post number 01"));
}

#[tokio::test]
async fn comments_are_added_and_validated() {
    let app = TestApp::new();
    let (_, author) = app.user("timod");
    let (_, reader) = app.user("reader");
    let post_id = app.create_post(&author, TEXT, None).await;
    let detail = format!("/timod/{post_id}/");
    let comment_path = format!("{detail}comment/");

    let anonymous = app.post_form(&comment_path, None, "text=hello").await;
    assert_eq!(anonymous.status(), 302);
    assert!(location(&anonymous).starts_with("/auth/login/"));
    assert_eq!(app.count("SELECT COUNT(*) FROM comments"), 0);

    let empty = app.post_form(&comment_path, Some(&reader), "text=+++").await;
    assert_eq!(empty.status(), 200);
    assert!(body_text(empty).await.contains("This field is required."));
    assert_eq!(app.count("SELECT COUNT(*) FROM comments"), 0);

    let ok = app
        .post_form(&comment_path, Some(&reader), "text=Nice+kitty")
        .await;
    assert_eq!(ok.status(), 302);
    assert_eq!(location(&ok), detail);

    let body = body_text(app.get(&detail, None).await).await;
    assert!(body.contains("Nice kitty"));
    assert!(body.contains("/auth/login/?next="));

    let index = body_text(app.get("/", None).await).await;
    assert!(index.contains("Comments: 1"));
}
