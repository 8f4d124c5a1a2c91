use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::db::models::{display_name, Post, PostView};

/// Which posts a feed shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(i64),
    /// Posts by every author the given user follows.
    FollowedBy(i64),
}

impl PostFilter {
    fn where_clause(&self) -> (&'static str, Vec<i64>) {
        match *self {
            PostFilter::All => ("", vec![]),
            PostFilter::Group(id) => ("WHERE p.group_id = ?", vec![id]),
            PostFilter::Author(id) => ("WHERE p.author_id = ?", vec![id]),
            PostFilter::FollowedBy(id) => (
                "WHERE p.author_id IN (SELECT f.author_id FROM follows f WHERE f.user_id = ?)",
                vec![id],
            ),
        }
    }
}

// Author, group and comment count come back with the post so a page of
// results is one statement.
const VIEW_SELECT: &str = "
    SELECT p.id, p.text, p.pub_date, p.image,
           u.id, u.username, u.first_name, u.last_name,
           g.slug, g.title,
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id)
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN post_groups g ON g.id = p.group_id";

const NEWEST_FIRST: &str = "ORDER BY p.pub_date DESC, p.id DESC";

fn view_from_row(row: &Row<'_>) -> rusqlite::Result<PostView> {
    let username: String = row.get(5)?;
    let first_name: String = row.get(6)?;
    let last_name: String = row.get(7)?;
    Ok(PostView {
        id: row.get(0)?,
        text: row.get(1)?,
        pub_date: row.get(2)?,
        image: row.get(3)?,
        author_id: row.get(4)?,
        author_name: display_name(&username, &first_name, &last_name),
        author_username: username,
        group_slug: row.get(8)?,
        group_title: row.get(9)?,
        comment_count: row.get(10)?,
    })
}

pub fn count(conn: &Connection, filter: PostFilter) -> rusqlite::Result<i64> {
    let (clause, args) = filter.where_clause();
    conn.query_row(
        &format!("SELECT COUNT(*) FROM posts p {clause}"),
        params_from_iter(args),
        |row| row.get(0),
    )
}

pub fn list(
    conn: &Connection,
    filter: PostFilter,
    limit: i64,
    offset: i64,
) -> rusqlite::Result<Vec<PostView>> {
    let (clause, mut args) = filter.where_clause();
    args.push(limit);
    args.push(offset);

    let mut stmt = conn.prepare(&format!(
        "{VIEW_SELECT} {clause} {NEWEST_FIRST} LIMIT ? OFFSET ?"
    ))?;
    let posts: rusqlite::Result<Vec<PostView>> =
        stmt.query_map(params_from_iter(args), view_from_row)?.collect();
    posts
}

/// A post only resolves through its own author's username.
pub fn get_for_author(
    conn: &Connection,
    username: &str,
    post_id: i64,
) -> rusqlite::Result<Option<PostView>> {
    conn.query_row(
        &format!("{VIEW_SELECT} WHERE p.id = ?1 AND u.username = ?2"),
        params![post_id, username],
        view_from_row,
    )
    .optional()
}

pub fn find(conn: &Connection, post_id: i64) -> rusqlite::Result<Option<Post>> {
    conn.query_row(
        "SELECT id, text, pub_date, author_id, group_id, image FROM posts WHERE id = ?1",
        params![post_id],
        |row| {
            Ok(Post {
                id: row.get(0)?,
                text: row.get(1)?,
                pub_date: row.get(2)?,
                author_id: row.get(3)?,
                group_id: row.get(4)?,
                image: row.get(5)?,
            })
        },
    )
    .optional()
}

pub struct NewPost<'a> {
    pub author_id: i64,
    pub text: &'a str,
    pub group_id: Option<i64>,
    pub image: Option<&'a str>,
}

pub fn create(conn: &Connection, post: &NewPost<'_>) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO posts (text, author_id, group_id, image) VALUES (?1, ?2, ?3, ?4)",
        params![post.text, post.author_id, post.group_id, post.image],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Overwrites the editable fields; `pub_date` and author never change.
pub fn update(
    conn: &Connection,
    post_id: i64,
    text: &str,
    group_id: Option<i64>,
    image: Option<&str>,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE posts SET text = ?1, group_id = ?2, image = ?3 WHERE id = ?4",
        params![text, group_id, image, post_id],
    )?;
    Ok(())
}
