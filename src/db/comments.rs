use rusqlite::{params, Connection};

use crate::db::models::{display_name, CommentView};

pub fn create(conn: &Connection, post_id: i64, author_id: i64, text: &str) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO comments (post_id, author_id, text) VALUES (?1, ?2, ?3)",
        params![post_id, author_id, text],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Comments under a post, oldest first, with their authors.
pub fn for_post(conn: &Connection, post_id: i64) -> rusqlite::Result<Vec<CommentView>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, u.username, u.first_name, u.last_name, c.text, c.created
         FROM comments c
         JOIN users u ON u.id = c.author_id
         WHERE c.post_id = ?1
         ORDER BY c.created ASC, c.id ASC",
    )?;

    let comments: rusqlite::Result<Vec<CommentView>> = stmt
        .query_map(params![post_id], |row| {
            let username: String = row.get(1)?;
            let first_name: String = row.get(2)?;
            let last_name: String = row.get(3)?;
            Ok(CommentView {
                id: row.get(0)?,
                author_name: display_name(&username, &first_name, &last_name),
                author_username: username,
                text: row.get(4)?,
                created: row.get(5)?,
            })
        })?
        .collect();
    comments
}
