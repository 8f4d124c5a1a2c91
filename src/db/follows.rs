use rusqlite::{params, Connection};

use crate::db::is_constraint_violation;

/// Adds the edge `user_id -> author_id`. Returns `false` when the store
/// refuses it (already following, or following oneself).
pub fn follow(conn: &Connection, user_id: i64, author_id: i64) -> rusqlite::Result<bool> {
    match conn.execute(
        "INSERT INTO follows (user_id, author_id) VALUES (?1, ?2)",
        params![user_id, author_id],
    ) {
        Ok(_) => Ok(true),
        Err(e) if is_constraint_violation(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Removes the edge. Returns `false` when there was none.
pub fn unfollow(conn: &Connection, user_id: i64, author_id: i64) -> rusqlite::Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM follows WHERE user_id = ?1 AND author_id = ?2",
        params![user_id, author_id],
    )?;
    Ok(deleted > 0)
}

pub fn is_following(conn: &Connection, user_id: i64, author_id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM follows WHERE user_id = ?1 AND author_id = ?2",
        params![user_id, author_id],
        |row| row.get(0),
    )
}
