use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::User;

pub struct NewUser<'a> {
    pub username: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        email: row.get(4)?,
        password_hash: row.get(5)?,
        created_at: row.get(6)?,
    })
}

const COLUMNS: &str = "id, username, first_name, last_name, email, password_hash, created_at";

pub fn create(conn: &Connection, user: &NewUser<'_>) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO users (username, first_name, last_name, email, password_hash)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user.username,
            user.first_name,
            user.last_name,
            user.email,
            user.password_hash
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_by_username(conn: &Connection, username: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM users WHERE username = ?1"),
        params![username],
        from_row,
    )
    .optional()
}

pub fn username_taken(conn: &Connection, username: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE username = ?1 COLLATE NOCASE",
        params![username],
        |row| row.get(0),
    )
}

/// Numbers shown next to an author's name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorStats {
    pub posts: i64,
    pub followers: i64,
    pub following: i64,
}

pub fn stats(conn: &Connection, user_id: i64) -> rusqlite::Result<AuthorStats> {
    conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM posts WHERE author_id = ?1),
            (SELECT COUNT(*) FROM follows WHERE author_id = ?1),
            (SELECT COUNT(*) FROM follows WHERE user_id = ?1)",
        params![user_id],
        |row| {
            Ok(AuthorStats {
                posts: row.get(0)?,
                followers: row.get(1)?,
                following: row.get(2)?,
            })
        },
    )
}
