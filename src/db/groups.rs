use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::Group;

fn from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
    })
}

pub fn create(
    conn: &Connection,
    slug: &str,
    title: &str,
    description: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO post_groups (slug, title, description) VALUES (?1, ?2, ?3)",
        params![slug, title, description],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_by_slug(conn: &Connection, slug: &str) -> rusqlite::Result<Option<Group>> {
    conn.query_row(
        "SELECT id, title, slug, description FROM post_groups WHERE slug = ?1",
        params![slug],
        from_row,
    )
    .optional()
}

/// All groups by title, for the post form's select box.
pub fn list(conn: &Connection) -> rusqlite::Result<Vec<Group>> {
    let mut stmt =
        conn.prepare("SELECT id, title, slug, description FROM post_groups ORDER BY title")?;
    let groups: rusqlite::Result<Vec<Group>> = stmt.query_map([], from_row)?.collect();
    groups
}
