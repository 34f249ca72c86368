use crate::models::{AddPrivacy, Album, Category, CategoryType, ViewPrivacy};
use crate::Database;
use anyhow::Result;

const MAX_TITLE_LENGTH: usize = 100;

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        anyhow::bail!("Title cannot be empty");
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        anyhow::bail!("Title must be {} characters or less", MAX_TITLE_LENGTH);
    }
    Ok(())
}

pub fn create_album(
    db: &Database,
    title: &str,
    user_id: u32,
    view_privacy: ViewPrivacy,
    add_privacy: AddPrivacy,
) -> Result<Album> {
    validate_title(title)?;

    let conn = db.get()?;
    conn.execute(
        "INSERT INTO albums (title, user_id, view_privacy, add_privacy) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            title.trim(),
            user_id,
            view_privacy.to_string(),
            add_privacy.to_string()
        ],
    )?;

    Ok(Album {
        album_id: conn.last_insert_rowid() as u32,
        title: title.trim().to_string(),
        user_id,
        view_privacy,
        add_privacy,
    })
}

pub fn create_category(db: &Database, title: &str, category_type: CategoryType) -> Result<Category> {
    validate_title(title)?;

    let conn = db.get()?;
    conn.execute(
        "INSERT INTO categories (title, category_type) VALUES (?1, ?2)",
        (title.trim(), category_type.to_string()),
    )?;

    Ok(Category {
        category_id: conn.last_insert_rowid() as u32,
        title: title.trim().to_string(),
        category_type,
    })
}

pub fn list_albums(db: &Database) -> Result<Vec<Album>> {
    let conn = db.get()?;
    let mut stmt = conn.prepare(
        "SELECT album_id, title, user_id, view_privacy, add_privacy FROM albums ORDER BY album_id",
    )?;
    let albums = stmt
        .query_map([], |row| {
            Ok(Album {
                album_id: row.get(0)?,
                title: row.get(1)?,
                user_id: row.get(2)?,
                view_privacy: row.get::<_, String>(3)?.parse().unwrap_or_default(),
                add_privacy: row.get::<_, String>(4)?.parse().unwrap_or_default(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(albums)
}

pub fn list_categories(db: &Database) -> Result<Vec<Category>> {
    let conn = db.get()?;
    let mut stmt = conn
        .prepare("SELECT category_id, title, category_type FROM categories ORDER BY category_id")?;
    let categories = stmt
        .query_map([], |row| {
            Ok(Category {
                category_id: row.get(0)?,
                title: row.get(1)?,
                category_type: row.get::<_, String>(2)?.parse().unwrap_or_default(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(categories)
}
