use crate::models::{User, UserRole, Visitor};
use crate::Database;
use anyhow::Result;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use sha2::{Digest, Sha256};

const TOKEN_PREFIX: &str = "gal_";
const TOKEN_BYTE_LENGTH: usize = 32;
const MAX_USERNAME_LENGTH: usize = 50;

fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() {
        anyhow::bail!("Username cannot be empty");
    }
    if username.len() > MAX_USERNAME_LENGTH {
        anyhow::bail!(
            "Username must be {} characters or less",
            MAX_USERNAME_LENGTH
        );
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        anyhow::bail!("Username can only contain letters, numbers, underscores, and hyphens");
    }
    Ok(())
}

pub fn create_user(db: &Database, username: &str, role: UserRole) -> Result<u32> {
    validate_username(username)?;

    let conn = db.get()?;
    conn.execute(
        "INSERT INTO users (username, role) VALUES (?1, ?2)",
        (username, role.to_string()),
    )?;
    Ok(conn.last_insert_rowid() as u32)
}

pub fn get_user(db: &Database, user_id: u32) -> Result<Option<User>> {
    let conn = db.get()?;
    let user = conn
        .query_row(
            "SELECT user_id, username, role, created_at FROM users WHERE user_id = ?",
            [user_id],
            row_to_user,
        )
        .ok();
    Ok(user)
}

pub fn get_user_by_username(db: &Database, username: &str) -> Result<Option<User>> {
    let conn = db.get()?;
    let user = conn
        .query_row(
            "SELECT user_id, username, role, created_at FROM users WHERE username = ?",
            [username],
            row_to_user,
        )
        .ok();
    Ok(user)
}

pub fn list_users(db: &Database) -> Result<Vec<User>> {
    let conn = db.get()?;
    let mut stmt =
        conn.prepare("SELECT user_id, username, role, created_at FROM users ORDER BY user_id")?;
    let users = stmt
        .query_map([], row_to_user)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(users)
}

/// Generate a raw random token string with the `gal_` prefix.
fn generate_raw_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTE_LENGTH];
    rand::thread_rng().fill(&mut bytes);
    format!("{}{}", TOKEN_PREFIX, URL_SAFE_NO_PAD.encode(bytes))
}

/// SHA-256 hash a raw token for storage.
fn hash_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// Short display prefix, e.g. `gal_AbCdEfGh...`.
fn extract_prefix(raw: &str) -> String {
    let without_prefix = raw.strip_prefix(TOKEN_PREFIX).unwrap_or(raw);
    let end = without_prefix.len().min(8);
    format!("{}{}...", TOKEN_PREFIX, &without_prefix[..end])
}

/// Issue an API token for a user. The raw token is returned once and only its hash is kept.
pub fn create_token(db: &Database, user_id: u32) -> Result<String> {
    let raw_token = generate_raw_token();

    let conn = db.get()?;
    conn.execute(
        "INSERT INTO api_tokens (user_id, token_hash, prefix) VALUES (?1, ?2, ?3)",
        rusqlite::params![user_id, hash_token(&raw_token), extract_prefix(&raw_token)],
    )?;

    Ok(raw_token)
}

/// Resolve a raw token to its user. Unknown or malformed tokens yield `None`.
pub fn validate_token(db: &Database, raw_token: &str) -> Result<Option<User>> {
    if !raw_token.starts_with(TOKEN_PREFIX) {
        return Ok(None);
    }

    let token_hash = hash_token(raw_token);
    let conn = db.get()?;

    let user = conn
        .query_row(
            "SELECT u.user_id, u.username, u.role, u.created_at
             FROM api_tokens t JOIN users u ON u.user_id = t.user_id
             WHERE t.token_hash = ?",
            [&token_hash],
            row_to_user,
        )
        .ok();

    if user.is_some() {
        conn.execute(
            "UPDATE api_tokens SET last_used_at = CURRENT_TIMESTAMP WHERE token_hash = ?",
            [&token_hash],
        )?;
    }

    Ok(user)
}

/// Resolve the visitor for a request: no token is a guest, a bad token is an error.
pub fn resolve_visitor(db: &Database, raw_token: Option<&str>) -> Result<Option<Visitor>> {
    match raw_token {
        None => Ok(Some(Visitor::Guest)),
        Some(raw) => Ok(validate_token(db, raw)?.map(Visitor::User)),
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        user_id: row.get(0)?,
        username: row.get(1)?,
        role: row
            .get::<_, String>(2)?
            .parse()
            .unwrap_or(UserRole::Member),
        created_at: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db(name: &str) -> Database {
        let db = Database::open_memory(name).unwrap();
        db.migrate().unwrap();
        db
    }

    #[test]
    fn token_resolves_to_its_user() {
        let db = test_db("auth_token_resolves");
        let user_id = create_user(&db, "alice", UserRole::Moderator).unwrap();
        let token = create_token(&db, user_id).unwrap();
        assert!(token.starts_with(TOKEN_PREFIX));

        let user = validate_token(&db, &token).unwrap().expect("token should resolve");
        assert_eq!(user.user_id, user_id);
        assert_eq!(user.role, UserRole::Moderator);
    }

    #[test]
    fn unknown_tokens_do_not_resolve() {
        let db = test_db("auth_unknown_token");
        assert!(validate_token(&db, "gal_nope").unwrap().is_none());
        assert!(validate_token(&db, "not-even-prefixed").unwrap().is_none());
    }

    #[test]
    fn missing_token_is_a_guest() {
        let db = test_db("auth_guest");
        let visitor = resolve_visitor(&db, None).unwrap().unwrap();
        assert!(!visitor.is_registered());
        assert!(resolve_visitor(&db, Some("gal_bogus")).unwrap().is_none());
    }

    #[test]
    fn usernames_are_validated() {
        let db = test_db("auth_usernames");
        assert!(create_user(&db, "", UserRole::Member).is_err());
        assert!(create_user(&db, "has space", UserRole::Member).is_err());
        assert!(create_user(&db, "ok_name-1", UserRole::Member).is_ok());
        assert!(create_user(&db, "ok_name-1", UserRole::Member).is_err());
    }

    #[test]
    fn prefix_is_truncated_for_display() {
        assert_eq!(extract_prefix("gal_abcdefghijkl"), "gal_abcdefgh...");
        assert_eq!(extract_prefix("gal_abc"), "gal_abc...");
    }
}
