use crate::models::UserRole;
use crate::{services::auth, Config, Database};
use anyhow::Result;
use std::path::Path;

use super::UserCommand;

pub async fn run(config_path: &Path, command: UserCommand) -> Result<()> {
    let config = Config::load(config_path)?;
    let db = Database::open(&config.database.path)?;
    db.migrate()?;

    match command {
        UserCommand::Add { username, role } => {
            let role: UserRole = role
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid role '{}' (member, moderator, admin)", role))?;
            let user_id = auth::create_user(&db, &username, role)?;
            let token = auth::create_token(&db, user_id)?;
            tracing::info!("User '{}' created with id {}", username, user_id);
            println!("{}", token);
        }
        UserCommand::List => {
            let users = auth::list_users(&db)?;
            println!("{:<8} {:<20} {:<10}", "ID", "USERNAME", "ROLE");
            println!("{}", "-".repeat(40));
            for user in users {
                println!("{:<8} {:<20} {:<10}", user.user_id, user.username, user.role);
            }
        }
        UserCommand::Token { username } => {
            let user = auth::get_user_by_username(&db, &username)?
                .ok_or_else(|| anyhow::anyhow!("User '{}' not found", username))?;
            let token = auth::create_token(&db, user.user_id)?;
            println!("{}", token);
        }
    }

    Ok(())
}
