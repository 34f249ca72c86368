use crate::models::{AddPrivacy, CategoryType, ViewPrivacy};
use crate::{services::auth, services::containers, Config, Database};
use anyhow::Result;
use std::path::Path;

use super::{AlbumCommand, CategoryCommand};

fn open(config_path: &Path) -> Result<Database> {
    let config = Config::load(config_path)?;
    let db = Database::open(&config.database.path)?;
    db.migrate()?;
    Ok(db)
}

pub async fn run_album(config_path: &Path, command: AlbumCommand) -> Result<()> {
    let db = open(config_path)?;

    match command {
        AlbumCommand::Add {
            title,
            owner,
            view,
            add,
        } => {
            let owner = auth::get_user_by_username(&db, &owner)?
                .ok_or_else(|| anyhow::anyhow!("User '{}' not found", owner))?;
            let view: ViewPrivacy = view
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid view privacy '{}'", view))?;
            let add: AddPrivacy = add
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid add privacy '{}'", add))?;

            let album = containers::create_album(&db, &title, owner.user_id, view, add)?;
            tracing::info!("Album '{}' created with id {}", album.title, album.album_id);
        }
        AlbumCommand::List => {
            println!("{:<8} {:<30} {:<8} {:<10} {:<10}", "ID", "TITLE", "OWNER", "VIEW", "ADD");
            println!("{}", "-".repeat(70));
            for album in containers::list_albums(&db)? {
                println!(
                    "{:<8} {:<30} {:<8} {:<10} {:<10}",
                    album.album_id, album.title, album.user_id, album.view_privacy, album.add_privacy
                );
            }
        }
    }

    Ok(())
}

pub async fn run_category(config_path: &Path, command: CategoryCommand) -> Result<()> {
    let db = open(config_path)?;

    match command {
        CategoryCommand::Add {
            title,
            category_type,
        } => {
            let kind: CategoryType = category_type
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid category type '{}'", category_type))?;
            let category = containers::create_category(&db, &title, kind)?;
            tracing::info!(
                "Category '{}' created with id {}",
                category.title,
                category.category_id
            );
        }
        CategoryCommand::List => {
            println!("{:<8} {:<30} {:<10}", "ID", "TITLE", "TYPE");
            println!("{}", "-".repeat(50));
            for category in containers::list_categories(&db)? {
                println!(
                    "{:<8} {:<30} {:<10}",
                    category.category_id, category.title, category.category_type
                );
            }
        }
    }

    Ok(())
}
