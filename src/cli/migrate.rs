use crate::cli::MigrateCommand;
use crate::{Config, Database};
use anyhow::Result;
use std::path::Path;

const DESCRIPTIONS: &[&str] = &["Users, tokens, containers, attachments and media"];

pub async fn run(config_path: &Path, command: Option<MigrateCommand>) -> Result<()> {
    let config = Config::load(config_path)?;
    let db = Database::open(&config.database.path)?;

    match command {
        None => {
            db.migrate()?;
            tracing::info!("Migrations complete");
        }
        Some(MigrateCommand::Status) => show_status(&db)?,
    }

    Ok(())
}

fn show_status(db: &Database) -> Result<()> {
    let statuses = db.get_migration_status()?;

    println!("\n  Migration Status\n");
    println!("  {:<10} {:<50} {}", "Version", "Description", "Applied");
    println!("  {}", "-".repeat(80));

    for (version, applied_at) in &statuses {
        let desc = DESCRIPTIONS
            .get((*version as usize).saturating_sub(1))
            .unwrap_or(&"Unknown migration");
        let applied = match applied_at {
            Some(ts) => ts.clone(),
            None => "pending".to_string(),
        };
        println!("  {:<10} {:<50} {}", format!("{:03}", version), desc, applied);
    }

    let pending = statuses.iter().filter(|(_, ts)| ts.is_none()).count();
    println!();
    if pending > 0 {
        println!("  {} pending. Run `gallery migrate` to apply.", pending);
    } else {
        println!("  All {} migrations applied.", statuses.len());
    }
    println!();

    Ok(())
}
