use crate::{web, Config, Database};
use anyhow::Result;
use std::path::Path;

pub async fn run(config_path: &Path, host: Option<String>, port: Option<u16>) -> Result<()> {
    let config = Config::load(config_path)?;
    let db = Database::open_with_pool_size(&config.database.path, config.database.pool_size)?;

    db.migrate()?;

    let addr = format!(
        "{}:{}",
        host.as_deref().unwrap_or(&config.server.host),
        port.unwrap_or(config.server.port)
    );
    tracing::info!("Starting gallery API at http://{}", addr);

    web::serve(config, db, &addr).await?;

    Ok(())
}
