use std::fs;

use anyhow::{Context, Result};

use crate::core::AppConfig;
use crate::core::db::{async_db, initialize_db};

pub async fn run(config: &AppConfig) -> Result<()> {
    tracing::info!("Initializing db at {}...", config.db_path);
    fs::create_dir_all(&config.storage_path)
        .with_context(|| format!("Failed to create storage path {}", config.storage_path))?;

    let db = async_db(&config.db_path).await?;
    db.call(|conn| {
        initialize_db(conn)?;
        Ok(())
    })
    .await?;
    tracing::info!("Finished initializing db");

    Ok(())
}
