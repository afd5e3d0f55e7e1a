use anyhow::Result;

use crate::core::AppConfig;
use crate::core::db::{async_db, migrate_db};

pub async fn run(config: &AppConfig) -> Result<()> {
    tracing::info!("Migrating db...");
    let db = async_db(&config.db_path).await?;
    let applied = db.call(|conn| Ok(migrate_db(conn)?)).await?;
    tracing::info!("Finished migrating db, applied {} migration(s)", applied);

    Ok(())
}
