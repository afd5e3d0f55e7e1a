use anyhow::Result;

use crate::api;
use crate::core::AppConfig;

pub async fn run(host: String, port: String, config: AppConfig) -> Result<()> {
    let controller = super::session_controller(&config).await?;
    api::serve(host, port, config, controller).await
}
