pub mod auth;
pub mod capabilities;
pub mod harvest;
pub mod init;
pub mod status;

use std::path::Path;

use stacks_core::config::StacksConfig;
use stacks_core::db::sqlite::SqliteRepository;
use stacks_core::db::DatabasePool;
use tracing::info;

/// Load and validate the configuration file.
pub fn load_config(config_path: &str) -> anyhow::Result<StacksConfig> {
    let config = StacksConfig::load(Path::new(config_path))?;
    config.validate()?;
    info!("Loaded configuration from {}", config_path);
    Ok(config)
}

/// Open the patron database named in the configuration.
pub async fn open_repository(config: &StacksConfig) -> anyhow::Result<SqliteRepository> {
    let path = config
        .stacks
        .database
        .path
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("SQLite path not configured"))?;
    let DatabasePool::Sqlite(pool) = DatabasePool::new_sqlite(&format!("sqlite:{path}?mode=rwc")).await?;
    Ok(SqliteRepository::new(pool))
}
