use std::path::Path;

use stacks_core::config::StacksConfig;
use stacks_core::db::DatabasePool;
use stacks_core::ils::registry::DriverRegistry;
use tracing::info;

/// Run the `init` command: create data directory, write default config, and set up the database.
pub async fn run(data_dir: &str, driver: &str) -> anyhow::Result<()> {
    let registry = DriverRegistry::with_builtin();
    if !registry.contains(driver) {
        anyhow::bail!(
            "Unknown ILS driver: {driver}. Supported: {}",
            registry.names().join(", ")
        );
    }

    let data_path = Path::new(data_dir);
    if !data_path.exists() {
        std::fs::create_dir_all(data_path)?;
        info!("Created data directory: {}", data_dir);
    }

    let db_path = data_path.join("stacks.db");
    let db_path_str = db_path.to_string_lossy().to_string();

    let mut config = StacksConfig::generate_default();
    config.stacks.data_dir = data_dir.to_string();
    config.stacks.database.path = Some(db_path_str.clone());
    config.catalog.driver = driver.to_ascii_lowercase();

    let config_path = data_path.join("stacks.toml");
    let toml_str = toml::to_string_pretty(&config)?;
    std::fs::write(&config_path, &toml_str)?;
    info!("Wrote configuration to {}", config_path.display());

    let connect_str = format!("sqlite:{}?mode=rwc", db_path_str);
    DatabasePool::new_sqlite(&connect_str).await?;
    info!("Database initialized at {}", db_path_str);

    println!("Stacks initialized successfully!");
    println!("  Data directory: {}", data_dir);
    println!("  Configuration:  {}", config_path.display());
    println!("  Database:       {}", db_path_str);
    println!("  ILS driver:     {}", config.catalog.driver);
    println!();
    println!("Next steps:");
    println!(
        "  1. Edit {} to configure your ILS driver and login method",
        config_path.display()
    );
    println!("  2. Add an [oai.<name>] section for each repository to harvest");
    println!("  3. Run `stacks capabilities` to check which patron functions are offered");
    println!("  4. Run `stacks harvest` to fetch records");

    Ok(())
}
