use std::path::Path;

use stacks_core::config::StacksConfig;
use stacks_core::ils::connection::Connection;
use stacks_core::ils::registry::DriverRegistry;
use stacks_harvest::harvester::CHECKPOINT_FILE;

/// Run the `status` command: show the driver in use and harvest checkpoints.
pub fn run(config_path: &str) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let connection = Connection::new(&config.catalog, &DriverRegistry::with_builtin())?;

    println!("Stacks Status");
    println!("=============");
    println!("Instance:   {}", config.stacks.instance_name);
    println!("Driver:     {}", driver_line(&config, &connection));
    if let Some(mode) = connection.offline_mode() {
        println!("Offline:    {mode}");
    }
    println!("Login:      {:?}", config.auth.method);
    println!();

    if config.oai.is_empty() {
        println!("No OAI-PMH targets configured.");
        return Ok(());
    }

    let base_dir = config.harvest_dir();
    println!("Harvest Targets");
    println!("---------------");
    for name in config.oai.keys() {
        let checkpoint = read_checkpoint(&base_dir.join(name).join(CHECKPOINT_FILE));
        println!(
            "{name}: last harvest {}",
            checkpoint.as_deref().unwrap_or("never")
        );
    }

    Ok(())
}

fn driver_line(config: &StacksConfig, connection: &Connection) -> String {
    if connection.is_fallback() {
        format!(
            "{} (configured driver {} failed to load)",
            connection.driver_name(),
            config.catalog.driver
        )
    } else {
        connection.driver_name().to_string()
    }
}

fn read_checkpoint(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let trimmed = content.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
