use stacks_core::config::StacksConfig;
use stacks_harvest::Harvester;
use tracing::{error, info};

/// Run the `harvest` command: harvest one named target, or every configured target.
pub async fn run(config_path: &str, target: Option<&str>, from: Option<&str>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let names = select_targets(&config, target)?;
    if names.is_empty() {
        println!("No OAI-PMH targets configured.");
        return Ok(());
    }

    let base_dir = config.harvest_dir();
    let mut failures = 0;
    for name in names {
        let target_config = &config.oai[&name];
        let mut harvester = Harvester::new(&name, target_config, &base_dir)?;
        if let Some(date) = from {
            harvester = harvester.with_start_date(date);
        }

        info!(target_name = %name, "starting harvest");
        match harvester.launch().await {
            Ok(summary) => {
                println!(
                    "{name}: {} records, {} deletions ({})",
                    summary.records,
                    summary.deleted,
                    harvester.directory().display()
                );
            }
            Err(e) => {
                error!(target_name = %name, error = %e, "harvest failed");
                println!("{name}: failed: {e}");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} harvest target(s) failed");
    }
    Ok(())
}

fn select_targets(config: &StacksConfig, target: Option<&str>) -> anyhow::Result<Vec<String>> {
    match target {
        Some(name) if config.oai.contains_key(name) => Ok(vec![name.to_string()]),
        Some(name) => anyhow::bail!("No OAI-PMH target named {name} in configuration"),
        None => Ok(config.oai.keys().cloned().collect()),
    }
}
