use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "stacks", about = "Library catalog ILS connection and harvesting", version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "stacks.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Initialize the data directory, configuration, and patron database
    Init {
        /// Data directory path
        #[arg(long, default_value = "/var/lib/stacks")]
        data_dir: String,
        /// ILS driver to configure
        #[arg(long, default_value = "noils")]
        driver: String,
    },
    /// Harvest records from the configured OAI-PMH targets
    Harvest {
        /// Harvest only this target
        target: Option<String>,
        /// Start date overriding the saved checkpoint
        #[arg(long)]
        from: Option<String>,
    },
    /// Authenticate a patron with the configured method
    Auth {
        #[arg(long, env = "STACKS_USERNAME")]
        username: String,
        #[arg(long, env = "STACKS_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Show which optional ILS functions are available
    Capabilities,
    /// Show driver state and harvest checkpoints
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { data_dir, driver } => {
            commands::init::run(&data_dir, &driver).await?;
        }
        Commands::Harvest { target, from } => {
            commands::harvest::run(&cli.config, target.as_deref(), from.as_deref()).await?;
        }
        Commands::Auth { username, password } => {
            commands::auth::run(&cli.config, &username, &password).await?;
        }
        Commands::Capabilities => {
            commands::capabilities::run(&cli.config)?;
        }
        Commands::Status => {
            commands::status::run(&cli.config)?;
        }
    }

    Ok(())
}
