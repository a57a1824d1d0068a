mod agent;
mod classify;
mod config;
mod errors;
mod model;
mod recovery;
mod report;
mod telemetry;
mod transport;
mod tuya;

use anyhow::Context;
use clap::Parser;
use config::{Cli, Command, Config};
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

fn main() {
    // The environment is only mutated here, before the runtime spawns workers
    let dotenv_failure = config::load_dotenv();
    let cli = Cli::parse();

    if let Some(Command::Version) = cli.command {
        println!("Version: {}", config::VERSION);
        println!("Commit: {}", config::GIT_COMMIT);
        println!("Built: {}", config::BUILD_DATE);
        return;
    }

    let debug_mode = cli.settings.debug;
    init_logging(debug_mode);
    if let Some((path, e)) = dotenv_failure {
        warn!("Failed to load {}: {}", path.display(), e);
    }

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
        .and_then(|runtime| runtime.block_on(run(cli)));

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_settings(cli.settings).context("Failed to load config")?;
    debug!(
        "Checking device {} via {} ({})",
        config.device_id, config.api_host, config.region
    );

    let client = tuya::TuyaClient::new(&config).context("Failed to create API client")?;

    agent::run_once(&client, &config).await.context("Run failed")?;
    Ok(())
}

fn init_logging(debug_mode: bool) {
    let default_level = if debug_mode { "info,watchdog=debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
