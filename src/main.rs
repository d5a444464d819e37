use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};

use scholarly::cli::{self, Cli};
use scholarly::config::ScholarConfig;
use scholarly::logging::{init_logging, log_system_info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let mut config = ScholarConfig::load_from_file(path)?;
            config.apply_env_overrides();
            config
        }
        None => ScholarConfig::load_from_env(),
    };
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_logging(&config.logging)?;
    log_system_info();

    #[cfg(feature = "advanced_logging")]
    if let Err(e) = scholarly::logging::cleanup_old_logs(&config.logging) {
        tracing::warn!(error = %e, "Could not prune old log files");
    }
    debug!(?config, "Configuration loaded");

    let result = cli::run(cli, config).await;
    info!(success = result.is_ok(), "Scholarly finished");
    result
}
