use clap::Parser;
use node_warden::{
    alerter::{DryRunAlerter, TelegramAlerter},
    client::HttpStatusClient,
    config::AppConfig,
    service::run_pass,
    store::VotingPowerStore,
};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "node-warden",
    about = "Health checks for validator nodes with telegram alerts"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long = "config", default_value = "node-warden.toml")]
    config_path: PathBuf,
    /// Override the voting power state file from the config
    #[arg(long = "state-file")]
    state_path: Option<PathBuf>,
    /// Log the report instead of delivering it to telegram
    #[arg(long = "test-mode", default_value_t = false)]
    test_mode: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(error) = run().await {
        error!(error = %error, "node-warden run failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config_path).map_err(|error| error.to_string())?;
    // CLI flags take precedence over TOML values.
    if let Some(state_path) = cli.state_path {
        config.state_path = state_path;
    }
    if cli.test_mode {
        config.test_mode = true;
    }
    config.validate().map_err(|error| error.to_string())?;

    let client = HttpStatusClient::new(config.request_timeout());
    let mut store = VotingPowerStore::load(&config.state_path);

    let summary = if config.test_mode {
        run_pass(&config, &client, &mut store, &DryRunAlerter).await
    } else {
        let telegram = config
            .telegram
            .clone()
            .ok_or_else(|| "telegram configuration missing".to_owned())?;
        let alerter = TelegramAlerter::new(telegram.bot_token, telegram.chat_id);
        run_pass(&config, &client, &mut store, &alerter).await
    }
    .map_err(|error| error.to_string())?;

    info!(
        chains = summary.chains_checked,
        alerts = summary.alert_count,
        notified = summary.notified,
        "run complete"
    );

    Ok(())
}
