use anyhow::Result;
use clap::{Parser, Subcommand};

use shared_utils::env::get_env_var_or;
use trend_bot::bot::TrendBot;
use trend_bot::config::{BotConfig, Secrets, load_config_path};

#[derive(Parser)]
#[command(version, about = "Session-scheduled crypto market reports")]
struct Cli {
    /// Path to the config file (trend_bot.toml). Falls back to the
    /// TREND_BOT_CONFIG environment variable, then to built-in defaults.
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run the notification scheduler until interrupted.
    Run,
    /// Run a single analysis + notification pass and exit.
    Once,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config_path(path)?,
        None => {
            let path = get_env_var_or("TREND_BOT_CONFIG", "");
            if path.is_empty() {
                BotConfig::default()
            } else {
                load_config_path(&path)?
            }
        }
    };
    let secrets = Secrets::from_env()?;

    let bot = TrendBot::new(config, secrets)?;
    match cli.cmd {
        Cmd::Run => bot.run_scheduled().await,
        Cmd::Once => bot.notify_once().await,
    }
}
