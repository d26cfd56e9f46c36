use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::info;

use guildhall::bot::Bot;
use guildhall::config::GuildhallConfig;
use guildhall::gateway::{ChatOps, GatewayEvent, RestChat};
use guildhall::shutdown::ShutdownCoordinator;
use guildhall::telemetry::{init_telemetry, shutdown_telemetry};

#[derive(Parser)]
#[command(name = "guildhall", about = "Chat-platform bot: voice rooms, votes, donation ledger")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot event loop
    Run,
    /// Validate configuration and exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    GuildhallConfig::load_env_file()?;
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run().await,
        Commands::CheckConfig => check_config(),
    }
}

fn check_config() -> Result<()> {
    let config = GuildhallConfig::load()?;
    config.validate()?;
    println!("Configuration OK");
    println!("  api_base:       {}", config.chat.api_base);
    println!("  guild:          {}", config.chat.guild_id);
    println!("  command prefix: {}", config.chat.command_prefix);
    println!("  review channel: {}", config.influence.review_channel_id);
    println!("  voice lobby:    {}", config.voice.lobby_channel_id);
    Ok(())
}

async fn run() -> Result<()> {
    let config = GuildhallConfig::load()?;
    config.validate()?;
    init_telemetry(
        config.observability.json_logs,
        &config.observability.log_level,
    )?;

    let token = config
        .chat
        .token
        .clone()
        .unwrap_or_default();
    let chat: Arc<dyn ChatOps> = Arc::new(RestChat::new(
        token,
        config.chat.api_base.clone(),
        config.chat.guild_id.clone(),
        config.chat.rate_limit.requests_per_second,
        config.chat.rate_limit.burst_capacity,
    )?);

    let shutdown = ShutdownCoordinator::new();
    shutdown.install_signal_handlers()?;

    // The connection layer owns the sender and feeds translated events in.
    let (event_tx, event_rx) = mpsc::channel::<GatewayEvent>(256);

    let bot = Bot::new(chat, config, Utc::now());
    info!("guildhall starting");
    bot.run(event_rx, shutdown.subscribe()).await;
    drop(event_tx);

    shutdown_telemetry();
    info!("guildhall stopped");
    Ok(())
}
