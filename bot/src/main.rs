use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use roster_bot::config::BotConfig;
use roster_bot::gateway::{Dispatcher, MessageFeed, Session, run_reminders};
use roster_bot::platform::discord::DiscordClient;

#[derive(Parser)]
#[command(version, about = "Tracks pending submissions in Discord channels")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, default_value = "bot.toml")]
    config: String,

    /// Run one reminder pass over all watched channels and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = BotConfig::load(&cli.config).expect("failed to load configuration");
    let check_interval = config.check_interval();
    let poll_interval = config.poll_interval();

    let client = DiscordClient::new(&config.discord.token, &config.discord.api_base)
        .expect("failed to create Discord client");

    let session = Session::connect(Arc::new(client), config)
        .await
        .expect("failed to start session");

    let dispatcher = Arc::new(Dispatcher::new(&session));

    if cli.once {
        if let Err(e) = dispatcher.check_all_channels().await {
            error!(error = %e, "reminder pass failed");
            std::process::exit(1);
        }
        return;
    }

    info!(
        category = %session.config.category(),
        check_every_hours = session.config.schedule.check_interval_hours,
        "roster bot running"
    );

    let reminders = {
        let dispatcher = dispatcher.clone();
        let cancel = session.shutdown_token();
        tokio::spawn(async move { run_reminders(&dispatcher, check_interval, cancel).await })
    };

    let feed = {
        let dispatcher = dispatcher.clone();
        let cancel = session.shutdown_token();
        tokio::spawn(async move {
            MessageFeed::new()
                .run(&dispatcher, poll_interval, cancel)
                .await
        })
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
    session.close();

    let _ = tokio::join!(reminders, feed);
    info!("roster bot stopped");
}
