use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::BotConfig;
use crate::platform::{Author, Platform};

/// Everything a running bot shares: the platform connection, who the bot is,
/// its configuration, and the token that stops it. Built once at startup and
/// handed to every task.
pub struct Session<P: ?Sized> {
    pub platform: Arc<P>,
    pub bot_user: Author,
    pub config: BotConfig,
    shutdown: CancellationToken,
}

impl<P> Session<P>
where
    P: Platform + ?Sized,
{
    /// Verify the credentials by asking the platform who we are.
    pub async fn connect(platform: Arc<P>, config: BotConfig) -> Result<Self> {
        let bot_user = platform
            .current_user()
            .await
            .context("failed to authenticate with Discord")?;

        info!(user_id = %bot_user.id, username = %bot_user.username, "session established");

        Ok(Self {
            platform,
            bot_user,
            config,
            shutdown: CancellationToken::new(),
        })
    }

    /// Token that fires when the session is closed.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn close(&self) {
        if !self.shutdown.is_cancelled() {
            info!("session closing");
            self.shutdown.cancel();
        }
    }
}
