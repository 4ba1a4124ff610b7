use std::sync::Arc;

use anyhow::Result;
use futures_util::future::join_all;
use tracing::{debug, error, info, warn};

use super::session::Session;
use super::submission::SubmissionMatcher;
use crate::engine::{CheckOutcome, RosterEngine, SubmissionOutcome};
use crate::platform::{ChannelId, Message, Platform, TextChannel, UserId};

/// Notice posted when an uploaded participant list can't be used.
const INIT_FAILED_NOTICE: &str = "参加者リストを読み込めませんでした";

/// Totals from one reminder pass over every watched channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReminderSweep {
    pub checked: usize,
    pub reminded: usize,
    pub failed: usize,
}

/// Routes inbound messages and timer ticks to roster workflows.
pub struct Dispatcher<P: ?Sized> {
    platform: Arc<P>,
    engine: RosterEngine<P>,
    matcher: SubmissionMatcher,
    bot_id: UserId,
    category: ChannelId,
    ack_emoji: String,
}

impl<P> Dispatcher<P>
where
    P: Platform + ?Sized,
{
    pub fn new(session: &Session<P>) -> Self {
        let config = &session.config;
        Self {
            platform: session.platform.clone(),
            engine: RosterEngine::new(session.platform.clone(), config.engine_settings()),
            matcher: SubmissionMatcher::new(&config.submission.allowed_hosts),
            bot_id: session.bot_user.id,
            category: config.category(),
            ack_emoji: config.submission.ack_emoji.clone(),
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Text channels filed under the watched category.
    pub async fn watched_channels(&self) -> Result<Vec<TextChannel>> {
        self.platform.category_text_channels(self.category).await
    }

    /// Handle one inbound message. Failures are logged and, for a bad
    /// participant list, reported back into the channel; they never propagate.
    pub async fn handle_message(&self, channel: &TextChannel, message: &Message) {
        if message.author.id == self.bot_id {
            return;
        }
        if channel.parent_id != Some(self.category) {
            debug!(channel = %channel.id, "message outside watched category");
            return;
        }

        if !message.attachments.is_empty() {
            self.process_participant_list(message).await;
        }

        if self.matcher.is_submission(&message.content) {
            self.process_submission(message).await;
        }
    }

    async fn process_participant_list(&self, message: &Message) {
        let channel = message.channel_id;
        match self.engine.initialize_from_message(message).await {
            Ok(published) if published.is_empty() => {}
            Ok(published) => {
                info!(%channel, count = published.len(), "participant list accepted");
            }
            Err(e) => {
                error!(%channel, kind = e.kind(), error = %e, "participant list rejected");
                let notice = format!("{INIT_FAILED_NOTICE}: {e}");
                if let Err(e) = self.platform.send_text(channel, &notice).await {
                    warn!(%channel, error = %e, "failed to post error notice");
                }
            }
        }
    }

    async fn process_submission(&self, message: &Message) {
        let channel = message.channel_id;
        let author = message.author.id;

        if let Err(e) = self.platform.react(message.handle(), &self.ack_emoji).await {
            warn!(%channel, %author, error = %e, "failed to acknowledge submission");
        }

        match self.engine.record_submission(channel, author).await {
            Ok(SubmissionOutcome::Recorded { remaining, .. }) => {
                debug!(%channel, %author, remaining, "submission applied");
            }
            Ok(outcome) => debug!(%channel, %author, ?outcome, "submission not applied"),
            Err(e) => {
                error!(%channel, %author, kind = e.kind(), error = %e, "failed to record submission");
            }
        }
    }

    /// Run the roster check in every watched channel. Channels are checked
    /// concurrently; one failing channel doesn't stop the rest.
    pub async fn check_all_channels(&self) -> Result<ReminderSweep> {
        let channels = self.watched_channels().await?;

        let results = join_all(
            channels
                .iter()
                .map(|ch| async move { (ch.id, self.engine.check_channel(ch.id).await) }),
        )
        .await;

        let mut sweep = ReminderSweep {
            checked: results.len(),
            ..ReminderSweep::default()
        };
        for (channel, result) in results {
            match result {
                Ok(CheckOutcome::Reminded { .. }) => sweep.reminded += 1,
                Ok(_) => {}
                Err(e) => {
                    sweep.failed += 1;
                    error!(%channel, kind = e.kind(), error = %e, "roster check failed");
                }
            }
        }

        info!(
            checked = sweep.checked,
            reminded = sweep.reminded,
            failed = sweep.failed,
            "reminder pass complete"
        );
        Ok(sweep)
    }
}
