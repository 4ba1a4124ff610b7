use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use dashmap::{DashMap, DashSet};
use futures_util::future::join_all;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::dispatcher::Dispatcher;
use crate::platform::discord::MAX_PAGE_SIZE;
use crate::platform::{ChannelId, MessageId, Platform, TextChannel};

/// Inbound message feed built on history polling. Each watched channel keeps
/// a cursor at the newest message already seen. Channels present at startup
/// start at their newest message, so history from before startup is never
/// replayed. A channel that shows up later is read from its beginning.
#[derive(Default)]
pub struct MessageFeed {
    cursors: DashMap<ChannelId, MessageId>,
    /// Startup channels whose cursor has not been placed yet.
    unplaced: DashSet<ChannelId>,
    started: AtomicBool,
}

impl MessageFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self, channel: ChannelId) -> Option<MessageId> {
        self.cursors.get(&channel).map(|c| *c)
    }

    /// Poll every watched channel once. Returns how many messages were dispatched.
    pub async fn poll_once<P>(&self, dispatcher: &Dispatcher<P>) -> Result<usize>
    where
        P: Platform + ?Sized,
    {
        let channels = dispatcher.watched_channels().await?;
        if !self.started.swap(true, Ordering::SeqCst) {
            for ch in &channels {
                self.unplaced.insert(ch.id);
            }
        }

        // Forget channels that were deleted or moved out of the category.
        self.cursors
            .retain(|id, _| channels.iter().any(|c| c.id == *id));
        self.unplaced
            .retain(|id| channels.iter().any(|c| c.id == *id));

        let results = join_all(channels.iter().map(|ch| self.poll_channel(dispatcher, ch))).await;

        let mut dispatched = 0;
        for (ch, result) in channels.iter().zip(results) {
            match result {
                Ok(n) => dispatched += n,
                Err(e) => warn!(channel = %ch.id, error = %e, "failed to poll channel"),
            }
        }
        Ok(dispatched)
    }

    async fn poll_channel<P>(&self, dispatcher: &Dispatcher<P>, channel: &TextChannel) -> Result<usize>
    where
        P: Platform + ?Sized,
    {
        let platform = dispatcher.platform();

        let cursor = match self.cursor(channel.id) {
            Some(cursor) => cursor,
            None if self.unplaced.contains(&channel.id) => {
                let newest = platform
                    .recent_messages(channel.id, 1)
                    .await?
                    .first()
                    .map(|m| m.id)
                    .unwrap_or_default();
                self.cursors.insert(channel.id, newest);
                self.unplaced.remove(&channel.id);
                debug!(channel = %channel.id, name = %channel.name, cursor = %newest, "watching channel");
                return Ok(0);
            }
            None => {
                info!(channel = %channel.id, name = %channel.name, "new channel, reading from its start");
                MessageId::default()
            }
        };

        let mut batch = platform
            .messages_after(channel.id, cursor, MAX_PAGE_SIZE)
            .await?;
        if batch.is_empty() {
            return Ok(0);
        }

        batch.sort_by_key(|m| m.id);
        if let Some(last) = batch.last() {
            self.cursors.insert(channel.id, last.id);
        }

        // One channel's messages are handled in arrival order.
        for message in &batch {
            dispatcher.handle_message(channel, message).await;
        }
        Ok(batch.len())
    }

    /// Poll on a fixed interval until `cancel` fires.
    pub async fn run<P>(&self, dispatcher: &Dispatcher<P>, every: Duration, cancel: CancellationToken)
    where
        P: Platform + ?Sized,
    {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(?every, "message feed started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("message feed shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once(dispatcher).await {
                        warn!(error = %e, "message poll failed");
                    }
                }
            }
        }
    }
}
