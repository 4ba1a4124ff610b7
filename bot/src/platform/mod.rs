//! Narrow interfaces to the chat platform. The roster engine only talks to
//! these traits; `discord` implements them over the REST API.

pub mod discord;
pub mod ids;
#[cfg(test)]
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

pub use ids::{AttachmentId, ChannelId, GuildId, MessageId, UserId};

/// The author of a message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Author {
    pub id: UserId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

/// A file attached to a message. `url` is where the bytes can be downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub filename: String,
    #[serde(default)]
    pub size: u64,
    pub url: String,
}

/// A message as seen in channel history or delivered by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author: Author,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn handle(&self) -> MessageHandle {
        MessageHandle {
            channel_id: self.channel_id,
            message_id: self.id,
        }
    }

    /// First attachment with exactly this filename.
    pub fn attachment_named(&self, filename: &str) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.filename == filename)
    }
}

/// Locates a message for later pin/delete/react calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

/// A guild text channel, with the category it is filed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChannel {
    pub id: ChannelId,
    pub guild_id: GuildId,
    pub name: String,
    pub parent_id: Option<ChannelId>,
}

/// Recent channel history, newest first.
#[async_trait]
pub trait ChannelHistory: Send + Sync {
    /// Return at most `limit` of the most recent messages in `channel`, newest first.
    async fn recent_messages(&self, channel: ChannelId, limit: usize) -> Result<Vec<Message>>;
}

/// Channel messages used as a document store: attachments in, attachments out.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn read_attachment(&self, attachment: &Attachment) -> Result<Vec<u8>>;

    /// Post `bytes` as a file named `filename`. Returns the new message.
    async fn send_document(
        &self,
        channel: ChannelId,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<MessageHandle>;

    async fn pin(&self, message: MessageHandle) -> Result<()>;

    async fn delete(&self, message: MessageHandle) -> Result<()>;
}

/// Outbound user-visible notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send_text(&self, channel: ChannelId, text: &str) -> Result<MessageHandle>;

    async fn react(&self, message: MessageHandle, emoji: &str) -> Result<()>;
}

/// Discovery of who the bot is and which channels it can see.
#[async_trait]
pub trait GuildDirectory: Send + Sync {
    async fn current_user(&self) -> Result<Author>;

    /// Every text channel in every guild the bot is in, filed under `category`.
    async fn category_text_channels(&self, category: ChannelId) -> Result<Vec<TextChannel>>;

    /// Messages in `channel` newer than `after`, at most `limit`, in any order.
    async fn messages_after(
        &self,
        channel: ChannelId,
        after: MessageId,
        limit: usize,
    ) -> Result<Vec<Message>>;
}

/// Everything the bot needs from the platform.
pub trait Platform: ChannelHistory + DocumentStore + NotificationSink + GuildDirectory {}

impl<T> Platform for T where T: ChannelHistory + DocumentStore + NotificationSink + GuildDirectory {}
