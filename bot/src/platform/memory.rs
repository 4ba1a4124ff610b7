//! In-memory platform used by tests. Channels are plain vectors of messages,
//! attachments live in a blob map keyed by URL, and every outbound call can be
//! made to fail.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use chrono::Utc;

use super::{
    Attachment, AttachmentId, Author, ChannelHistory, ChannelId, DocumentStore, GuildDirectory,
    GuildId, Message, MessageHandle, MessageId, NotificationSink, TextChannel, UserId,
};

pub const BOT_USER_ID: UserId = UserId(1_000_000);

#[derive(Default)]
pub struct Faults {
    pub read: bool,
    pub send_document: bool,
    pub send_text: bool,
    pub pin: bool,
    pub delete: bool,
    pub react: bool,
    pub list_channels: bool,
}

#[derive(Default)]
struct State {
    next_id: u64,
    /// Oldest first, like the channel itself.
    channels: HashMap<ChannelId, Vec<Message>>,
    blobs: HashMap<String, Vec<u8>>,
    text_channels: Vec<TextChannel>,
    pins: HashSet<MessageHandle>,
    deleted: Vec<MessageHandle>,
    reactions: Vec<(MessageHandle, String)>,
    texts: Vec<(ChannelId, String)>,
    faults: Faults,
}

pub struct MemoryPlatform {
    state: Mutex<State>,
    bot: Author,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 1000,
                ..State::default()
            }),
            bot: Author {
                id: BOT_USER_ID,
                username: "roster-bot".into(),
                bot: true,
            },
        }
    }

    pub fn add_text_channel(&self, id: u64, name: &str, parent: Option<u64>) -> TextChannel {
        let ch = TextChannel {
            id: ChannelId(id),
            guild_id: GuildId(10),
            name: name.into(),
            parent_id: parent.map(ChannelId),
        };
        self.state.lock().unwrap().text_channels.push(ch.clone());
        ch
    }

    pub fn set_faults(&self, f: impl FnOnce(&mut Faults)) {
        f(&mut self.state.lock().unwrap().faults);
    }

    /// Append a message from `author` with optional file attachments.
    pub fn post(
        &self,
        channel: ChannelId,
        author: UserId,
        content: &str,
        files: &[(&str, &[u8])],
    ) -> Message {
        let mut state = self.state.lock().unwrap();
        let author = if author == self.bot.id {
            self.bot.clone()
        } else {
            Author {
                id: author,
                username: format!("user{author}"),
                bot: false,
            }
        };
        push_message(&mut state, channel, author, content, files)
    }

    /// Append `count` plain chatter messages.
    pub fn post_filler(&self, channel: ChannelId, count: usize) {
        for i in 0..count {
            self.post(channel, UserId(9999), &format!("chatter {i}"), &[]);
        }
    }

    pub fn messages(&self, channel: ChannelId) -> Vec<Message> {
        let state = self.state.lock().unwrap();
        state.channels.get(&channel).cloned().unwrap_or_default()
    }

    /// Raw bytes of every live attachment named `filename`, oldest first.
    pub fn documents(&self, channel: ChannelId, filename: &str) -> Vec<(MessageHandle, Vec<u8>)> {
        let state = self.state.lock().unwrap();
        state
            .channels
            .get(&channel)
            .into_iter()
            .flatten()
            .flat_map(|m| {
                m.attachments
                    .iter()
                    .filter(|a| a.filename == filename)
                    .map(|a| (m.handle(), state.blobs[&a.url].clone()))
            })
            .collect()
    }

    pub fn is_pinned(&self, message: MessageHandle) -> bool {
        self.state.lock().unwrap().pins.contains(&message)
    }

    pub fn deleted(&self) -> Vec<MessageHandle> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn reactions(&self) -> Vec<(MessageHandle, String)> {
        self.state.lock().unwrap().reactions.clone()
    }

    pub fn texts(&self, channel: ChannelId) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .texts
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, t)| t.clone())
            .collect()
    }
}

fn push_message(
    state: &mut State,
    channel: ChannelId,
    author: Author,
    content: &str,
    files: &[(&str, &[u8])],
) -> Message {
    state.next_id += 1;
    let id = state.next_id;
    let mut attachments = Vec::new();
    for (i, (name, bytes)) in files.iter().enumerate() {
        let att_id = id * 100 + i as u64;
        let url = format!("memory://{channel}/{att_id}/{name}");
        state.blobs.insert(url.clone(), bytes.to_vec());
        attachments.push(Attachment {
            id: AttachmentId(att_id),
            filename: name.to_string(),
            size: bytes.len() as u64,
            url,
        });
    }
    let message = Message {
        id: MessageId(id),
        channel_id: channel,
        author,
        content: content.to_string(),
        attachments,
        timestamp: Utc::now(),
    };
    state
        .channels
        .entry(channel)
        .or_default()
        .push(message.clone());
    message
}

#[async_trait]
impl ChannelHistory for MemoryPlatform {
    async fn recent_messages(&self, channel: ChannelId, limit: usize) -> Result<Vec<Message>> {
        let state = self.state.lock().unwrap();
        if state.faults.read {
            bail!("history unavailable");
        }
        Ok(state
            .channels
            .get(&channel)
            .map(|msgs| msgs.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl DocumentStore for MemoryPlatform {
    async fn read_attachment(&self, attachment: &Attachment) -> Result<Vec<u8>> {
        let state = self.state.lock().unwrap();
        if state.faults.read {
            bail!("attachment download failed");
        }
        state
            .blobs
            .get(&attachment.url)
            .cloned()
            .ok_or_else(|| anyhow!("no blob at {}", attachment.url))
    }

    async fn send_document(
        &self,
        channel: ChannelId,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<MessageHandle> {
        let mut state = self.state.lock().unwrap();
        if state.faults.send_document {
            bail!("upload rejected");
        }
        let bot = self.bot.clone();
        Ok(push_message(&mut state, channel, bot, "", &[(filename, &bytes[..])]).handle())
    }

    async fn pin(&self, message: MessageHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.faults.pin {
            bail!("pin rejected");
        }
        state.pins.insert(message);
        Ok(())
    }

    async fn delete(&self, message: MessageHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.faults.delete {
            bail!("delete rejected");
        }
        let msgs = state.channels.entry(message.channel_id).or_default();
        let before = msgs.len();
        msgs.retain(|m| m.id != message.message_id);
        if msgs.len() == before {
            bail!("unknown message {}", message.message_id);
        }
        state.pins.remove(&message);
        state.deleted.push(message);
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for MemoryPlatform {
    async fn send_text(&self, channel: ChannelId, text: &str) -> Result<MessageHandle> {
        let mut state = self.state.lock().unwrap();
        if state.faults.send_text {
            bail!("send rejected");
        }
        state.texts.push((channel, text.to_string()));
        let bot = self.bot.clone();
        Ok(push_message(&mut state, channel, bot, text, &[]).handle())
    }

    async fn react(&self, message: MessageHandle, emoji: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.faults.react {
            bail!("reaction rejected");
        }
        state.reactions.push((message, emoji.to_string()));
        Ok(())
    }
}

#[async_trait]
impl GuildDirectory for MemoryPlatform {
    async fn current_user(&self) -> Result<Author> {
        Ok(self.bot.clone())
    }

    async fn category_text_channels(&self, category: ChannelId) -> Result<Vec<TextChannel>> {
        let state = self.state.lock().unwrap();
        if state.faults.list_channels {
            bail!("guild listing failed");
        }
        Ok(state
            .text_channels
            .iter()
            .filter(|c| c.parent_id == Some(category))
            .cloned()
            .collect())
    }

    async fn messages_after(
        &self,
        channel: ChannelId,
        after: MessageId,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let state = self.state.lock().unwrap();
        if state.faults.read {
            bail!("history unavailable");
        }
        // Newest first, like the real API.
        Ok(state
            .channels
            .get(&channel)
            .map(|msgs| {
                let newer: Vec<_> = msgs.iter().filter(|m| m.id > after).cloned().collect();
                newer.into_iter().take(limit).rev().collect()
            })
            .unwrap_or_default())
    }
}
