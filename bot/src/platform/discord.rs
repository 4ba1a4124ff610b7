use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::header::CONTENT_LENGTH;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use super::{
    Attachment, Author, ChannelHistory, ChannelId, DocumentStore, GuildDirectory, GuildId,
    Message, MessageHandle, MessageId, NotificationSink, TextChannel,
};

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Largest page the message history endpoint returns.
pub const MAX_PAGE_SIZE: usize = 100;

/// Guild text channel type.
const GUILD_TEXT: u8 = 0;

/// Longest rate-limit wait honored before giving up on a request.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct PartialGuild {
    id: GuildId,
}

#[derive(Deserialize)]
struct RawChannel {
    id: ChannelId,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    parent_id: Option<ChannelId>,
}

#[derive(Deserialize)]
struct RateLimited {
    retry_after: f64,
}

/// Discord REST client authenticated as a bot user.
pub struct DiscordClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl DiscordClient {
    pub fn new(token: &str, api_base: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(
                "DiscordBot (https://github.com/roster-bot, ",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Send an authenticated request, waiting out one rate limit if asked to.
    /// `build` is called again for the retry since multipart bodies can't be cloned.
    async fn execute<F>(&self, what: &str, build: F) -> Result<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let resp = self.send_once(what, &build).await?;

        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            let wait = resp
                .json::<RateLimited>()
                .await
                .map(|r| {
                    let secs = r.retry_after.clamp(0.0, MAX_RETRY_AFTER.as_secs_f64() + 1.0);
                    Duration::from_secs_f64(secs)
                })
                .unwrap_or(Duration::from_secs(1));
            if wait > MAX_RETRY_AFTER {
                return Err(anyhow!("{what}: rate limited for {:?}", wait));
            }
            warn!(%what, ?wait, "rate limited by Discord, retrying");
            tokio::time::sleep(wait).await;
            let resp = self.send_once(what, &build).await?;
            return check_status(what, resp).await;
        }

        check_status(what, resp).await
    }

    async fn send_once<F>(&self, what: &str, build: &F) -> Result<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        build(&self.http)
            .header("Authorization", format!("Bot {}", self.token))
            .send()
            .await
            .with_context(|| format!("{what}: HTTP request to Discord failed"))
    }

    async fn get_json<T: DeserializeOwned>(&self, what: &str, url: String) -> Result<T> {
        self.execute(what, |http| http.get(&url))
            .await?
            .json::<T>()
            .await
            .with_context(|| format!("{what}: failed to parse Discord response"))
    }

    async fn message_page(
        &self,
        channel: ChannelId,
        limit: usize,
        cursor: Option<(&str, MessageId)>,
    ) -> Result<Vec<Message>> {
        let mut url = self.url(&format!(
            "/channels/{channel}/messages?limit={}",
            limit.clamp(1, MAX_PAGE_SIZE)
        ));
        if let Some((key, id)) = cursor {
            url.push_str(&format!("&{key}={id}"));
        }
        self.get_json("fetch messages", url).await
    }

    fn message_url(&self, message: MessageHandle) -> String {
        self.url(&format!(
            "/channels/{}/messages/{}",
            message.channel_id, message.message_id
        ))
    }
}

/// Discord rejects bodyless PUTs that lack a Content-Length.
fn empty_put(http: &reqwest::Client, url: &str) -> RequestBuilder {
    http.put(url).header(CONTENT_LENGTH, "0")
}

async fn check_status(what: &str, resp: Response) -> Result<Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body_text = resp.text().await.unwrap_or_default();
    Err(anyhow!("{what}: Discord returned {status}: {body_text}"))
}

#[async_trait]
impl ChannelHistory for DiscordClient {
    async fn recent_messages(&self, channel: ChannelId, limit: usize) -> Result<Vec<Message>> {
        let mut messages: Vec<Message> = Vec::with_capacity(limit);

        while messages.len() < limit {
            let want = (limit - messages.len()).min(MAX_PAGE_SIZE);
            let before = messages.last().map(|m| ("before", m.id));
            let page = self.message_page(channel, want, before).await?;
            let exhausted = page.len() < want;
            messages.extend(page);
            if exhausted {
                break;
            }
        }

        messages.truncate(limit);
        debug!(%channel, count = messages.len(), "fetched channel history");
        Ok(messages)
    }
}

#[async_trait]
impl DocumentStore for DiscordClient {
    async fn read_attachment(&self, attachment: &Attachment) -> Result<Vec<u8>> {
        // CDN URLs are signed; no bot token needed.
        let resp = self
            .http
            .get(&attachment.url)
            .send()
            .await
            .context("Attachment download failed")?;
        let resp = check_status("download attachment", resp).await?;
        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .context("Failed to read attachment body")
    }

    async fn send_document(
        &self,
        channel: ChannelId,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<MessageHandle> {
        let url = self.url(&format!("/channels/{channel}/messages"));
        let payload = json!({ "attachments": [{ "id": 0, "filename": filename }] }).to_string();

        let message: Message = self
            .execute("upload document", |http| {
                let file = Part::bytes(bytes.clone()).file_name(filename.to_string());
                let form = Form::new()
                    .text("payload_json", payload.clone())
                    .part("files[0]", file);
                http.post(&url).multipart(form)
            })
            .await?
            .json()
            .await
            .context("Failed to parse uploaded message")?;

        Ok(message.handle())
    }

    async fn pin(&self, message: MessageHandle) -> Result<()> {
        let url = self.url(&format!(
            "/channels/{}/pins/{}",
            message.channel_id, message.message_id
        ));
        self.execute("pin message", |http| empty_put(http, &url)).await?;
        Ok(())
    }

    async fn delete(&self, message: MessageHandle) -> Result<()> {
        let url = self.message_url(message);
        self.execute("delete message", |http| http.delete(&url))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for DiscordClient {
    async fn send_text(&self, channel: ChannelId, text: &str) -> Result<MessageHandle> {
        let url = self.url(&format!("/channels/{channel}/messages"));
        let body = json!({
            "content": text,
            "allowed_mentions": { "parse": ["users"] },
        });
        let message: Message = self
            .execute("send message", |http| http.post(&url).json(&body))
            .await?
            .json()
            .await
            .context("Failed to parse sent message")?;
        Ok(message.handle())
    }

    async fn react(&self, message: MessageHandle, emoji: &str) -> Result<()> {
        let url = format!(
            "{}/reactions/{}/@me",
            self.message_url(message),
            urlencoding::encode(emoji)
        );
        self.execute("add reaction", |http| empty_put(http, &url))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl GuildDirectory for DiscordClient {
    async fn current_user(&self) -> Result<Author> {
        self.get_json("fetch current user", self.url("/users/@me"))
            .await
    }

    async fn category_text_channels(&self, category: ChannelId) -> Result<Vec<TextChannel>> {
        let guilds: Vec<PartialGuild> = self
            .get_json("list guilds", self.url("/users/@me/guilds"))
            .await?;

        let mut channels = Vec::new();
        for guild in guilds {
            let raw: Vec<RawChannel> = self
                .get_json(
                    "list guild channels",
                    self.url(&format!("/guilds/{}/channels", guild.id)),
                )
                .await?;
            channels.extend(text_channels_in_category(guild.id, raw, category));
        }
        Ok(channels)
    }

    async fn messages_after(
        &self,
        channel: ChannelId,
        after: MessageId,
        limit: usize,
    ) -> Result<Vec<Message>> {
        self.message_page(channel, limit, Some(("after", after)))
            .await
    }
}

fn text_channels_in_category(
    guild_id: GuildId,
    raw: Vec<RawChannel>,
    category: ChannelId,
) -> impl Iterator<Item = TextChannel> {
    raw.into_iter()
        .filter(move |c| c.kind == GUILD_TEXT && c.parent_id == Some(category))
        .map(move |c| TextChannel {
            id: c.id,
            guild_id,
            name: c.name.unwrap_or_default(),
            parent_id: c.parent_id,
        })
}
