use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::info;

use crate::engine::reconciler::{DEFAULT_SCAN_LIMIT, EngineSettings};
use crate::engine::roster::DEFAULT_REMINDER_HEADER;
use crate::platform::ChannelId;
use crate::platform::discord::DEFAULT_API_BASE;

/// One year.
const MAX_CHECK_INTERVAL_HOURS: u64 = 24 * 365;

/// Top-level bot configuration, loaded from bot.toml.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct BotConfig {
    pub discord: DiscordSection,
    pub roster: RosterSection,
    pub schedule: ScheduleSection,
    pub submission: SubmissionSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DiscordSection {
    pub token: String,
    pub api_base: String,
    /// Only channels filed under this category are watched.
    pub category_id: Option<u64>,
}

impl Default for DiscordSection {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base: DEFAULT_API_BASE.into(),
            category_id: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RosterSection {
    /// How many recent messages are searched for the published roster.
    pub scan_limit: usize,
    pub reminder_header: String,
}

impl Default for RosterSection {
    fn default() -> Self {
        Self {
            scan_limit: DEFAULT_SCAN_LIMIT,
            reminder_header: DEFAULT_REMINDER_HEADER.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScheduleSection {
    pub check_interval_hours: u64,
    pub poll_interval_secs: u64,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            check_interval_hours: 12,
            poll_interval_secs: 5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SubmissionSection {
    /// Hosts a submission URL must belong to. Empty accepts any http(s) URL.
    pub allowed_hosts: Vec<String>,
    pub ack_emoji: String,
}

impl Default for SubmissionSection {
    fn default() -> Self {
        Self {
            allowed_hosts: Vec::new(),
            ack_emoji: "👍".into(),
        }
    }
}

impl BotConfig {
    /// Load config from a TOML file. Falls back to defaults if the file doesn't exist.
    /// Environment variables override TOML values.
    pub fn load(path: &str) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// `load` with the environment replaced by `var`.
    fn load_with(path: &str, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {path}"))?;
            toml::from_str(&contents)
                .with_context(|| format!("failed to parse config file {path}"))?
        } else {
            info!("No config file found at {}, using defaults", path);
            Self::default()
        };

        config.apply_overrides(var);
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("DISCORD_BOT_TOKEN") {
            self.discord.token = v;
        }
        if let Some(v) = var("DISCORD_API_BASE") {
            self.discord.api_base = v;
        }
        if let Some(v) = var("CATEGORY_ID")
            && let Ok(id) = v.trim().parse()
        {
            self.discord.category_id = Some(id);
        }
        if let Some(v) = var("SCAN_LIMIT")
            && let Ok(n) = v.parse()
        {
            self.roster.scan_limit = n;
        }
        if let Some(v) = var("CHECK_INTERVAL_HOURS")
            && let Ok(h) = v.parse()
        {
            self.schedule.check_interval_hours = h;
        }
        if let Some(v) = var("POLL_INTERVAL_SECS")
            && let Ok(s) = v.parse()
        {
            self.schedule.poll_interval_secs = s;
        }
        if let Some(v) = var("SUBMISSION_HOSTS") {
            self.submission.allowed_hosts = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = var("ACK_EMOJI") {
            self.submission.ack_emoji = v;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.discord.token.trim().is_empty() {
            bail!("Discord bot token is not set (DISCORD_BOT_TOKEN or [discord].token)");
        }
        if matches!(self.discord.category_id, None | Some(0)) {
            bail!("watched category is not set (CATEGORY_ID or [discord].category_id)");
        }
        if self.roster.scan_limit == 0 {
            bail!("[roster].scan_limit must be at least 1");
        }
        if self.schedule.check_interval_hours == 0 || self.schedule.poll_interval_secs == 0 {
            bail!("[schedule] intervals must be non-zero");
        }
        if self.schedule.check_interval_hours > MAX_CHECK_INTERVAL_HOURS {
            bail!("[schedule].check_interval_hours must be at most {MAX_CHECK_INTERVAL_HOURS}");
        }
        Ok(())
    }

    /// The watched category. Only meaningful after `load` has validated it.
    pub fn category(&self) -> ChannelId {
        ChannelId(self.discord.category_id.unwrap_or_default())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.check_interval_hours.saturating_mul(60 * 60))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.poll_interval_secs)
    }

    /// Convert into the settings the roster engine runs with.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            scan_limit: self.roster.scan_limit,
            reminder_header: self.roster.reminder_header.clone(),
        }
    }
}
