//! Configuration and settings management
//!
//! Loads settings from environment variables (and optional `config/` files)
//! and defines the fixed operational constants of the gate.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use teloxide::types::{ChatId, Recipient};

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Target channel: numeric chat id or `@username`
    pub channel: String,

    /// Public URL of the channel, used in the "go to channel" button
    #[serde(default = "default_channel_url")]
    pub channel_url: String,

    /// Deep link back into the bot, used in the promo post button
    #[serde(default = "default_promo_deep_link")]
    pub promo_deep_link: String,

    /// Comma-separated list of user IDs allowed to run /post
    #[serde(rename = "owner_ids")]
    pub owner_ids_str: Option<String>,

    /// Cover image sent at the top of every /start reply
    #[serde(default = "default_cover_image")]
    pub cover_image: PathBuf,

    /// Promo image posted to the channel by /post
    #[serde(default = "default_promo_image")]
    pub promo_image: PathBuf,

    /// The gated PDF released to confirmed subscribers
    #[serde(default = "default_gated_file")]
    pub gated_file: PathBuf,

    /// Second document sent by the delayed follow-up job
    #[serde(default = "default_followup_file")]
    pub followup_file: PathBuf,

    /// Delay before the follow-up document is sent, in seconds
    #[serde(default = "default_followup_delay_secs")]
    pub followup_delay_secs: u64,
}

fn default_channel_url() -> String {
    "https://t.me/bobscience".to_string()
}

fn default_promo_deep_link() -> String {
    "https://t.me/bobscience_bot?start=TGkanal".to_string()
}

fn default_cover_image() -> PathBuf {
    PathBuf::from("assets/cover.jpg")
}

fn default_promo_image() -> PathBuf {
    PathBuf::from("assets/promo.jpg")
}

fn default_gated_file() -> PathBuf {
    PathBuf::from("assets/lemon_battery_guide.pdf")
}

fn default_followup_file() -> PathBuf {
    PathBuf::from("assets/lemon_battery_report.pdf")
}

const fn default_followup_delay_secs() -> u64 {
    900
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading or deserialization fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(File::with_name("config/default").required(false))
            // Add in the current environment file
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked into git
            .add_source(File::with_name("config/local").required(false))
            // Settings from environment variables directly.
            // Environment::default() auto-converts UPPER_SNAKE_CASE to
            // snake_case; ignore_empty treats empty env vars as unset.
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }

    /// Returns the set of Telegram IDs allowed to run /post
    #[must_use]
    pub fn owner_ids(&self) -> HashSet<i64> {
        self.owner_ids_str
            .as_ref()
            .map(|s| {
                s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                    .filter(|token| !token.is_empty())
                    .filter_map(|id| id.parse::<i64>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the channel as a teloxide recipient.
    ///
    /// A numeric value becomes a chat id; anything else is treated as a
    /// channel username, with a leading `@` added when missing.
    #[must_use]
    pub fn channel_recipient(&self) -> Recipient {
        let raw = self.channel.trim();
        raw.parse::<i64>().map_or_else(
            |_| {
                if raw.starts_with('@') {
                    Recipient::ChannelUsername(raw.to_string())
                } else {
                    Recipient::ChannelUsername(format!("@{raw}"))
                }
            },
            |id| Recipient::Id(ChatId(id)),
        )
    }
}

// Telegram API retry configuration
/// Initial backoff for retried Telegram API calls, milliseconds
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff between retries, milliseconds
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 8_000;
/// Number of retry attempts for a failed Telegram API call
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
