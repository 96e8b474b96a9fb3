//! Explicitly constructed handler context.
//!
//! Everything a handler needs — platform channel, owner allow-list, asset
//! paths, follow-up delay — is resolved once at startup from [`Settings`] and
//! injected via `dptree::deps!`, instead of living in process-wide globals.

use anyhow::{Context as _, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use teloxide::types::Recipient;
use url::Url;

use crate::config::Settings;

/// Read-only context shared by all gate handlers
#[derive(Debug, Clone)]
pub struct GateContext {
    /// Channel whose membership gates the file
    pub channel: Recipient,
    /// Public URL of the channel for the "go to channel" button
    pub channel_url: Url,
    /// Deep link back into the bot for the promo post button
    pub promo_deep_link: Url,
    /// User ids allowed to run /post
    pub owners: HashSet<i64>,
    /// Cover image sent at the top of every /start reply
    pub cover_image: PathBuf,
    /// Promo image posted to the channel
    pub promo_image: PathBuf,
    /// The gated PDF
    pub gated_file: PathBuf,
    /// Document sent by the follow-up job
    pub followup_file: PathBuf,
    /// Delay before the follow-up document is sent
    pub followup_delay: Duration,
}

impl GateContext {
    /// Resolve the context from loaded settings.
    ///
    /// # Errors
    ///
    /// Returns an error if either configured URL does not parse.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let channel_url = Url::parse(&settings.channel_url)
            .with_context(|| format!("invalid channel_url: {}", settings.channel_url))?;
        let promo_deep_link = Url::parse(&settings.promo_deep_link)
            .with_context(|| format!("invalid promo_deep_link: {}", settings.promo_deep_link))?;

        Ok(Self {
            channel: settings.channel_recipient(),
            channel_url,
            promo_deep_link,
            owners: settings.owner_ids(),
            cover_image: settings.cover_image.clone(),
            promo_image: settings.promo_image.clone(),
            gated_file: settings.gated_file.clone(),
            followup_file: settings.followup_file.clone(),
            followup_delay: Duration::from_secs(settings.followup_delay_secs),
        })
    }
}
