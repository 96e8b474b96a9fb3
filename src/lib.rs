#![deny(missing_docs)]
//! Subscription Gate Telegram bot
//!
//! Gates PDF guides behind a channel-subscription check and lets designated
//! owners publish promotional posts with inline buttons to the channel.

/// Telegram bot implementation
pub mod bot;
/// Configuration management
pub mod config;
pub mod utils;
