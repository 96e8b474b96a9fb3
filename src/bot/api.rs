//! Outbound Telegram API seam.
//!
//! Every platform call the gate makes goes through [`ChannelGateApi`], so
//! handler logic never touches [`Bot`] directly and tests can substitute a
//! mock. The real implementation wraps sends and edits in
//! [`crate::utils::retry_telegram_operation`].

use async_trait::async_trait;
use std::path::PathBuf;
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQueryId, ChatId, ChatMemberStatus, InlineKeyboardMarkup, InputFile, MessageId,
    ParseMode, Recipient, UserId,
};
use thiserror::Error;

use crate::utils::retry_telegram_operation;

/// Errors produced by outbound Telegram calls
#[derive(Debug, Error)]
pub enum ApiError {
    /// The Bot API rejected the request or the network failed
    #[error("telegram request failed: {0}")]
    Telegram(#[from] teloxide::RequestError),
}

/// Interface over the outbound Telegram calls used by the gate
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChannelGateApi: Send + Sync {
    /// Query the membership status of `user` in `channel`
    async fn member_status(
        &self,
        channel: Recipient,
        user: UserId,
    ) -> Result<ChatMemberStatus, ApiError>;

    /// Send an HTML-formatted text message, optionally with an inline keyboard
    async fn send_text(
        &self,
        chat: ChatId,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), ApiError>;

    /// Send a local photo file, optionally with caption and inline keyboard
    async fn send_photo(
        &self,
        chat: Recipient,
        photo: PathBuf,
        caption: Option<String>,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), ApiError>;

    /// Send a local document with a caption
    async fn send_document(
        &self,
        chat: ChatId,
        document: PathBuf,
        caption: String,
    ) -> Result<(), ApiError>;

    /// Replace the text of an already sent message
    async fn edit_text(&self, chat: ChatId, message: MessageId, text: String)
        -> Result<(), ApiError>;

    /// Answer a callback query with an alert or toast
    async fn answer_callback(
        &self,
        id: CallbackQueryId,
        text: String,
        show_alert: bool,
    ) -> Result<(), ApiError>;
}

/// Production [`ChannelGateApi`] backed by a teloxide [`Bot`]
#[derive(Clone)]
pub struct TelegramGate {
    bot: Bot,
}

impl TelegramGate {
    /// Wrap a bot instance
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChannelGateApi for TelegramGate {
    async fn member_status(
        &self,
        channel: Recipient,
        user: UserId,
    ) -> Result<ChatMemberStatus, ApiError> {
        // Not retried: the caller treats any failure as "not subscribed",
        // and the user can simply press the button again.
        let member = self.bot.get_chat_member(channel, user).await?;
        Ok(member.status())
    }

    async fn send_text(
        &self,
        chat: ChatId,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), ApiError> {
        retry_telegram_operation(|| async {
            let mut req = self
                .bot
                .send_message(chat, text.clone())
                .parse_mode(ParseMode::Html);
            if let Some(kb) = keyboard.clone() {
                req = req.reply_markup(kb);
            }
            req.await.map(|_| ()).map_err(ApiError::Telegram)
        })
        .await
    }

    async fn send_photo(
        &self,
        chat: Recipient,
        photo: PathBuf,
        caption: Option<String>,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), ApiError> {
        retry_telegram_operation(|| async {
            let mut req = self
                .bot
                .send_photo(chat.clone(), InputFile::file(photo.clone()));
            if let Some(text) = caption.clone() {
                req = req.caption(text).parse_mode(ParseMode::Html);
            }
            if let Some(kb) = keyboard.clone() {
                req = req.reply_markup(kb);
            }
            req.await.map(|_| ()).map_err(ApiError::Telegram)
        })
        .await
    }

    async fn send_document(
        &self,
        chat: ChatId,
        document: PathBuf,
        caption: String,
    ) -> Result<(), ApiError> {
        retry_telegram_operation(|| async {
            self.bot
                .send_document(chat, InputFile::file(document.clone()))
                .caption(caption.clone())
                .await
                .map(|_| ())
                .map_err(ApiError::Telegram)
        })
        .await
    }

    async fn edit_text(
        &self,
        chat: ChatId,
        message: MessageId,
        text: String,
    ) -> Result<(), ApiError> {
        retry_telegram_operation(|| async {
            self.bot
                .edit_message_text(chat, message, text.clone())
                .parse_mode(ParseMode::Html)
                .await
                .map(|_| ())
                .map_err(ApiError::Telegram)
        })
        .await
    }

    async fn answer_callback(
        &self,
        id: CallbackQueryId,
        text: String,
        show_alert: bool,
    ) -> Result<(), ApiError> {
        // Callback queries expire quickly, a retried answer would be stale.
        self.bot
            .answer_callback_query(id)
            .text(text)
            .show_alert(show_alert)
            .await?;
        Ok(())
    }
}
