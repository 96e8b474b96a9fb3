//! Subscription gate handlers.
//!
//! Every trigger resolves the user's current membership in the configured
//! channel and branches on it. Membership-query failures are fail-closed:
//! the user is treated as not subscribed rather than handed the file.
//! No per-user state is kept between calls; a successful re-check always
//! re-delivers the gated file.

use anyhow::Result;
use std::sync::Arc;
use teloxide::types::{
    CallbackQueryId, ChatId, ChatMemberStatus, MessageId, Recipient, UserId,
};
use tracing::{info, warn};

use crate::bot::api::ChannelGateApi;
use crate::bot::context::GateContext;
use crate::bot::followup::{FollowUpJob, FollowUpScheduler};
use crate::bot::views;

/// Interaction kinds carried by inline-button callback data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// The "I subscribed" button was pressed
    RecheckSubscription,
}

impl CallbackAction {
    /// Parse callback data into a tagged action, `None` for unknown tokens
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            views::CALLBACK_RECHECK => Some(Self::RecheckSubscription),
            _ => None,
        }
    }
}

const fn is_subscribed(status: &ChatMemberStatus) -> bool {
    matches!(
        status,
        ChatMemberStatus::Owner | ChatMemberStatus::Administrator | ChatMemberStatus::Member
    )
}

/// Fail-closed membership check: a query error counts as not subscribed.
async fn membership_allows(ctx: &GateContext, api: &dyn ChannelGateApi, user: UserId) -> bool {
    match api.member_status(ctx.channel.clone(), user).await {
        Ok(status) => is_subscribed(&status),
        Err(e) => {
            warn!(
                "Membership query for user {} failed, treating as not subscribed: {}",
                user, e
            );
            false
        }
    }
}

/// Handle /start: deliver the gated file to subscribers, otherwise prompt.
///
/// A deep-link token only attributes how the user found the bot; it never
/// changes the branch taken.
///
/// # Errors
///
/// Returns an error if a required outbound send fails.
pub async fn handle_start(
    ctx: &GateContext,
    api: &Arc<dyn ChannelGateApi>,
    scheduler: &FollowUpScheduler,
    chat: ChatId,
    user: UserId,
    deep_link: Option<&str>,
) -> Result<()> {
    if let Some(token) = deep_link {
        info!("User {} arrived via deep link '{}'", user, token);
    }

    // The cover is decoration; losing it must not block the gate.
    if let Err(e) = api
        .send_photo(Recipient::Id(chat), ctx.cover_image.clone(), None, None)
        .await
    {
        warn!("Failed to send cover image to chat {}: {}", chat, e);
    }

    if membership_allows(ctx, api.as_ref(), user).await {
        api.send_text(chat, views::SUBSCRIPTION_CONFIRMED.to_string(), None)
            .await?;
        api.send_document(
            chat,
            ctx.gated_file.clone(),
            views::GATED_FILE_CAPTION.to_string(),
        )
        .await?;
        scheduler.schedule(
            Arc::clone(api),
            FollowUpJob {
                chat,
                document: ctx.followup_file.clone(),
                caption: views::FOLLOWUP_CAPTION.to_string(),
                delay: ctx.followup_delay,
            },
        );
    } else {
        api.send_text(
            chat,
            views::subscribe_prompt(&ctx.channel),
            Some(views::subscribe_keyboard(&ctx.channel_url)),
        )
        .await?;
    }

    Ok(())
}

/// Handle the "I subscribed" button press.
///
/// Each successful re-check re-delivers the gated file; no delivery state is
/// cached, so repeated presses repeat the delivery. The re-check path never
/// schedules a follow-up.
///
/// # Errors
///
/// Returns an error if answering the callback or delivering the file fails.
pub async fn handle_recheck(
    ctx: &GateContext,
    api: &dyn ChannelGateApi,
    callback: CallbackQueryId,
    user: UserId,
    origin: Option<(ChatId, MessageId)>,
) -> Result<()> {
    match api.member_status(ctx.channel.clone(), user).await {
        Ok(status) if is_subscribed(&status) => {
            api.answer_callback(callback, views::RECHECK_CONFIRMED_ALERT.to_string(), true)
                .await?;

            // The prompt message may be gone or too old to edit; that is
            // not a reason to withhold the file.
            if let Some((chat, message)) = origin {
                if let Err(e) = api
                    .edit_text(chat, message, views::RECHECK_DELIVERY_TEXT.to_string())
                    .await
                {
                    warn!("Failed to edit prompt message in chat {}: {}", chat, e);
                }
            }

            let chat = ChatId(user.0.cast_signed());
            api.send_document(
                chat,
                ctx.gated_file.clone(),
                views::GATED_FILE_CAPTION.to_string(),
            )
            .await?;
        }
        Ok(_) => {
            api.answer_callback(
                callback,
                views::RECHECK_NOT_SUBSCRIBED_ALERT.to_string(),
                true,
            )
            .await?;
        }
        Err(e) => {
            warn!("Membership re-check for user {} failed: {}", user, e);
            api.answer_callback(callback, views::RECHECK_ERROR_ALERT.to_string(), true)
                .await?;
        }
    }

    Ok(())
}

/// Handle /post: owners publish the promo post to the channel.
///
/// # Errors
///
/// Returns an error if replying to the caller fails.
pub async fn handle_publish(
    ctx: &GateContext,
    api: &dyn ChannelGateApi,
    chat: ChatId,
    user: UserId,
) -> Result<()> {
    if !ctx.owners.contains(&user.0.cast_signed()) {
        api.send_text(chat, views::ACCESS_DENIED.to_string(), None)
            .await?;
        return Ok(());
    }

    let posted = api
        .send_photo(
            ctx.channel.clone(),
            ctx.promo_image.clone(),
            Some(views::PROMO_CAPTION.to_string()),
            Some(views::promo_keyboard(&ctx.promo_deep_link)),
        )
        .await;

    match posted {
        Ok(()) => {
            api.send_text(chat, views::POST_SENT.to_string(), None)
                .await?;
        }
        Err(e) => {
            // The owner asked for the post, give them the raw failure.
            api.send_text(chat, views::post_failed(&e), None).await?;
        }
    }

    Ok(())
}

/// Handle /healthcheck with a static liveness reply.
///
/// # Errors
///
/// Returns an error if the reply fails to send.
pub async fn handle_healthcheck(api: &dyn ChannelGateApi, chat: ChatId) -> Result<()> {
    api.send_text(chat, views::HEALTHCHECK_OK.to_string(), None)
        .await?;
    Ok(())
}
