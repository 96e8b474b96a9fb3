//! End-to-end flow tests for the subscription gate.
//!
//! A hand-rolled recording fake stands in for the Telegram API so each flow
//! can assert exact outbound call counts.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use subgate_bot::bot::api::{ApiError, ChannelGateApi};
use subgate_bot::bot::{gate, views, FollowUpScheduler, GateContext};
use teloxide::types::{
    CallbackQueryId, ChatId, ChatMemberStatus, InlineKeyboardMarkup, MessageId, Recipient, UserId,
};
use url::Url;

const OWNER: i64 = 10;
const VISITOR: u64 = 5;

/// Fake API that records every outbound call.
#[derive(Default)]
struct RecordingApi {
    /// Status returned by membership queries; `None` simulates a query error
    status: Mutex<Option<ChatMemberStatus>>,
    texts: Mutex<Vec<(ChatId, String, bool)>>,
    photo_recipients: Mutex<Vec<Recipient>>,
    documents_sent: AtomicUsize,
    alerts: Mutex<Vec<String>>,
    edits: AtomicUsize,
}

impl RecordingApi {
    fn with_status(status: Option<ChatMemberStatus>) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(status),
            ..Self::default()
        })
    }

    fn set_status(&self, status: Option<ChatMemberStatus>) {
        *self.status.lock().expect("status lock") = status;
    }

    fn texts(&self) -> Vec<(ChatId, String, bool)> {
        self.texts.lock().expect("texts lock").clone()
    }

    fn channel_posts(&self, channel: &Recipient) -> usize {
        self.photo_recipients
            .lock()
            .expect("photos lock")
            .iter()
            .filter(|r| *r == channel)
            .count()
    }

    fn alerts(&self) -> Vec<String> {
        self.alerts.lock().expect("alerts lock").clone()
    }
}

#[async_trait]
impl ChannelGateApi for RecordingApi {
    async fn member_status(
        &self,
        _channel: Recipient,
        _user: UserId,
    ) -> Result<ChatMemberStatus, ApiError> {
        self.status.lock().expect("status lock").clone().ok_or_else(|| {
            ApiError::Telegram(teloxide::RequestError::Api(teloxide::ApiError::Unknown(
                "fake query failure".to_string(),
            )))
        })
    }

    async fn send_text(
        &self,
        chat: ChatId,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), ApiError> {
        self.texts
            .lock()
            .expect("texts lock")
            .push((chat, text, keyboard.is_some()));
        Ok(())
    }

    async fn send_photo(
        &self,
        chat: Recipient,
        _photo: PathBuf,
        _caption: Option<String>,
        _keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), ApiError> {
        self.photo_recipients.lock().expect("photos lock").push(chat);
        Ok(())
    }

    async fn send_document(
        &self,
        _chat: ChatId,
        _document: PathBuf,
        _caption: String,
    ) -> Result<(), ApiError> {
        self.documents_sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn edit_text(
        &self,
        _chat: ChatId,
        _message: MessageId,
        _text: String,
    ) -> Result<(), ApiError> {
        self.edits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn answer_callback(
        &self,
        _id: CallbackQueryId,
        text: String,
        _show_alert: bool,
    ) -> Result<(), ApiError> {
        self.alerts.lock().expect("alerts lock").push(text);
        Ok(())
    }
}

fn test_ctx(followup_delay: Duration) -> GateContext {
    GateContext {
        channel: Recipient::ChannelUsername("@testchannel".to_string()),
        channel_url: Url::parse("https://t.me/testchannel").expect("valid url"),
        promo_deep_link: Url::parse("https://t.me/test_bot?start=promo").expect("valid url"),
        owners: HashSet::from([OWNER]),
        cover_image: PathBuf::from("assets/cover.jpg"),
        promo_image: PathBuf::from("assets/promo.jpg"),
        gated_file: PathBuf::from("assets/guide.pdf"),
        followup_file: PathBuf::from("assets/report.pdf"),
        followup_delay,
    }
}

fn callback_id() -> CallbackQueryId {
    CallbackQueryId("cb".to_string())
}

#[tokio::test(start_paused = true)]
async fn subscribed_start_delivers_file_then_followup_after_delay() {
    let ctx = test_ctx(Duration::from_secs(900));
    let scheduler = FollowUpScheduler::new();
    let api = RecordingApi::with_status(Some(ChatMemberStatus::Member));
    let dyn_api: Arc<dyn ChannelGateApi> = api.clone();

    gate::handle_start(
        &ctx,
        &dyn_api,
        &scheduler,
        ChatId(5),
        UserId(VISITOR),
        Some("TGkanal"),
    )
    .await
    .expect("start should succeed");

    // Gated file delivered immediately, follow-up still pending
    assert_eq!(api.documents_sent.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.pending_count(), 1);

    tokio::time::advance(Duration::from_secs(899)).await;
    tokio::task::yield_now().await;
    assert_eq!(
        api.documents_sent.load(Ordering::SeqCst),
        1,
        "follow-up fired before the configured delay"
    );

    tokio::time::advance(Duration::from_secs(2)).await;
    scheduler.wait_idle().await;
    assert_eq!(api.documents_sent.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unsubscribed_start_prompts_and_withholds_file() {
    let ctx = test_ctx(Duration::from_secs(900));
    let scheduler = FollowUpScheduler::new();

    for status in [None, Some(ChatMemberStatus::Left), Some(ChatMemberStatus::Banned)] {
        let api = RecordingApi::with_status(status);
        let dyn_api: Arc<dyn ChannelGateApi> = api.clone();

        gate::handle_start(&ctx, &dyn_api, &scheduler, ChatId(5), UserId(VISITOR), None)
            .await
            .expect("start should succeed");

        assert_eq!(api.documents_sent.load(Ordering::SeqCst), 0);
        let texts = api.texts();
        assert_eq!(texts.len(), 1, "exactly one prompt expected");
        assert!(texts[0].2, "prompt must carry the subscribe keyboard");
        assert_eq!(scheduler.pending_count(), 0);
    }
}

#[tokio::test]
async fn recheck_transitions_from_refusal_to_delivery() {
    let ctx = test_ctx(Duration::from_secs(900));
    let api = RecordingApi::with_status(Some(ChatMemberStatus::Left));
    let origin = Some((ChatId(5), MessageId(77)));

    // Still unsubscribed: negative alert, nothing delivered
    gate::handle_recheck(&ctx, api.as_ref(), callback_id(), UserId(VISITOR), origin)
        .await
        .expect("recheck should succeed");
    assert_eq!(api.alerts(), vec![views::RECHECK_NOT_SUBSCRIBED_ALERT.to_string()]);
    assert_eq!(api.documents_sent.load(Ordering::SeqCst), 0);

    // User subscribed in the meantime
    api.set_status(Some(ChatMemberStatus::Member));
    gate::handle_recheck(&ctx, api.as_ref(), callback_id(), UserId(VISITOR), origin)
        .await
        .expect("recheck should succeed");
    assert_eq!(api.documents_sent.load(Ordering::SeqCst), 1);
    assert_eq!(api.edits.load(Ordering::SeqCst), 1);

    // Stateless policy: another press re-delivers
    gate::handle_recheck(&ctx, api.as_ref(), callback_id(), UserId(VISITOR), origin)
        .await
        .expect("recheck should succeed");
    assert_eq!(api.documents_sent.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn recheck_query_error_answers_with_transient_notice() {
    let ctx = test_ctx(Duration::from_secs(900));
    let api = RecordingApi::with_status(None);

    gate::handle_recheck(&ctx, api.as_ref(), callback_id(), UserId(VISITOR), None)
        .await
        .expect("recheck should succeed");

    assert_eq!(api.alerts(), vec![views::RECHECK_ERROR_ALERT.to_string()]);
    assert_eq!(api.documents_sent.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn publish_is_gated_by_the_owner_allow_list() {
    let ctx = test_ctx(Duration::from_secs(900));

    // Owner: exactly one photo post to the channel
    let api = RecordingApi::with_status(None);
    gate::handle_publish(&ctx, api.as_ref(), ChatId(OWNER), UserId(OWNER.cast_unsigned()))
        .await
        .expect("publish should succeed");
    assert_eq!(api.channel_posts(&ctx.channel), 1);
    assert_eq!(api.texts()[0].1, views::POST_SENT.to_string());

    // Non-owner: one refusal, zero channel calls
    let api = RecordingApi::with_status(None);
    gate::handle_publish(&ctx, api.as_ref(), ChatId(99), UserId(99))
        .await
        .expect("refusal is not an error");
    assert_eq!(api.channel_posts(&ctx.channel), 0);
    let texts = api.texts();
    assert_eq!(texts.len(), 1);
    assert_eq!(texts[0].1, views::ACCESS_DENIED.to_string());
}
