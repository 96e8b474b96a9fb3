//! User-facing texts and keyboards of the subscription gate.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, Recipient};
use url::Url;

// ─────────────────────────────────────────────────────────────────────────────
// Callback constants
// ─────────────────────────────────────────────────────────────────────────────

/// Callback token carried by the "I subscribed" button
pub const CALLBACK_RECHECK: &str = "subgate:recheck";

// ─────────────────────────────────────────────────────────────────────────────
// Texts
// ─────────────────────────────────────────────────────────────────────────────

/// Sent before the gated file when /start finds an active subscription
pub const SUBSCRIPTION_CONFIRMED: &str = "✅ Подписка подтверждена! Вот ваш файл:";

/// Alert shown when the re-check button confirms the subscription
pub const RECHECK_CONFIRMED_ALERT: &str = "✅ Подписка подтверждена!";

/// Replaces the prompt message after a successful re-check
pub const RECHECK_DELIVERY_TEXT: &str = "✅ Подписка подтверждена! Получите ваши знания:";

/// Alert shown when the re-check still finds no subscription
pub const RECHECK_NOT_SUBSCRIBED_ALERT: &str = "❌ Вы ещё не подписаны!";

/// Alert shown when the membership query itself failed
pub const RECHECK_ERROR_ALERT: &str = "⚠️ Ошибка. Попробуйте позже.";

/// Reply to /post from a user outside the owner allow-list
pub const ACCESS_DENIED: &str = "⛔️ У вас нет доступа к этой команде.";

/// Reply to the owner after a successful channel post
pub const POST_SENT: &str = "✅ Пост с картинкой и кнопкой успешно отправлен.";

/// Reply to /healthcheck
pub const HEALTHCHECK_OK: &str = "✅ Бот работает.";

/// Caption attached to the gated PDF
pub const GATED_FILE_CAPTION: &str = "📄\n\
    Не спешите закрывать бота, в ближайшие 5 дней я пришлю вам реферат по этому эксперименту.\n\n\
    Руководства по новым экспериментам буду выдавать тут 👋";

/// Caption attached to the delayed follow-up document
pub const FOLLOWUP_CAPTION: &str =
    "📄 Как и обещал — реферат по эксперименту. Новые руководства появятся тут 👋";

/// Caption of the promotional post published to the channel
pub const PROMO_CAPTION: &str = "Привет! 👋 Я Роберт, и если ты смотрел(а) мой ролик про «Лимонную батарейку», вот твой бонус 🎁\n\n\
    <b>❗️❗️❗️Лимоны зажгли лампочку?! Как я это сделал? 👨‍💻</b>\n\n\
    В файле подробно расписано как это повторить и удивить родителей или друзей!\n\n\
    — какие материалы нужны 🍋🔩\n\
    — как всё правильно соединить 🔌\n\
    — что делать, если лампочка не горит 💡\n\
    — почему лимоны вообще дают электричество ⚡️\n\n\
    Жмите на кнопку ниже (подождите загрузку 5-10сек), чтобы получить файл 👇👇👇";

/// Reply to the owner when publishing the promo post failed
#[must_use]
pub fn post_failed(err: &impl std::fmt::Display) -> String {
    format!("❌ Ошибка при отправке поста: {err}")
}

/// Prompt shown to users without an active subscription
#[must_use]
pub fn subscribe_prompt(channel: &Recipient) -> String {
    let channel_name = match channel {
        Recipient::ChannelUsername(username) => username.clone(),
        Recipient::Id(_) => "канал".to_string(),
    };
    format!(
        "🔒 <b>Доступ к знаниям только для подписчиков канала</b>\n\n\
         1. Подпишитесь на канал {channel_name} 👈\n\
         2. Нажмите кнопку «✅ Я подписался» 👇"
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Keyboards
// ─────────────────────────────────────────────────────────────────────────────

/// Keyboard under the subscribe prompt: channel link plus the re-check button
#[must_use]
pub fn subscribe_keyboard(channel_url: &Url) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::url(
            "📲 Перейти в канал",
            channel_url.clone(),
        )],
        vec![InlineKeyboardButton::callback(
            "✅ Я подписался",
            CALLBACK_RECHECK,
        )],
    ])
}

/// Keyboard under the promo post: deep link back into the bot
#[must_use]
pub fn promo_keyboard(deep_link: &Url) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url(
        "💡 Инструкция 💡",
        deep_link.clone(),
    )]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn test_subscribe_keyboard_shape() {
        let url = Url::parse("https://t.me/testchannel").expect("valid url");
        let kb = subscribe_keyboard(&url);

        assert_eq!(kb.inline_keyboard.len(), 2);
        // Second row carries the re-check callback token
        match &kb.inline_keyboard[1][0].kind {
            InlineKeyboardButtonKind::CallbackData(data) => {
                assert_eq!(data, CALLBACK_RECHECK);
            }
            other => panic!("expected callback button, got {other:?}"),
        }
    }

    #[test]
    fn test_subscribe_prompt_names_channel() {
        let prompt = subscribe_prompt(&Recipient::ChannelUsername("@bobscience".to_string()));
        assert!(prompt.contains("@bobscience"));
    }
}
