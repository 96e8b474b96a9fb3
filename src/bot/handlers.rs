//! Command definitions and small helpers used by the dispatch tree.

use teloxide::utils::command::BotCommands;

/// Chat commands understood by the bot
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    /// Начать работу и получить файл (payload: deep-link token).
    Start(String),
    /// Опубликовать промо-пост в канал (только для владельцев).
    Post,
    /// Проверка работоспособности.
    Healthcheck,
}

/// Normalize a `/start` payload into a deep-link token
#[must_use]
pub fn deep_link_token(param: &str) -> Option<&str> {
    let token = param.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
