//! Telegram update handlers.
//!
//! Every message is checked against the allow-list and the per-user command
//! rate limit before it reaches a command handler.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use dmb_core::{
    domain::{ChatId, UserId},
    formatting::split_chunks,
    security::is_authorized,
};

use crate::router::AppState;

mod commands;

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let user_id = msg.from().map(|u| UserId(u.id.0 as i64));

    if !is_authorized(user_id, &state.cfg.telegram_allowed_users) {
        tracing::warn!(user = ?user_id.map(|u| u.0), "unauthorized message");
        let res = bot
            .send_message(
                msg.chat.id,
                "Unauthorized. Contact the bot owner for access.",
            )
            .await;
        log_send_failure(res, msg.chat.id.0, "refusal");
        return Ok(());
    }
    let Some(user_id) = user_id else {
        return Ok(());
    };

    let (allowed, retry_after) = state.rate_limiter.lock().await.check(user_id);
    if !allowed {
        let secs = retry_after.map(|d| d.as_secs().max(1)).unwrap_or(1);
        tracing::info!(user = user_id.0, retry_after = secs, "command rate limited");
        let res = bot
            .send_message(
                msg.chat.id,
                format!("⏳ Too many requests. Please wait {secs}s."),
            )
            .await;
        log_send_failure(res, msg.chat.id.0, "rate-limit notice");
        return Ok(());
    }

    if let Some(text) = msg.text() {
        if text.starts_with('/') {
            return commands::handle_command(&msg, text, state).await;
        }
    }

    reply_html(
        &state,
        msg.chat.id.0,
        "I only understand commands. Try /help.",
    )
    .await;
    Ok(())
}

/// Reply to a chat, splitting long HTML at line boundaries.
pub(crate) async fn reply_html(state: &AppState, chat_id: i64, html: &str) {
    let limit = state.engine.dispatcher().chunk_limit();
    for chunk in split_chunks(html, limit) {
        if let Err(e) = state.messenger.send_html(ChatId(chat_id), &chunk).await {
            tracing::warn!(chat = chat_id, error = %e, "failed to send reply");
        }
    }
}

/// Warn about a failed plain-text reply. Returns whether the send succeeded.
fn log_send_failure<T, E: std::fmt::Display>(
    res: std::result::Result<T, E>,
    chat_id: i64,
    what: &str,
) -> bool {
    match res {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(chat = chat_id, error = %e, "failed to send {what}");
            false
        }
    }
}
