use std::sync::Arc;

use chrono::Local;
use teloxide::{prelude::*, types::Message};

use dmb_core::{
    dispatcher::ChannelOutcome,
    engine::CheckOutcome,
    formatting::{escape_html, format_alert_message, format_status_report},
};

use crate::router::AppState;

use super::reply_html;

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

const HELP: &str = "🤖 <b>Domain Monitor Bot</b>\n\n\
<b>📋 Commands:</b>\n\
/start - Greeting\n\
/status - Show all monitored domains\n\
/check - Check for domains expiring soon and alert all channels\n\
/help - Show this message";

pub(super) async fn handle_command(
    msg: &Message,
    text: &str,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let chat_id = msg.chat.id.0;
    let (cmd, _arg) = parse_command(text);
    tracing::info!(chat = chat_id, command = %cmd, "command received");

    match cmd.as_str() {
        "start" => {
            let name = msg
                .from()
                .map(|u| u.first_name.clone())
                .unwrap_or_else(|| "there".to_string());
            let body = format!(
                "Hello {}, I'm your Domain Monitor Bot! I'm here to notify you about domain expiration dates.\n\nUse /help to see what I can do.",
                escape_html(&name)
            );
            reply_html(&state, chat_id, &body).await;
        }

        "help" => reply_html(&state, chat_id, HELP).await,

        "status" => {
            let lines = state.engine.status_report(Local::now().date_naive()).await;
            let body = format!(
                "{}\n\n{}",
                format_status_report(&lines),
                state.scheduler.status_html().await
            );
            reply_html(&state, chat_id, &body).await;
        }

        "check" => {
            let outcome = state.engine.check_now(Local::now()).await;
            let body = render_check_reply(&outcome, state.engine.settings().threshold_days);
            reply_html(&state, chat_id, &body).await;
        }

        _ => {
            reply_html(&state, chat_id, "Unknown command. Use /help to list commands.").await;
        }
    }

    Ok(())
}

/// Reply for `/check`: the due list plus a delivery summary, or an explicit
/// "none due" acknowledgment.
fn render_check_reply(outcome: &CheckOutcome, threshold_days: i64) -> String {
    if outcome.nothing_due() {
        return format!("✅ No domains expire within {threshold_days} days.");
    }

    let mut sent = 0usize;
    let mut suppressed = 0usize;
    let mut failures = Vec::new();
    for (channel, o) in &outcome.report.outcomes {
        match o {
            ChannelOutcome::Sent { .. } => sent += 1,
            ChannelOutcome::Suppressed => suppressed += 1,
            ChannelOutcome::Failed { error } => {
                failures.push(format!("⚠️ {channel}: {}", escape_html(error)))
            }
        }
    }

    let total = outcome.report.outcomes.len();
    let mut out = vec![
        format_alert_message(&outcome.due),
        String::new(),
        format!("📨 Alert delivered to {sent} of {total} channels."),
    ];
    if suppressed > 0 {
        out.push(format!(
            "🔕 {suppressed} channel(s) already alerted within the cooldown window."
        ));
    }
    if !failures.is_empty() {
        out.push(format!(
            "❌ {} channel(s) failed; they will be retried next cycle:",
            failures.len()
        ));
        out.extend(failures);
    }
    out.join("\n")
}
