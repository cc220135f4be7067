use std::sync::Arc;

use teloxide::{
    dispatching::Dispatcher,
    dptree,
    prelude::*,
    types::BotCommand,
};

use tokio::sync::Mutex;

use dmb_core::{
    config::Config,
    engine::MonitorEngine,
    messaging::port::MessagingPort,
    scheduler::{AlertScheduler, ScheduleSettings},
    security::RateLimiter,
    Error,
};

use crate::handlers;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub engine: Arc<MonitorEngine>,
    pub messenger: Arc<dyn MessagingPort>,
    pub scheduler: Arc<AlertScheduler>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
}

/// Verify the bot token. A bot that cannot authenticate has no working
/// transport, so this failure is fatal.
pub async fn verify_token(bot: &Bot) -> dmb_core::Result<String> {
    let me = bot
        .get_me()
        .await
        .map_err(|e| Error::Setup(format!("telegram getMe failed: {e}")))?;
    Ok(me.username().to_string())
}

pub async fn run_polling(
    cfg: Arc<Config>,
    bot: Bot,
    engine: Arc<MonitorEngine>,
) -> anyhow::Result<()> {
    let username = verify_token(&bot).await?;
    tracing::info!(bot = %username, "domain monitor bot started");
    tracing::info!(
        allowed_users = cfg.telegram_allowed_users.len(),
        channels = cfg.notification_chats.len(),
        threshold_days = cfg.alert_threshold_days,
        "configuration loaded"
    );

    if let Err(e) = bot.set_my_commands(bot_commands()).await {
        tracing::warn!(error = %e, "failed to register bot commands");
    }

    let scheduler = Arc::new(AlertScheduler::new(
        engine.clone(),
        ScheduleSettings::from(cfg.as_ref()),
    ));
    scheduler.start().await?;

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        messenger: engine.dispatcher().messenger(),
        engine,
        scheduler: scheduler.clone(),
        rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
            cfg.rate_limit_enabled,
            cfg.rate_limit_requests,
            cfg.rate_limit_window,
        ))),
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    scheduler.stop().await;
    tracing::info!("domain monitor bot stopped");
    Ok(())
}

fn bot_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "Start the bot"),
        BotCommand::new("status", "Show all monitored domains"),
        BotCommand::new("check", "Check expiring domains"),
        BotCommand::new("help", "List commands"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_menu_lists_every_handled_command() {
        let names: Vec<_> = bot_commands().into_iter().map(|c| c.command).collect();
        assert_eq!(names, vec!["start", "status", "check", "help"]);
    }
}
