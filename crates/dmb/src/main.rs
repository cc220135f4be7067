use std::sync::Arc;

use dmb_core::{
    config::Config,
    dispatcher::NotificationDispatcher,
    engine::{EngineSettings, MonitorEngine},
    inventory::Inventory,
    loader,
    messaging::port::MessagingPort,
};
use dmb_telegram::TelegramMessenger;

#[tokio::main]
async fn main() -> Result<(), dmb_core::Error> {
    let cfg = Arc::new(Config::load()?);
    dmb_core::logging::init("dmb", cfg.log_file.as_deref())?;

    let telegram = TelegramMessenger::from_token(&cfg.telegram_bot_token);
    let bot = telegram.bot();
    let messenger: Arc<dyn MessagingPort> = Arc::new(telegram);

    let dispatcher = NotificationDispatcher::new(
        messenger,
        cfg.notification_chats.clone(),
        cfg.send_timeout,
        cfg.telegram_safe_limit,
    );
    let engine = Arc::new(MonitorEngine::new(
        EngineSettings::from(cfg.as_ref()),
        Inventory::new(),
        dispatcher,
    ));

    // A missing or broken inventory file is not fatal; start with what loaded.
    match loader::load_csv_path(&cfg.domains_csv) {
        Ok(report) => {
            let stored = engine.load_records(report.records).await;
            tracing::info!(stored, skipped = report.skipped, "inventory ready");
        }
        Err(e) => tracing::error!(error = %e, "failed to load inventory, starting empty"),
    }

    dmb_telegram::router::run_polling(cfg, bot, engine)
        .await
        .map_err(into_core_error)?;

    Ok(())
}

/// Core errors pass through as-is; anything else is a setup failure.
fn into_core_error(e: anyhow::Error) -> dmb_core::Error {
    match e.downcast::<dmb_core::Error>() {
        Ok(core) => core,
        Err(other) => dmb_core::Error::Setup(format!("{other:#}")),
    }
}
