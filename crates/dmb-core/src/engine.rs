//! Engine context shared by the scheduler and the command handlers.
//!
//! The inventory, dedup guard and dispatcher are built once at startup and
//! passed around behind an `Arc<MonitorEngine>`. Alert cycles and heartbeats
//! take the cycle lock, so no two dispatch passes overlap.

use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::{
    config::Config,
    dedup::DedupGuard,
    dispatcher::{DispatchReport, NotificationDispatcher},
    domain::DomainRecord,
    expiry::{self, DueDomain, StatusLine},
    formatting::format_heartbeat,
    inventory::Inventory,
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct EngineSettings {
    pub threshold_days: i64,
    pub cooldown: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            threshold_days: expiry::DEFAULT_THRESHOLD_DAYS,
            cooldown: Duration::from_secs(2 * 24 * 3600),
        }
    }
}

impl From<&Config> for EngineSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            threshold_days: cfg.alert_threshold_days,
            cooldown: cfg.alert_cooldown,
        }
    }
}

/// Outcome of one urgent-check pass.
#[derive(Clone, Debug, Default)]
pub struct CheckOutcome {
    pub due: Vec<DueDomain>,
    pub report: DispatchReport,
}

impl CheckOutcome {
    pub fn nothing_due(&self) -> bool {
        self.due.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InventorySummary {
    pub total: usize,
    pub dated: usize,
    pub due: usize,
}

pub struct MonitorEngine {
    settings: EngineSettings,
    inventory: RwLock<Inventory>,
    guard: Mutex<DedupGuard>,
    dispatcher: NotificationDispatcher,
    cycle: Mutex<()>,
}

impl MonitorEngine {
    pub fn new(settings: EngineSettings, inventory: Inventory, dispatcher: NotificationDispatcher) -> Self {
        Self {
            settings,
            inventory: RwLock::new(inventory),
            guard: Mutex::new(DedupGuard::new()),
            dispatcher,
            cycle: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    pub async fn add_domain(&self, record: DomainRecord) -> Result<()> {
        self.inventory.write().await.upsert(record)
    }

    /// Bulk load. Invalid records are skipped and logged; returns the number
    /// stored.
    pub async fn load_records(&self, records: Vec<DomainRecord>) -> usize {
        let mut inv = self.inventory.write().await;
        let mut stored = 0usize;
        for record in records {
            match inv.upsert(record) {
                Ok(()) => stored += 1,
                Err(e) => tracing::warn!(error = %e, "skipping inventory record"),
            }
        }
        stored
    }

    pub async fn get(&self, name: &str) -> Result<DomainRecord> {
        self.inventory.read().await.get(name).cloned()
    }

    pub async fn due_for_alert(&self, as_of: NaiveDate) -> Vec<DueDomain> {
        let inv = self.inventory.read().await;
        expiry::due_for_alert(&inv, self.settings.threshold_days, as_of)
    }

    pub async fn status_report(&self, as_of: NaiveDate) -> Vec<StatusLine> {
        let inv = self.inventory.read().await;
        expiry::status_report(&inv, as_of)
    }

    pub async fn summary(&self, as_of: NaiveDate) -> InventorySummary {
        let inv = self.inventory.read().await;
        InventorySummary {
            total: inv.len(),
            dated: inv.dated_len(),
            due: expiry::due_for_alert(&inv, self.settings.threshold_days, as_of).len(),
        }
    }

    /// Evaluate the inventory and dispatch alerts that are not in cooldown.
    ///
    /// Shared by the scheduled urgent check and the on-demand `/check`.
    pub async fn check_now(&self, as_of: DateTime<Local>) -> CheckOutcome {
        let _cycle = self.cycle.lock().await;

        let due = self.due_for_alert(as_of.date_naive()).await;
        if due.is_empty() {
            tracing::info!("urgent check: no domains due");
            return CheckOutcome::default();
        }
        tracing::info!(due = due.len(), "urgent check: domains due");

        let as_of_utc = as_of.with_timezone(&Utc);
        let mut guard = self.guard.lock().await;
        let report = self
            .dispatcher
            .dispatch_alerts(&due, &mut guard, as_of_utc, self.settings.cooldown)
            .await;
        guard.prune(as_of_utc, self.settings.cooldown);

        CheckOutcome { due, report }
    }

    /// Best-effort "I am alive" notice to every channel.
    pub async fn heartbeat(&self, as_of: DateTime<Local>) -> DispatchReport {
        let _cycle = self.cycle.lock().await;
        let s = self.summary(as_of.date_naive()).await;
        let text = format_heartbeat(s.total, s.dated, s.due, self.settings.threshold_days);
        self.dispatcher.broadcast(&text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dispatcher::tests::FakeMessenger,
        domain::ChatId,
    };
    use chrono::TimeZone;
    use std::sync::Arc;

    fn at(day: u32, hour: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 5, day, hour, 0, 0).unwrap()
    }

    fn engine(fake: Arc<FakeMessenger>, channels: &[i64]) -> MonitorEngine {
        let dispatcher = NotificationDispatcher::new(
            fake,
            channels.iter().map(|&c| ChatId(c)).collect(),
            Duration::from_secs(5),
            4000,
        );
        let mut inv = Inventory::new();
        let today = at(1, 9).date_naive();
        inv.upsert(DomainRecord::new("A").with_expiration(today + chrono::Duration::days(3)))
            .unwrap();
        inv.upsert(DomainRecord::new("B").with_expiration(today + chrono::Duration::days(10)))
            .unwrap();
        inv.upsert(DomainRecord::new("C")).unwrap();
        MonitorEngine::new(EngineSettings::default(), inv, dispatcher)
    }

    #[tokio::test]
    async fn repeat_cycle_within_cooldown_is_suppressed() {
        let fake = Arc::new(FakeMessenger::default());
        let engine = engine(fake.clone(), &[1]);

        let first = engine.check_now(at(1, 9)).await;
        assert_eq!(first.due.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(), vec!["A"]);
        assert_eq!(first.report.sent_channels(), vec![ChatId(1)]);

        let second = engine.check_now(at(1, 10)).await;
        assert_eq!(second.due.len(), 1);
        assert_eq!(second.report.suppressed_channels(), vec![ChatId(1)]);
        assert_eq!(fake.total(), 1);
    }

    #[tokio::test]
    async fn alert_repeats_once_cooldown_elapses() {
        let fake = Arc::new(FakeMessenger::default());
        let engine = engine(fake.clone(), &[1]);

        engine.check_now(at(1, 9)).await;
        let later = engine.check_now(at(3, 9)).await;
        assert_eq!(later.report.sent_channels(), vec![ChatId(1)]);
        assert_eq!(fake.total(), 2);
    }

    #[tokio::test]
    async fn nothing_due_dispatches_nothing() {
        let fake = Arc::new(FakeMessenger::default());
        let engine = MonitorEngine::new(
            EngineSettings::default(),
            Inventory::new(),
            NotificationDispatcher::new(fake.clone(), vec![ChatId(1)], Duration::from_secs(5), 4000),
        );
        let outcome = engine.check_now(at(1, 9)).await;
        assert!(outcome.nothing_due());
        assert_eq!(fake.total(), 0);
    }

    #[tokio::test]
    async fn failed_channel_is_retried_next_cycle() {
        let fake = Arc::new(FakeMessenger::failing(&[ChatId(2)]));
        let engine = engine(fake.clone(), &[1, 2]);

        let first = engine.check_now(at(1, 9)).await;
        assert_eq!(first.report.failed_channels(), vec![ChatId(2)]);

        let second = engine.check_now(at(1, 10)).await;
        assert_eq!(second.report.suppressed_channels(), vec![ChatId(1)]);
        assert_eq!(second.report.failed_channels(), vec![ChatId(2)]);
    }

    #[tokio::test]
    async fn load_records_skips_invalid_and_status_lists_everything() {
        let fake = Arc::new(FakeMessenger::default());
        let engine = engine(fake, &[1]);

        let stored = engine
            .load_records(vec![DomainRecord::new(" "), DomainRecord::new("D")])
            .await;
        assert_eq!(stored, 1);

        let lines = engine.status_report(at(1, 9).date_naive()).await;
        let names: Vec<_> = lines.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C", "D"]);
        assert!(engine.get("D").await.is_ok());
    }

    #[tokio::test]
    async fn heartbeat_reaches_every_channel() {
        let fake = Arc::new(FakeMessenger::default());
        let engine = engine(fake.clone(), &[1, 2]);

        let report = engine.heartbeat(at(1, 10)).await;
        assert_eq!(report.sent_channels(), vec![ChatId(1), ChatId(2)]);
        assert!(fake.sent_to(ChatId(1))[0].contains("Tracking 3 domains (2 with expiry dates)"));
    }

    #[tokio::test]
    async fn added_domain_joins_the_next_check() {
        let fake = Arc::new(FakeMessenger::default());
        let engine = engine(fake.clone(), &[1]);

        assert!(matches!(
            engine.add_domain(DomainRecord::new("")).await,
            Err(crate::Error::InvalidRecord(_))
        ));
        assert_eq!(engine.summary(at(1, 9).date_naive()).await.total, 3);

        let today = at(1, 9).date_naive();
        engine
            .add_domain(DomainRecord::new("E").with_expiration(today))
            .await
            .unwrap();
        let outcome = engine.check_now(at(1, 9)).await;
        let names: Vec<_> = outcome.due.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["E", "A"]);
    }
}
