//! Recurring jobs: the daily heartbeat and the urgent expiry check.
//!
//! Both jobs run as tokio tasks for the life of the process, each holding an
//! `Arc<MonitorEngine>`. Fire times are not persisted; after a restart the
//! urgent check runs again after the initial delay, so an alert can be
//! delayed by a restart but never skipped.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Local, NaiveTime, TimeZone};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{config::Config, engine::MonitorEngine, Result};

#[derive(Clone, Copy, Debug)]
pub struct ScheduleSettings {
    pub heartbeat_enabled: bool,
    pub heartbeat_time: NaiveTime,
    pub urgent_check_interval: Duration,
    pub urgent_check_initial_delay: Duration,
}

impl From<&Config> for ScheduleSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            heartbeat_enabled: cfg.heartbeat_enabled,
            heartbeat_time: cfg.heartbeat_time,
            urgent_check_interval: cfg.urgent_check_interval,
            urgent_check_initial_delay: cfg.urgent_check_initial_delay,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum JobKind {
    UrgentCheck,
    Heartbeat,
}

impl JobKind {
    fn label(self) -> &'static str {
        match self {
            JobKind::UrgentCheck => "urgent check",
            JobKind::Heartbeat => "heartbeat",
        }
    }
}

/// Wall-clock source for fire times and `as_of` dates.
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

#[derive(Clone)]
pub struct AlertScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    engine: Arc<MonitorEngine>,
    settings: ScheduleSettings,
    clock: Clock,
    state: tokio::sync::Mutex<SchedulerState>,
}

#[derive(Default)]
struct SchedulerState {
    jobs: HashMap<JobKind, JobEntry>,
}

struct JobEntry {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    next_run: Option<DateTime<Local>>,
    runs: u64,
}

impl AlertScheduler {
    pub fn new(engine: Arc<MonitorEngine>, settings: ScheduleSettings) -> Self {
        Self::with_clock(engine, settings, Arc::new(Local::now))
    }

    pub fn with_clock(engine: Arc<MonitorEngine>, settings: ScheduleSettings, clock: Clock) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                engine,
                settings,
                clock,
                state: tokio::sync::Mutex::new(SchedulerState::default()),
            }),
        }
    }

    /// Spawn the recurring jobs, replacing any already running.
    pub async fn start(&self) -> Result<usize> {
        self.stop().await;

        let mut kinds = vec![JobKind::UrgentCheck];
        if self.inner.settings.heartbeat_enabled {
            kinds.push(JobKind::Heartbeat);
        } else {
            tracing::info!("heartbeat disabled");
        }

        for kind in kinds.iter().copied() {
            let cancel = CancellationToken::new();

            // Register before spawning so the task can record its next run.
            self.inner.state.lock().await.jobs.insert(
                kind,
                JobEntry {
                    cancel: cancel.clone(),
                    handle: None,
                    next_run: None,
                    runs: 0,
                },
            );

            let scheduler = self.clone();
            let handle = tokio::spawn(async move {
                match kind {
                    JobKind::UrgentCheck => scheduler.urgent_check_loop(cancel).await,
                    JobKind::Heartbeat => scheduler.heartbeat_loop(cancel).await,
                }
            });

            if let Some(job) = self.inner.state.lock().await.jobs.get_mut(&kind) {
                job.handle = Some(handle);
            }
        }

        tracing::info!(jobs = kinds.len(), "scheduler started");
        Ok(kinds.len())
    }

    pub async fn stop(&self) {
        let mut st = self.inner.state.lock().await;
        for (_, job) in st.jobs.drain() {
            job.cancel.cancel();
            if let Some(handle) = job.handle {
                handle.abort(); // best-effort
            }
        }
    }

    pub async fn is_running(&self) -> bool {
        !self.inner.state.lock().await.jobs.is_empty()
    }

    pub async fn status_html(&self) -> String {
        let st = self.inner.state.lock().await;
        if st.jobs.is_empty() {
            return "⏰ Scheduler not running".to_string();
        }

        let settings = &self.inner.settings;
        let mut kinds: Vec<_> = st.jobs.keys().copied().collect();
        kinds.sort();

        let mut lines = vec!["⏰ <b>Schedule</b>".to_string()];
        for kind in kinds {
            let Some(job) = st.jobs.get(&kind) else {
                continue;
            };
            let cadence = match kind {
                JobKind::UrgentCheck => {
                    format!("every {}", human_duration(settings.urgent_check_interval))
                }
                JobKind::Heartbeat => {
                    format!("daily at {}", settings.heartbeat_time.format("%H:%M"))
                }
            };
            let next = job
                .next_run
                .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "pending".to_string());
            lines.push(format!(
                "• {}: {cadence}, next at {next} ({} runs)",
                kind.label(),
                job.runs
            ));
        }
        lines.join("\n")
    }

    async fn urgent_check_loop(&self, cancel: CancellationToken) {
        let settings = self.inner.settings;
        let mut ticker = interval_at(
            Instant::now() + settings.urgent_check_initial_delay,
            settings.urgent_check_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut wait = settings.urgent_check_initial_delay;
        loop {
            self.set_next_run(JobKind::UrgentCheck, self.now() + chrono_duration(wait))
                .await;

            tokio::select! {
              _ = cancel.cancelled() => break,
              _ = ticker.tick() => {
                let outcome = self.inner.engine.check_now(self.now()).await;
                tracing::info!(
                    due = outcome.due.len(),
                    sent = outcome.report.sent_channels().len(),
                    failed = outcome.report.failed_channels().len(),
                    "scheduled urgent check finished"
                );
                self.record_run(JobKind::UrgentCheck).await;
              }
            }
            wait = settings.urgent_check_interval;
        }
    }

    async fn heartbeat_loop(&self, cancel: CancellationToken) {
        let at = self.inner.settings.heartbeat_time;
        let mut last_fire: Option<DateTime<Local>> = None;

        loop {
            let now = self.now();
            // Never re-fire the same slot if the timer woke slightly early.
            let base = match last_fire {
                Some(prev) if prev > now => prev,
                _ => now,
            };
            let next = next_daily_run(&base, at);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            self.set_next_run(JobKind::Heartbeat, next).await;

            tokio::select! {
              _ = cancel.cancelled() => break,
              _ = sleep(wait) => {
                let report = self.inner.engine.heartbeat(self.now()).await;
                if !report.failed_channels().is_empty() {
                    tracing::warn!(failed = report.failed_channels().len(), "heartbeat partially failed");
                }
                last_fire = Some(next);
                self.record_run(JobKind::Heartbeat).await;
              }
            }
        }
    }

    fn now(&self) -> DateTime<Local> {
        (self.inner.clock)()
    }

    async fn set_next_run(&self, kind: JobKind, at: DateTime<Local>) {
        if let Some(job) = self.inner.state.lock().await.jobs.get_mut(&kind) {
            job.next_run = Some(at);
        }
    }

    async fn record_run(&self, kind: JobKind) {
        if let Some(job) = self.inner.state.lock().await.jobs.get_mut(&kind) {
            job.runs += 1;
        }
    }
}

/// The first instant strictly after `now` whose wall-clock time is `at`.
///
/// A time skipped by a DST gap resolves to one hour later that day.
pub fn next_daily_run<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    for offset in 0..=2 {
        let naive = (now.date_naive() + chrono::Duration::days(offset)).and_time(at);
        let candidate = tz
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| {
                tz.from_local_datetime(&(naive + chrono::Duration::hours(1)))
                    .earliest()
            });
        if let Some(c) = candidate {
            if c > *now {
                return c;
            }
        }
    }
    now.clone() + chrono::Duration::days(1)
}

fn chrono_duration(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

fn human_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (days, hours, mins) = (secs / 86_400, (secs % 86_400) / 3600, (secs % 3600) / 60);
    match (days, hours, mins) {
        (0, 0, 0) => format!("{secs}s"),
        (0, 0, m) => format!("{m}m"),
        (0, h, 0) => format!("{h}h"),
        (0, h, m) => format!("{h}h {m}m"),
        (d, 0, _) => format!("{d}d"),
        (d, h, _) => format!("{d}d {h}h"),
    }
}

// === Tests ===

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dispatcher::{tests::FakeMessenger, NotificationDispatcher},
        domain::{ChatId, DomainRecord},
        engine::EngineSettings,
        inventory::Inventory,
    };
    use chrono::{FixedOffset, Timelike, Utc};

    fn nt(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn next_daily_run_today_or_tomorrow() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        assert_eq!(
            next_daily_run(&now, nt(10, 0)),
            Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap()
        );
        assert_eq!(
            next_daily_run(&now, nt(8, 0)),
            Utc.with_ymd_and_hms(2026, 1, 2, 8, 0, 0).unwrap()
        );
        // Exactly on the slot means the next day.
        assert_eq!(
            next_daily_run(&now, nt(9, 0)),
            Utc.with_ymd_and_hms(2026, 1, 2, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn next_daily_run_respects_offset() {
        let tz = FixedOffset::east_opt(3 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2026, 12, 31, 23, 30, 0).unwrap();
        let next = next_daily_run(&now, nt(10, 0));
        assert_eq!(next, tz.with_ymd_and_hms(2027, 1, 1, 10, 0, 0).unwrap());
        assert_eq!(next.hour(), 10);
    }

    #[test]
    fn human_duration_formats() {
        assert_eq!(human_duration(Duration::from_secs(172_800)), "2d");
        assert_eq!(human_duration(Duration::from_secs(90_000)), "1d 1h");
        assert_eq!(human_duration(Duration::from_secs(5400)), "1h 30m");
        assert_eq!(human_duration(Duration::from_secs(45)), "45s");
    }

    fn scheduler(fake: Arc<FakeMessenger>, heartbeat_enabled: bool) -> AlertScheduler {
        scheduler_with(fake, heartbeat_enabled, EngineSettings::default(), Arc::new(Local::now))
    }

    /// Wall clock that moves with tokio's (paused) clock.
    fn tokio_clock() -> Clock {
        let wall = Local::now();
        let start = Instant::now();
        Arc::new(move || wall + chrono::Duration::from_std(Instant::now() - start).unwrap())
    }

    fn scheduler_with(
        fake: Arc<FakeMessenger>,
        heartbeat_enabled: bool,
        engine_settings: EngineSettings,
        clock: Clock,
    ) -> AlertScheduler {
        let today = clock().date_naive();
        let mut inv = Inventory::new();
        inv.upsert(DomainRecord::new("soon.com").with_expiration(today + chrono::Duration::days(2)))
            .unwrap();
        let dispatcher =
            NotificationDispatcher::new(fake, vec![ChatId(1)], Duration::from_secs(5), 4000);
        let engine = Arc::new(MonitorEngine::new(engine_settings, inv, dispatcher));
        AlertScheduler::with_clock(
            engine,
            ScheduleSettings {
                heartbeat_enabled,
                heartbeat_time: nt(10, 0),
                urgent_check_interval: Duration::from_secs(2 * 24 * 3600),
                urgent_check_initial_delay: Duration::from_secs(10),
            },
            clock,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn urgent_check_fires_after_initial_delay() {
        let fake = Arc::new(FakeMessenger::default());
        let sched = scheduler(fake.clone(), false);
        assert_eq!(sched.start().await.unwrap(), 1);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(fake.total(), 0);

        sleep(Duration::from_secs(6)).await;
        assert_eq!(fake.total(), 1);
        assert!(fake.sent_to(ChatId(1))[0].contains("soon.com"));

        let status = sched.status_html().await;
        assert!(status.contains("urgent check: every 2d"));
        assert!(status.contains("(1 runs)"));

        sched.stop().await;
        assert!(!sched.is_running().await);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_pending_timers() {
        let fake = Arc::new(FakeMessenger::default());
        let sched = scheduler(fake.clone(), true);
        assert_eq!(sched.start().await.unwrap(), 2);
        sched.stop().await;

        sleep(Duration::from_secs(3 * 24 * 3600)).await;
        assert_eq!(fake.total(), 0);
        assert!(sched.status_html().await.contains("not running"));
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_fires_within_a_day() {
        let fake = Arc::new(FakeMessenger::default());
        let sched = scheduler(fake.clone(), true);
        sched.start().await.unwrap();

        sleep(Duration::from_secs(24 * 3600 + 60)).await;
        let msgs = fake.sent_to(ChatId(1));
        assert!(msgs.iter().any(|m| m.contains("Domain monitor is running")));
        assert!(msgs.iter().any(|m| m.contains("soon.com")));
        sched.stop().await;
    }

    const INTERVAL: Duration = Duration::from_secs(2 * 24 * 3600);

    /// Alerts sent after the first, second and third urgent-check ticks.
    async fn sends_per_tick(cooldown: Duration) -> Vec<usize> {
        let fake = Arc::new(FakeMessenger::default());
        let settings = EngineSettings {
            cooldown,
            ..EngineSettings::default()
        };
        let sched = scheduler_with(fake.clone(), false, settings, tokio_clock());
        sched.start().await.unwrap();

        let mut totals = Vec::new();
        sleep(Duration::from_secs(11)).await;
        totals.push(fake.total());
        for _ in 0..2 {
            sleep(INTERVAL).await;
            totals.push(fake.total());
        }
        assert!(sched.status_html().await.contains("(3 runs)"));
        sched.stop().await;
        totals
    }

    #[tokio::test(start_paused = true)]
    async fn urgent_check_realerts_each_interval_when_cooldown_fits() {
        assert_eq!(sends_per_tick(Duration::from_secs(24 * 3600)).await, vec![1, 2, 3]);
        assert_eq!(sends_per_tick(INTERVAL).await, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn urgent_check_is_suppressed_inside_cooldown() {
        let cooldown = Duration::from_secs(3 * 24 * 3600);
        assert_eq!(sends_per_tick(cooldown).await, vec![1, 1, 2]);
    }
}
