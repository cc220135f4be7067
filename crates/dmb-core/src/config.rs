use std::{env, path::PathBuf, time::Duration};

use chrono::NaiveTime;

use crate::{domain::ChatId, errors::Error, Result};

/// Hard upper bound Telegram puts on a single message.
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

/// Typed configuration, read from the environment (plus an optional `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,
    pub telegram_allowed_users: Vec<i64>,
    pub notification_chats: Vec<ChatId>,
    pub domains_csv: PathBuf,

    // Alerting
    pub alert_threshold_days: i64,
    pub alert_cooldown: Duration,
    pub send_timeout: Duration,
    pub telegram_safe_limit: usize,

    // Scheduling
    pub heartbeat_enabled: bool,
    pub heartbeat_time: NaiveTime,
    pub urgent_check_interval: Duration,
    pub urgent_check_initial_delay: Duration,

    // Command rate limiting
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,

    // Logging
    pub log_file: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        // A missing `.env` is fine; real environment variables win.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        // Required
        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN").ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;
        let telegram_allowed_users = match get("TELEGRAM_ALLOWED_USERS") {
            Some(v) => parse_csv_i64("TELEGRAM_ALLOWED_USERS", &v)?,
            None => Vec::new(),
        };
        if telegram_allowed_users.is_empty() {
            return Err(Error::Config(
                "TELEGRAM_ALLOWED_USERS environment variable is required".to_string(),
            ));
        }

        // Channels default to the allow-list (one private chat per admin).
        let notification_chats = match get("NOTIFICATION_CHATS") {
            Some(v) => parse_csv_i64("NOTIFICATION_CHATS", &v)?,
            None => telegram_allowed_users.clone(),
        }
        .into_iter()
        .map(ChatId)
        .collect();

        let domains_csv = PathBuf::from(get("DOMAINS_CSV").unwrap_or("domains.csv".to_string()));

        let alert_threshold_days = parse_or(&get, "ALERT_THRESHOLD_DAYS", 5i64)?;
        let alert_cooldown = secs(parse_or(&get, "ALERT_COOLDOWN_SECS", 2 * 24 * 3600)?);
        let send_timeout = Duration::from_millis(positive(
            "SEND_TIMEOUT_MS",
            parse_or(&get, "SEND_TIMEOUT_MS", 15_000)?,
        )?);
        let telegram_safe_limit = parse_or(&get, "TELEGRAM_SAFE_LIMIT", 4000usize)?;
        if !(1..=TELEGRAM_MAX_MESSAGE_LEN).contains(&telegram_safe_limit) {
            return Err(Error::Config(format!(
                "TELEGRAM_SAFE_LIMIT must be between 1 and {TELEGRAM_MAX_MESSAGE_LEN}, got {telegram_safe_limit}"
            )));
        }

        let heartbeat_enabled = match get("HEARTBEAT_ENABLED") {
            Some(v) => parse_bool("HEARTBEAT_ENABLED", &v)?,
            None => true,
        };
        let heartbeat_time = match get("HEARTBEAT_TIME") {
            Some(v) => NaiveTime::parse_from_str(v.trim(), "%H:%M").map_err(|e| {
                Error::Config(format!("HEARTBEAT_TIME must be HH:MM, got {v:?}: {e}"))
            })?,
            None => NaiveTime::from_hms_opt(10, 0, 0).unwrap_or_default(),
        };
        let urgent_check_interval = secs(positive(
            "URGENT_CHECK_INTERVAL_SECS",
            parse_or(&get, "URGENT_CHECK_INTERVAL_SECS", 2 * 24 * 3600)?,
        )?);
        let urgent_check_initial_delay =
            secs(parse_or(&get, "URGENT_CHECK_INITIAL_DELAY_SECS", 10)?);

        // Original bot: 5 commands per minute per user.
        let rate_limit_enabled = match get("RATE_LIMIT_ENABLED") {
            Some(v) => parse_bool("RATE_LIMIT_ENABLED", &v)?,
            None => true,
        };
        let rate_limit_requests = parse_or(&get, "RATE_LIMIT_REQUESTS", 5u32)?;
        let rate_limit_window = secs(positive(
            "RATE_LIMIT_WINDOW",
            parse_or(&get, "RATE_LIMIT_WINDOW", 60)?,
        )?);

        let log_file = get("LOG_FILE").map(PathBuf::from);

        Ok(Self {
            telegram_bot_token,
            telegram_allowed_users,
            notification_chats,
            domains_csv,
            alert_threshold_days,
            alert_cooldown,
            send_timeout,
            telegram_safe_limit,
            heartbeat_enabled,
            heartbeat_time,
            urgent_check_interval,
            urgent_check_initial_delay,
            rate_limit_enabled,
            rate_limit_requests,
            rate_limit_window,
            log_file,
        })
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(v) => v
            .trim()
            .parse::<T>()
            .map_err(|e| Error::Config(format!("{key}: invalid value {v:?}: {e}"))),
        None => Ok(default),
    }
}

fn positive(key: &str, v: u64) -> Result<u64> {
    if v == 0 {
        return Err(Error::Config(format!("{key} must be greater than zero")));
    }
    Ok(v)
}

fn parse_bool(key: &str, s: &str) -> Result<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!("{key}: invalid boolean {other:?}"))),
    }
}

fn parse_csv_i64(key: &str, v: &str) -> Result<Vec<i64>> {
    v.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| Error::Config(format!("{key}: invalid id {s:?}")))
        })
        .collect()
}

fn secs(v: u64) -> Duration {
    Duration::from_secs(v)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
