use std::fmt;

use chrono::NaiveDate;

pub const PROVIDER_FALLBACK: &str = "N/A";
pub const LINK_FALLBACK: &str = "not available";
pub const STATUS_FALLBACK: &str = "unknown";

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Notification destination (Telegram chat id).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a sent message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// A monitored domain and its expiry metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomainRecord {
    pub name: String,
    /// `None` means the domain is tracked but not monitored for expiry.
    pub expiration_date: Option<NaiveDate>,
    pub provider: Option<String>,
    pub management_link: Option<String>,
    pub status: Option<String>,
}

impl DomainRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expiration_date: None,
            provider: None,
            management_link: None,
            status: None,
        }
    }

    pub fn with_expiration(mut self, date: NaiveDate) -> Self {
        self.expiration_date = Some(date);
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.management_link = Some(link.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn status_or_default(&self) -> &str {
        display_or(self.status.as_deref(), STATUS_FALLBACK)
    }
}

/// `value` unless it is missing or blank.
pub(crate) fn display_or<'a>(value: Option<&'a str>, fallback: &'a str) -> &'a str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => fallback,
    }
}
