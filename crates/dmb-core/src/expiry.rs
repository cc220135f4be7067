//! Expiry-window evaluation over the inventory.
//!
//! Day counts use calendar dates only; time-of-day never enters the arithmetic.

use chrono::NaiveDate;

use crate::{
    domain::{display_or, LINK_FALLBACK, PROVIDER_FALLBACK},
    inventory::Inventory,
};

pub const DEFAULT_THRESHOLD_DAYS: i64 = 5;

/// A domain whose expiration falls inside the alert window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DueDomain {
    pub name: String,
    pub expiration_date: NaiveDate,
    /// Negative once the domain has lapsed.
    pub days_remaining: i64,
    pub provider: Option<String>,
    pub management_link: Option<String>,
}

impl DueDomain {
    pub fn provider_or_default(&self) -> &str {
        display_or(self.provider.as_deref(), PROVIDER_FALLBACK)
    }

    pub fn link_or_default(&self) -> &str {
        display_or(self.management_link.as_deref(), LINK_FALLBACK)
    }
}

/// One row of the status report. Every inventory record produces one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusLine {
    pub name: String,
    pub expiration_date: Option<NaiveDate>,
    pub days_remaining: Option<i64>,
    pub status: String,
}

pub fn days_remaining(expiration_date: NaiveDate, as_of: NaiveDate) -> i64 {
    (expiration_date - as_of).num_days()
}

/// Domains with `days_remaining <= threshold_days`, most urgent first.
///
/// Records without an expiration date are skipped. Expired domains stay in the
/// result so alerting continues after a lapse. Ties keep inventory order.
pub fn due_for_alert(inventory: &Inventory, threshold_days: i64, as_of: NaiveDate) -> Vec<DueDomain> {
    let mut due: Vec<DueDomain> = inventory
        .all()
        .filter_map(|(name, rec)| {
            let expiration_date = rec.expiration_date?;
            let days = days_remaining(expiration_date, as_of);
            (days <= threshold_days).then(|| DueDomain {
                name: name.to_string(),
                expiration_date,
                days_remaining: days,
                provider: rec.provider.clone(),
                management_link: rec.management_link.clone(),
            })
        })
        .collect();

    due.sort_by_key(|d| d.days_remaining);
    due
}

pub fn status_report(inventory: &Inventory, as_of: NaiveDate) -> Vec<StatusLine> {
    inventory
        .all()
        .map(|(name, rec)| StatusLine {
            name: name.to_string(),
            expiration_date: rec.expiration_date,
            days_remaining: rec.expiration_date.map(|d| days_remaining(d, as_of)),
            status: rec.status_or_default().to_string(),
        })
        .collect()
}
