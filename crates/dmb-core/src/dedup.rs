//! Per-(domain, channel) alert dedup guard.
//!
//! State is process-local. Losing it on restart can cause at most one repeat
//! alert per pair.

use std::{collections::HashMap, time::Duration};

use chrono::{DateTime, Utc};

use crate::domain::ChatId;

#[derive(Clone, Debug, Default)]
pub struct DedupGuard {
    last_sent: HashMap<(String, ChatId), DateTime<Utc>>,
}

impl DedupGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the pair was never sent, or its last send is at least
    /// `cooldown` old.
    pub fn should_send(
        &self,
        domain_name: &str,
        channel: ChatId,
        as_of: DateTime<Utc>,
        cooldown: Duration,
    ) -> bool {
        let Some(last) = self.last_sent.get(&(domain_name.to_string(), channel)) else {
            return true;
        };
        // A clock that moved backwards counts as zero elapsed time.
        let elapsed = (as_of - *last).to_std().unwrap_or(Duration::ZERO);
        elapsed >= cooldown
    }

    pub fn record_sent(&mut self, domain_name: &str, channel: ChatId, as_of: DateTime<Utc>) {
        self.last_sent
            .insert((domain_name.to_string(), channel), as_of);
    }

    pub fn last_sent(&self, domain_name: &str, channel: ChatId) -> Option<DateTime<Utc>> {
        self.last_sent
            .get(&(domain_name.to_string(), channel))
            .copied()
    }

    /// Drop entries older than `cooldown`; they no longer suppress anything.
    pub fn prune(&mut self, as_of: DateTime<Utc>, cooldown: Duration) {
        self.last_sent.retain(|_, last| {
            (as_of - *last)
                .to_std()
                .map(|elapsed| elapsed < cooldown)
                .unwrap_or(true)
        });
    }

    pub fn len(&self) -> usize {
        self.last_sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_sent.is_empty()
    }
}
