//! Multi-channel alert dispatch with per-channel failure isolation.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};

use crate::{
    dedup::DedupGuard,
    domain::ChatId,
    expiry::DueDomain,
    formatting::{format_alert_message, split_chunks},
    messaging::port::MessagingPort,
    Error, Result,
};

/// Result of one channel's delivery attempt within a cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelOutcome {
    /// Message delivered; the listed domains were recorded as sent.
    Sent { domains: Vec<String> },
    /// Every due domain is still inside its cooldown for this channel.
    Suppressed,
    Failed { error: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub outcomes: Vec<(ChatId, ChannelOutcome)>,
}

impl DispatchReport {
    pub fn sent_channels(&self) -> Vec<ChatId> {
        self.channels_matching(|o| matches!(o, ChannelOutcome::Sent { .. }))
    }

    pub fn failed_channels(&self) -> Vec<ChatId> {
        self.channels_matching(|o| matches!(o, ChannelOutcome::Failed { .. }))
    }

    pub fn suppressed_channels(&self) -> Vec<ChatId> {
        self.channels_matching(|o| matches!(o, ChannelOutcome::Suppressed))
    }

    fn channels_matching(&self, pred: impl Fn(&ChannelOutcome) -> bool) -> Vec<ChatId> {
        self.outcomes
            .iter()
            .filter(|(_, o)| pred(o))
            .map(|(c, _)| *c)
            .collect()
    }
}

pub struct NotificationDispatcher {
    messenger: Arc<dyn MessagingPort>,
    channels: Vec<ChatId>,
    send_timeout: Duration,
    chunk_limit: usize,
}

impl NotificationDispatcher {
    pub fn new(
        messenger: Arc<dyn MessagingPort>,
        channels: Vec<ChatId>,
        send_timeout: Duration,
        chunk_limit: usize,
    ) -> Self {
        let max = messenger.capabilities().max_message_len;
        Self {
            messenger,
            channels,
            send_timeout,
            chunk_limit: chunk_limit.clamp(1, max.max(1)),
        }
    }

    pub fn channels(&self) -> &[ChatId] {
        &self.channels
    }

    pub fn messenger(&self) -> Arc<dyn MessagingPort> {
        self.messenger.clone()
    }

    /// Chunk size used for every outbound message, capped by the messenger.
    pub fn chunk_limit(&self) -> usize {
        self.chunk_limit
    }

    /// Send one combined alert per channel for the due domains that channel
    /// has not seen within `cooldown`.
    ///
    /// A failed or timed-out send is logged and left unrecorded so the next
    /// cycle retries it. One channel never blocks another.
    pub async fn dispatch_alerts(
        &self,
        due: &[DueDomain],
        guard: &mut DedupGuard,
        as_of: DateTime<Utc>,
        cooldown: Duration,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        if due.is_empty() {
            return report;
        }

        for &channel in &self.channels {
            let pending: Vec<DueDomain> = due
                .iter()
                .filter(|d| guard.should_send(&d.name, channel, as_of, cooldown))
                .cloned()
                .collect();

            if pending.is_empty() {
                tracing::debug!(%channel, "all due domains within cooldown, skipping");
                report.outcomes.push((channel, ChannelOutcome::Suppressed));
                continue;
            }

            let message = format_alert_message(&pending);
            match self.send_chunked(channel, &message).await {
                Ok(()) => {
                    let domains: Vec<String> = pending.into_iter().map(|d| d.name).collect();
                    for name in &domains {
                        guard.record_sent(name, channel, as_of);
                    }
                    tracing::info!(%channel, domains = domains.len(), "sent expiry alert");
                    report
                        .outcomes
                        .push((channel, ChannelOutcome::Sent { domains }));
                }
                Err(e) => {
                    tracing::error!(%channel, error = %e, "failed to send expiry alert");
                    report.outcomes.push((
                        channel,
                        ChannelOutcome::Failed {
                            error: e.to_string(),
                        },
                    ));
                }
            }
        }

        report
    }

    /// Send `html` to every channel without dedup. Failures are logged only.
    pub async fn broadcast(&self, html: &str) -> DispatchReport {
        let mut report = DispatchReport::default();
        for &channel in &self.channels {
            let outcome = match self.send_chunked(channel, html).await {
                Ok(()) => ChannelOutcome::Sent {
                    domains: Vec::new(),
                },
                Err(e) => {
                    tracing::warn!(%channel, error = %e, "broadcast failed");
                    ChannelOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            report.outcomes.push((channel, outcome));
        }
        report
    }

    async fn send_chunked(&self, channel: ChatId, html: &str) -> Result<()> {
        for chunk in split_chunks(html, self.chunk_limit) {
            self.send_one(channel, &chunk).await?;
        }
        Ok(())
    }

    async fn send_one(&self, channel: ChatId, html: &str) -> Result<()> {
        match tokio::time::timeout(self.send_timeout, self.messenger.send_html(channel, html))
            .await
        {
            Ok(res) => res.map(|_| ()),
            Err(_) => Err(Error::Transport {
                channel,
                reason: format!("timed out after {:?}", self.send_timeout),
            }),
        }
    }
}
