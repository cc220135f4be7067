use crate::config::TELEGRAM_MAX_MESSAGE_LEN;

/// Capabilities / limits of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub max_message_len: usize,
}

impl Default for MessagingCapabilities {
    fn default() -> Self {
        Self {
            max_message_len: TELEGRAM_MAX_MESSAGE_LEN,
        }
    }
}
