//! User-visible, non-fatal failure notifications.

use shared::error::ApiError;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub message: String,
    pub error: ApiError,
}

/// Fire-and-forget sink for `(message, error)` pairs.
pub trait AlertSink: Send + Sync {
    fn add_error(&self, message: &str, error: &ApiError);
}

/// Fans alerts out to every subscribed view.
#[derive(Clone)]
pub struct AlertChannel {
    tx: broadcast::Sender<Alert>,
}

impl Default for AlertChannel {
    fn default() -> Self {
        Self::new(64)
    }
}

impl AlertChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.tx.subscribe()
    }
}

impl AlertSink for AlertChannel {
    fn add_error(&self, message: &str, error: &ApiError) {
        tracing::warn!(alert = message, %error, "raising user-visible alert");
        // No subscriber means nobody is showing alerts right now.
        let _ = self.tx.send(Alert {
            message: message.to_string(),
            error: error.clone(),
        });
    }
}
