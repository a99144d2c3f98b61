use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification transport failed: {0}")]
    Transport(String),

    #[error("Notification payload invalid: {0}")]
    Payload(String),
}

/// Best-effort outbound notifications (confirmation emails and the like).
/// Callers log failures and never roll back committed state because of them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, template: &str, recipient: &str, payload: Value) -> Result<(), NotifyError>;
}

/// Notifier that only writes to the log
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, template: &str, recipient: &str, payload: Value) -> Result<(), NotifyError> {
        tracing::info!(template, recipient, %payload, "Notification (log only)");
        Ok(())
    }
}
