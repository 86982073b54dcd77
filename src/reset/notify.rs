use async_trait::async_trait;
use chrono::Duration;

/// Out-of-band delivery of an issued reset code.
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    fn name(&self) -> &str;

    async fn send_reset_code(
        &self,
        to_email: &str,
        to_name: &str,
        code: &str,
        valid_for: Duration,
    ) -> Result<(), String>;
}

/// Fallback when no SMTP relay is configured: writes the code to the log.
pub struct LogNotifier;

#[async_trait]
impl ResetNotifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn send_reset_code(
        &self,
        to_email: &str,
        _to_name: &str,
        code: &str,
        valid_for: Duration,
    ) -> Result<(), String> {
        tracing::warn!(
            "System SMTP not configured. Password reset code for {to_email}: {code} (valid for {} minutes)",
            valid_for.num_minutes()
        );
        Ok(())
    }
}
