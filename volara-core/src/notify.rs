use async_trait::async_trait;
use serde_json::Value;

/// Outbound notification boundary. Callers on the payment path must treat
/// every failure as non-fatal: log it and move on, the state transition has
/// already committed.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send_reservation_confirmation(
        &self,
        email: &str,
        reservation: &Value,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn send_purchase_confirmation(
        &self,
        owner_email: &str,
        traveler_emails: &[String],
        reservation: &Value,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn send_pin(
        &self,
        email: &str,
        pin: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Log-only dispatcher. Real SMTP delivery lives behind this trait in
/// deployments; for local runs and tests the structured log line is enough.
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn send_reservation_confirmation(
        &self,
        email: &str,
        reservation: &Value,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!(
            code = reservation["code"].as_str().unwrap_or_default(),
            "Reservation confirmation queued for {}",
            email
        );
        Ok(())
    }

    async fn send_purchase_confirmation(
        &self,
        owner_email: &str,
        traveler_emails: &[String],
        reservation: &Value,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!(
            code = reservation["code"].as_str().unwrap_or_default(),
            recipients = traveler_emails.len() + 1,
            "Purchase confirmation queued for {}",
            owner_email
        );
        Ok(())
    }

    async fn send_pin(
        &self,
        email: &str,
        _pin: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // The PIN itself stays out of the logs.
        tracing::info!("Password reset PIN queued for {}", email);
        Ok(())
    }
}
