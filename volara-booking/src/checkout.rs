use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;
use volara_core::notify::NotificationDispatcher;
use volara_core::payment::{CheckoutSession, PaymentAdapter, PaymentStatus};

/// Orchestrates the payment side of the PAGADA transition: session creation
/// and verification go through the adapter; confirmation mail goes through
/// the dispatcher and is strictly best-effort.
pub struct CheckoutCoordinator {
    adapter: Arc<dyn PaymentAdapter>,
    notifier: Arc<dyn NotificationDispatcher>,
}

impl CheckoutCoordinator {
    pub fn new(adapter: Arc<dyn PaymentAdapter>, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        Self { adapter, notifier }
    }

    /// Create a hosted checkout session for the reservation total.
    pub async fn start_checkout(
        &self,
        reservation_id: Uuid,
        amount: i64,
        currency: &str,
    ) -> Result<CheckoutSession, Box<dyn std::error::Error + Send + Sync>> {
        self.adapter.create_session(reservation_id, amount, currency).await
    }

    /// Resolve a session id to "payment succeeded" - the only boolean the
    /// reservation state machine needs.
    pub async fn payment_succeeded(
        &self,
        session_id: &str,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let status = self.adapter.verify_session(session_id).await?;
        Ok(status == PaymentStatus::Succeeded)
    }

    /// Fire the purchase confirmations. The reservation is already PAGADA;
    /// a dispatch failure is logged and never propagated.
    pub async fn notify_paid(
        &self,
        owner_email: &str,
        traveler_emails: &[String],
        reservation: &Value,
    ) {
        if let Err(e) = self
            .notifier
            .send_purchase_confirmation(owner_email, traveler_emails, reservation)
            .await
        {
            tracing::warn!(
                code = reservation["code"].as_str().unwrap_or_default(),
                "Purchase confirmation dispatch failed: {}",
                e
            );
        }
    }

    /// Reservation-created confirmation, same best-effort contract.
    pub async fn notify_reserved(&self, email: &str, reservation: &Value) {
        if let Err(e) = self
            .notifier
            .send_reservation_confirmation(email, reservation)
            .await
        {
            tracing::warn!(
                code = reservation["code"].as_str().unwrap_or_default(),
                "Reservation confirmation dispatch failed: {}",
                e
            );
        }
    }
}

pub struct MockPaymentAdapter;

#[async_trait::async_trait]
impl PaymentAdapter for MockPaymentAdapter {
    async fn create_session(
        &self,
        reservation_id: Uuid,
        amount: i64,
        currency: &str,
    ) -> Result<CheckoutSession, Box<dyn std::error::Error + Send + Sync>> {
        // Encode the reservation id in the session id so the mock can "remember" it.
        let id = format!("mock_cs_{}", reservation_id.simple());
        Ok(CheckoutSession {
            redirect_url: format!("https://checkout.example/pay/{}", id),
            id,
            reservation_id,
            amount,
            currency: currency.to_string(),
            created_at: chrono::Utc::now(),
        })
    }

    async fn verify_session(
        &self,
        session_id: &str,
    ) -> Result<PaymentStatus, Box<dyn std::error::Error + Send + Sync>> {
        // Trigger for testing declined payments
        if session_id.ends_with("_declined") {
            return Ok(PaymentStatus::Failed);
        }
        if !session_id.starts_with("mock_cs_") {
            return Err("Unknown checkout session".into());
        }
        Ok(PaymentStatus::Succeeded)
    }
}
