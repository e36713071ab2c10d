use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    Expired,
}

/// A hosted checkout session created with the external processor.
/// The core only ever needs `verify_session == Succeeded` as the trigger
/// for the PAGADA transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String, // Provider's ID (e.g., cs_123)
    pub reservation_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub redirect_url: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    /// Create a hosted checkout session for the reservation total.
    async fn create_session(
        &self,
        reservation_id: Uuid,
        amount: i64,
        currency: &str,
    ) -> Result<CheckoutSession, Box<dyn std::error::Error + Send + Sync>>;

    /// Resolve a session id to its payment status.
    async fn verify_session(
        &self,
        session_id: &str,
    ) -> Result<PaymentStatus, Box<dyn std::error::Error + Send + Sync>>;
}
