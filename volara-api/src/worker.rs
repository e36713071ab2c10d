use std::sync::Arc;
use chrono::Utc;
use tokio::time::{interval, Duration};
use tracing::{error, info};
use uuid::Uuid;
use volara_core::repository::{ReservationRepository, SeatRepository};
use volara_shared::ReservationState;

/// Background sweep for the 24h reservation deadline. Each pass cancels
/// every ACTIVA reservation past its `expires_at` and returns its held
/// seats to the pool. The state flip is conditional, so a payment racing
/// the sweep wins cleanly on one side or the other.
pub async fn start_expiry_worker(
    reservations: Arc<dyn ReservationRepository>,
    seats: Arc<dyn SeatRepository>,
    sweep_seconds: u64,
) {
    let mut ticker = interval(Duration::from_secs(sweep_seconds));
    info!("Expiry worker started, sweeping every {}s", sweep_seconds);

    loop {
        ticker.tick().await;
        if let Err(e) = sweep_once(reservations.as_ref(), seats.as_ref()).await {
            error!("Expiry sweep failed: {}", e);
        }
    }
}

async fn sweep_once(
    reservations: &dyn ReservationRepository,
    seats: &dyn SeatRepository,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let expired = reservations.list_expired_active(Utc::now()).await?;

    for reservation in expired {
        let id = match reservation["id"].as_str().and_then(|s| Uuid::parse_str(s).ok()) {
            Some(id) => id,
            None => continue,
        };

        let flipped = reservations
            .try_update_state(
                id,
                ReservationState::Active.as_str(),
                ReservationState::Cancelled.as_str(),
            )
            .await?;
        if !flipped {
            // Paid or cancelled between the scan and the flip.
            continue;
        }

        let seat_ids = reservations.seat_ids_for_reservation(id).await?;
        for seat_id in &seat_ids {
            seats.release(*seat_id).await?;
        }
        info!(
            "Expired reservation {} cancelled, {} seats released",
            id,
            seat_ids.len()
        );
    }

    Ok(())
}
