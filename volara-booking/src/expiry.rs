use crate::models::Reservation;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Expiration is a deadline check, not an active timer: a reservation past
/// `expires_at` while still ACTIVA is logically expired, and the periodic
/// sweep (or the next guarded operation) is what makes that observable.
pub fn expired_ids<'a>(
    reservations: impl Iterator<Item = &'a Reservation>,
    now: DateTime<Utc>,
) -> Vec<Uuid> {
    reservations
        .filter(|r| r.is_expired(now))
        .map(|r| r.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use volara_shared::{CabinClass, ReservationState, TripType};

    fn reservation_at(created: DateTime<Utc>) -> Reservation {
        Reservation::new(
            "RES-20260314-00001".into(),
            Uuid::new_v4(),
            CabinClass::Economy,
            TripType::OneWay,
            1,
            100_000,
            Uuid::new_v4(),
            None,
            created,
        )
    }

    #[test]
    fn test_deadline_detection() {
        let created = Utc::now();
        let fresh = reservation_at(created);
        let mut stale = reservation_at(created - Duration::hours(30));

        let ids = expired_ids([&fresh, &stale].into_iter(), created);
        assert_eq!(ids, vec![stale.id]);

        // Terminal states are never swept.
        stale.state = ReservationState::Paid;
        let ids = expired_ids([&fresh, &stale].into_iter(), created);
        assert!(ids.is_empty());
    }
}
