use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use volara_shared::{CabinClass, Leg, ReservationState, TripType};

/// Hours a reservation stays payable before it is considered expired.
pub const RESERVATION_TTL_HOURS: i64 = 24;

/// The top-level booking entity. Owns its travelers and, transitively,
/// their segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub code: String,
    pub user_id: Uuid,
    pub class: CabinClass,
    pub trip_type: TripType,
    pub state: ReservationState,
    pub traveler_count: u32,
    pub total: i64,
    pub outbound_flight_id: Uuid,
    pub return_flight_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new(
        code: String,
        user_id: Uuid,
        class: CabinClass,
        trip_type: TripType,
        traveler_count: u32,
        total: i64,
        outbound_flight_id: Uuid,
        return_flight_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            user_id,
            class,
            trip_type,
            state: ReservationState::Active,
            traveler_count,
            total,
            outbound_flight_id,
            return_flight_id,
            created_at: now,
            expires_at: now + Duration::hours(RESERVATION_TTL_HOURS),
        }
    }

    /// Deadline check only; the state transition is the sweep worker's job.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.state == ReservationState::Active && self.expires_at <= now
    }

    /// Flights this reservation touches, outbound first.
    pub fn flight_ids(&self) -> Vec<Uuid> {
        let mut ids = vec![self.outbound_flight_id];
        if let Some(ret) = self.return_flight_id {
            ids.push(ret);
        }
        ids
    }
}

/// A person included in a reservation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Traveler {
    pub id: Uuid,
    pub reservation_id: Option<Uuid>,
    pub user_id: Uuid,
    pub document_id: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub gender: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Traveler {
    /// Normalized identity key for the duplicate-booking guard: trimmed
    /// document id, case-folded names.
    pub fn identity_key(&self) -> (String, String, String) {
        (
            self.document_id.trim().to_string(),
            self.first_name.trim().to_lowercase(),
            self.last_name.trim().to_lowercase(),
        )
    }
}

/// One traveler's seat assignment on one flight leg. Created at booking
/// time; its seat reference only changes through the guarded seat-change path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub traveler_id: Uuid,
    pub flight_id: Uuid,
    pub leg: Leg,
    pub seat_id: Uuid,
}

impl Segment {
    pub fn new(
        reservation_id: Uuid,
        traveler_id: Uuid,
        flight_id: Uuid,
        leg: Leg,
        seat_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            reservation_id,
            traveler_id,
            flight_id,
            leg,
            seat_id,
        }
    }
}

/// A payment event against a reservation. Immutable history once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub card_id: Option<Uuid>,
    pub total: i64,
    pub purchased_at: DateTime<Utc>,
}

/// A purchased seat assignment for one traveler on one flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub traveler_id: Uuid,
    pub flight_id: Uuid,
    pub seat_id: Uuid,
    pub checked_in: bool,
}

impl Ticket {
    pub fn new(purchase_id: Uuid, segment: &Segment) -> Self {
        Self {
            id: Uuid::new_v4(),
            purchase_id,
            traveler_id: segment.traveler_id,
            flight_id: segment.flight_id,
            seat_id: segment.seat_id,
            checked_in: false,
        }
    }
}
