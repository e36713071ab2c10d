use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

type RepoError = Box<dyn std::error::Error + Send + Sync>;

/// Repository trait for cities, routes and flights.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn create_city(&self, city: &Value) -> Result<Uuid, RepoError>;

    async fn list_cities(&self) -> Result<Vec<Value>, RepoError>;

    /// Insert an outbound route and its mirror in a single transaction.
    /// A unique violation on the code or the directional pair surfaces as an error.
    async fn create_route_pair(
        &self,
        outbound: &Value,
        mirror: &Value,
    ) -> Result<(Uuid, Uuid), RepoError>;

    async fn route_pair_exists(
        &self,
        origin_city_id: Uuid,
        destination_city_id: Uuid,
    ) -> Result<bool, RepoError>;

    /// All persisted route codes, for the allocator scan.
    async fn list_route_codes(&self) -> Result<Vec<String>, RepoError>;

    async fn get_route(&self, id: Uuid) -> Result<Option<Value>, RepoError>;

    async fn list_routes(&self) -> Result<Vec<Value>, RepoError>;

    async fn create_flight(&self, flight: &Value) -> Result<Uuid, RepoError>;

    async fn get_flight(&self, id: Uuid) -> Result<Option<Value>, RepoError>;

    async fn list_flights(
        &self,
        route_id: Option<Uuid>,
        date: Option<&str>,
    ) -> Result<Vec<Value>, RepoError>;
}

/// Repository trait for per-flight seat inventory.
///
/// Every state transition is a conditional update: the store re-checks the
/// expected state under a row lock so two concurrent bookers can never flip
/// the same seat.
#[async_trait]
pub trait SeatRepository: Send + Sync {
    /// Bulk-insert the provisioned seat map. Fails if the flight already has seats.
    async fn provision(&self, flight_id: Uuid, seats: &[Value]) -> Result<u64, RepoError>;

    /// Pick an arbitrary DISPONIBLE seat of the class and flip it to RESERVADO,
    /// returning the seat. `None` means the pool is exhausted.
    async fn reserve_random(
        &self,
        flight_id: Uuid,
        class: &str,
    ) -> Result<Option<Value>, RepoError>;

    /// Back to DISPONIBLE. Idempotent.
    async fn release(&self, seat_id: Uuid) -> Result<(), RepoError>;

    /// Conditional transition; `false` means the seat was not in `from` state.
    async fn try_transition(
        &self,
        seat_id: Uuid,
        from: &str,
        to: &str,
    ) -> Result<bool, RepoError>;

    /// Flip every RESERVADO seat referenced by the reservation's segments to OCUPADO.
    async fn confirm_held(&self, reservation_id: Uuid) -> Result<u64, RepoError>;

    async fn get_seat(&self, seat_id: Uuid) -> Result<Option<Value>, RepoError>;

    async fn list_for_flight(&self, flight_id: Uuid) -> Result<Vec<Value>, RepoError>;
}

/// Repository trait for reservations, travelers and segments.
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    async fn create_reservation(&self, reservation: &Value) -> Result<Uuid, RepoError>;

    /// Join-fetches travelers and segments into the reservation snapshot.
    async fn get_reservation(&self, id: Uuid) -> Result<Option<Value>, RepoError>;

    async fn list_reservations(&self, user_id: Uuid) -> Result<Vec<Value>, RepoError>;

    /// State-guarded update; `false` means the reservation was not in `from`.
    async fn try_update_state(&self, id: Uuid, from: &str, to: &str) -> Result<bool, RepoError>;

    /// Codes starting with the given day prefix, for the allocator scan.
    async fn list_codes_with_prefix(&self, prefix: &str) -> Result<Vec<String>, RepoError>;

    /// Persist a traveler and its segments in one transaction.
    async fn add_traveler_with_segments(
        &self,
        reservation_id: Uuid,
        traveler: &Value,
        segments: &[Value],
    ) -> Result<Uuid, RepoError>;

    /// Duplicate-person guard: any traveler with the same normalized document id
    /// (or same first+last name) on this flight under a non-cancelled reservation.
    async fn traveler_booked_on_flight(
        &self,
        flight_id: Uuid,
        document_id: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<bool, RepoError>;

    async fn get_segment(&self, segment_id: Uuid) -> Result<Option<Value>, RepoError>;

    async fn update_segment_seat(&self, segment_id: Uuid, seat_id: Uuid) -> Result<(), RepoError>;

    async fn seat_ids_for_reservation(&self, id: Uuid) -> Result<Vec<Uuid>, RepoError>;

    /// ACTIVA reservations whose deadline has passed, for the sweep worker.
    async fn list_expired_active(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Value>, RepoError>;
}

/// Repository trait for purchases, tickets and payment cards.
#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// Persist the purchase and its tickets in one transaction.
    async fn create_purchase_with_tickets(
        &self,
        purchase: &Value,
        tickets: &[Value],
    ) -> Result<Uuid, RepoError>;

    async fn list_tickets_for_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Vec<Value>, RepoError>;

    async fn get_ticket(&self, ticket_id: Uuid) -> Result<Option<Value>, RepoError>;

    async fn set_checked_in(&self, ticket_id: Uuid, checked_in: bool) -> Result<bool, RepoError>;

    /// Whether a ticket already exists for this person on this flight.
    async fn traveler_ticketed_on_flight(
        &self,
        flight_id: Uuid,
        document_id: &str,
    ) -> Result<bool, RepoError>;

    async fn create_card(&self, card: &Value) -> Result<Uuid, RepoError>;

    async fn list_cards(&self, user_id: Uuid) -> Result<Vec<Value>, RepoError>;

    /// Balance-guarded adjustment; `false` means insufficient balance.
    async fn adjust_card_balance(&self, card_id: Uuid, delta: i64) -> Result<bool, RepoError>;
}

/// Repository trait for user accounts and the password-reset PIN store.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: &Value) -> Result<Uuid, RepoError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Value>, RepoError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<Value>, RepoError>;

    /// Upsert the reset PIN with its deadline; one live PIN per email.
    async fn store_reset_pin(
        &self,
        email: &str,
        pin: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepoError>;

    /// Consume the PIN if present and unexpired. The expiry is checked on
    /// read, so stale rows need no background cleanup.
    async fn take_reset_pin(&self, email: &str, pin: &str) -> Result<bool, RepoError>;

    async fn update_password(&self, email: &str, password_hash: &str) -> Result<(), RepoError>;
}
