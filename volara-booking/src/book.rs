use crate::codes::{self, ReservationCodeError};
use crate::expiry;
use crate::models::{Purchase, Reservation, Segment, Ticket, Traveler};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use volara_catalog::{SeatError, SeatRegistry};
use volara_shared::{CabinClass, Leg, ReservationState, TripType};

#[derive(Debug, Clone)]
pub struct ReservationSpec {
    pub user_id: Uuid,
    pub class: CabinClass,
    pub trip_type: TripType,
    pub outbound_flight_id: Uuid,
    pub return_flight_id: Option<Uuid>,
    pub traveler_count: u32,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TravelerData {
    pub document_id: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub gender: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Read-only answer for the client's pre-check before offering a seat change.
#[derive(Debug, Clone, Serialize)]
pub struct SeatChangeCheck {
    pub allowed: bool,
    pub reason: Option<String>,
}

/// Manages the reservation lifecycle and its guarded state transitions:
/// ACTIVA -> PAGADA | CANCELADA, with no exits from the terminal states.
///
/// Owns travelers and the segment ledger; seat state lives in the
/// `SeatRegistry` the mutating operations borrow.
pub struct ReservationBook {
    reservations: HashMap<Uuid, Reservation>,
    travelers: HashMap<Uuid, Traveler>,
    segments: HashMap<Uuid, Segment>,
}

impl ReservationBook {
    pub fn new() -> Self {
        Self {
            reservations: HashMap::new(),
            travelers: HashMap::new(),
            segments: HashMap::new(),
        }
    }

    pub fn reservation(&self, id: &Uuid) -> Option<&Reservation> {
        self.reservations.get(id)
    }

    pub fn segment(&self, id: &Uuid) -> Option<&Segment> {
        self.segments.get(id)
    }

    pub fn segments_for(&self, reservation_id: Uuid) -> Vec<&Segment> {
        self.segments
            .values()
            .filter(|s| s.reservation_id == reservation_id)
            .collect()
    }

    pub fn travelers_for(&self, reservation_id: Uuid) -> Vec<&Traveler> {
        self.travelers
            .values()
            .filter(|t| t.reservation_id == Some(reservation_id))
            .collect()
    }

    pub fn codes(&self) -> Vec<String> {
        self.reservations.values().map(|r| r.code.clone()).collect()
    }

    /// Create a new ACTIVA reservation with a day-scoped code and a 24h
    /// payment deadline.
    pub fn create(
        &mut self,
        spec: ReservationSpec,
        now: DateTime<Utc>,
    ) -> Result<Reservation, BookingError> {
        if spec.traveler_count < 1 {
            return Err(BookingError::InvalidSpec(
                "traveler count must be at least 1".into(),
            ));
        }
        match spec.trip_type {
            TripType::RoundTrip if spec.return_flight_id.is_none() => {
                return Err(BookingError::InvalidSpec(
                    "round trip requires a return flight".into(),
                ));
            }
            TripType::OneWay if spec.return_flight_id.is_some() => {
                return Err(BookingError::InvalidSpec(
                    "one-way trip must not carry a return flight".into(),
                ));
            }
            _ => {}
        }

        let code = codes::next_reservation_code(&self.codes(), now.date_naive())?;
        let reservation = Reservation::new(
            code,
            spec.user_id,
            spec.class,
            spec.trip_type,
            spec.traveler_count,
            spec.total,
            spec.outbound_flight_id,
            spec.return_flight_id,
            now,
        );
        self.reservations.insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    /// Add a traveler to an ACTIVA reservation, drawing one seat per leg and
    /// writing one segment per leg. Fully compensated: if the return-leg
    /// draw fails, the already-held outbound seat is released and nothing is
    /// persisted.
    pub fn add_traveler(
        &mut self,
        reservation_id: Uuid,
        data: TravelerData,
        seats: &mut SeatRegistry,
        now: DateTime<Utc>,
    ) -> Result<(Traveler, Vec<Segment>), BookingError> {
        let reservation = self
            .reservations
            .get(&reservation_id)
            .ok_or(BookingError::NotFound(reservation_id))?
            .clone();

        if reservation.state != ReservationState::Active {
            return Err(BookingError::InvalidTransition {
                from: reservation.state.to_string(),
                to: "ACTIVA".into(),
            });
        }
        if reservation.is_expired(now) {
            return Err(BookingError::Expired(reservation_id));
        }

        for flight_id in reservation.flight_ids() {
            if self.is_duplicate_traveler(flight_id, &data) {
                return Err(BookingError::DuplicateTraveler {
                    document_id: data.document_id.clone(),
                    flight_id,
                });
            }
        }

        let outbound_seat = seats.reserve_random(reservation.outbound_flight_id, reservation.class)?;

        let return_seat = match reservation.return_flight_id {
            Some(return_flight_id) => {
                match seats.reserve_random(return_flight_id, reservation.class) {
                    Ok(seat) => Some(seat),
                    Err(e) => {
                        // Compensate: the outbound hold must not leak.
                        seats.release(outbound_seat.id)?;
                        return Err(e.into());
                    }
                }
            }
            None => None,
        };

        let traveler = Traveler {
            id: Uuid::new_v4(),
            reservation_id: Some(reservation_id),
            user_id: reservation.user_id,
            document_id: data.document_id,
            first_name: data.first_name,
            last_name: data.last_name,
            birth_date: data.birth_date,
            gender: data.gender,
            email: data.email,
            phone: data.phone,
        };

        let mut created = vec![Segment::new(
            reservation_id,
            traveler.id,
            reservation.outbound_flight_id,
            Leg::Outbound,
            outbound_seat.id,
        )];
        if let (Some(return_flight_id), Some(seat)) = (reservation.return_flight_id, return_seat) {
            created.push(Segment::new(
                reservation_id,
                traveler.id,
                return_flight_id,
                Leg::Return,
                seat.id,
            ));
        }

        self.travelers.insert(traveler.id, traveler.clone());
        for segment in &created {
            self.segments.insert(segment.id, segment.clone());
        }
        Ok((traveler, created))
    }

    /// ACTIVA -> PAGADA. Confirms every held seat of the reservation.
    /// Notification dispatch is the checkout coordinator's job and happens
    /// after this transition has committed.
    pub fn pay(
        &mut self,
        reservation_id: Uuid,
        seats: &mut SeatRegistry,
        now: DateTime<Utc>,
    ) -> Result<Reservation, BookingError> {
        let reservation = self
            .reservations
            .get(&reservation_id)
            .ok_or(BookingError::NotFound(reservation_id))?;

        if reservation.state != ReservationState::Active {
            return Err(BookingError::InvalidTransition {
                from: reservation.state.to_string(),
                to: ReservationState::Paid.to_string(),
            });
        }
        if reservation.is_expired(now) {
            return Err(BookingError::Expired(reservation_id));
        }

        let seat_ids: Vec<Uuid> = self
            .segments_for(reservation_id)
            .iter()
            .map(|s| s.seat_id)
            .collect();
        for seat_id in seat_ids {
            seats.confirm(seat_id)?;
        }

        let reservation = self.reservations.get_mut(&reservation_id).expect("checked above");
        reservation.state = ReservationState::Paid;
        Ok(reservation.clone())
    }

    /// Issue the purchase record and one ticket per segment for a paid
    /// reservation. Both are immutable history from here on.
    pub fn issue_tickets(
        &self,
        reservation_id: Uuid,
        card_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<(Purchase, Vec<Ticket>), BookingError> {
        let reservation = self
            .reservations
            .get(&reservation_id)
            .ok_or(BookingError::NotFound(reservation_id))?;
        if reservation.state != ReservationState::Paid {
            return Err(BookingError::NotPaid(reservation_id));
        }

        let purchase = Purchase {
            id: Uuid::new_v4(),
            reservation_id,
            card_id,
            total: reservation.total,
            purchased_at: now,
        };
        let tickets = self
            .segments_for(reservation_id)
            .into_iter()
            .map(|segment| Ticket::new(purchase.id, segment))
            .collect();
        Ok((purchase, tickets))
    }

    /// ACTIVA -> CANCELADA. Releases every held seat; segments are kept as
    /// historical record.
    pub fn cancel(
        &mut self,
        reservation_id: Uuid,
        seats: &mut SeatRegistry,
    ) -> Result<Reservation, BookingError> {
        let reservation = self
            .reservations
            .get(&reservation_id)
            .ok_or(BookingError::NotFound(reservation_id))?;

        if reservation.state != ReservationState::Active {
            return Err(BookingError::InvalidTransition {
                from: reservation.state.to_string(),
                to: ReservationState::Cancelled.to_string(),
            });
        }

        let seat_ids: Vec<Uuid> = self
            .segments_for(reservation_id)
            .iter()
            .map(|s| s.seat_id)
            .collect();
        for seat_id in seat_ids {
            seats.release(seat_id)?;
        }

        let reservation = self.reservations.get_mut(&reservation_id).expect("checked above");
        reservation.state = ReservationState::Cancelled;
        Ok(reservation.clone())
    }

    /// Post-payment seat reassignment: delegates to the registry swap with
    /// the reservation's class as the required class, then repoints the
    /// segment.
    pub fn change_seat(
        &mut self,
        segment_id: Uuid,
        new_seat_id: Uuid,
        seats: &mut SeatRegistry,
    ) -> Result<Segment, BookingError> {
        let segment = self
            .segments
            .get(&segment_id)
            .ok_or(BookingError::SegmentNotFound(segment_id))?
            .clone();
        let reservation = self
            .reservations
            .get(&segment.reservation_id)
            .ok_or(BookingError::NotFound(segment.reservation_id))?;

        if reservation.state != ReservationState::Paid {
            return Err(BookingError::NotPaid(reservation.id));
        }

        seats.swap(segment.flight_id, segment.seat_id, new_seat_id, reservation.class)?;

        let segment = self.segments.get_mut(&segment_id).expect("checked above");
        segment.seat_id = new_seat_id;
        Ok(segment.clone())
    }

    /// Read-only mirror of the change_seat guard.
    pub fn can_change_seat(&self, segment_id: Uuid) -> SeatChangeCheck {
        let Some(segment) = self.segments.get(&segment_id) else {
            return SeatChangeCheck {
                allowed: false,
                reason: Some("segment not found".into()),
            };
        };
        let Some(reservation) = self.reservations.get(&segment.reservation_id) else {
            return SeatChangeCheck {
                allowed: false,
                reason: Some("reservation not found".into()),
            };
        };
        if reservation.state != ReservationState::Paid {
            return SeatChangeCheck {
                allowed: false,
                reason: Some(format!(
                    "reservation is {}, seat changes require PAGADA",
                    reservation.state
                )),
            };
        }
        SeatChangeCheck {
            allowed: true,
            reason: None,
        }
    }

    /// Cancel every ACTIVA reservation whose deadline has passed. Returns
    /// the number of reservations cancelled.
    pub fn sweep_expired(&mut self, seats: &mut SeatRegistry, now: DateTime<Utc>) -> usize {
        let expired = expiry::expired_ids(self.reservations.values(), now);
        let mut swept = 0;
        for id in expired {
            if self.cancel(id, seats).is_ok() {
                swept += 1;
            }
        }
        swept
    }

    /// Same person (normalized document id, or exact first+last name match)
    /// already travelling on this flight under a non-cancelled reservation.
    fn is_duplicate_traveler(&self, flight_id: Uuid, data: &TravelerData) -> bool {
        let doc = data.document_id.trim();
        let first = data.first_name.trim().to_lowercase();
        let last = data.last_name.trim().to_lowercase();

        self.reservations
            .values()
            .filter(|r| {
                r.state != ReservationState::Cancelled && r.flight_ids().contains(&flight_id)
            })
            .flat_map(|r| self.travelers_for(r.id))
            .any(|t| {
                let (t_doc, t_first, t_last) = t.identity_key();
                t_doc == doc || (t_first == first && t_last == last)
            })
    }
}

impl Default for ReservationBook {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Reservation not found: {0}")]
    NotFound(Uuid),

    #[error("Segment not found: {0}")]
    SegmentNotFound(Uuid),

    #[error("Invalid reservation: {0}")]
    InvalidSpec(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Reservation expired: {0}")]
    Expired(Uuid),

    #[error("Traveler {document_id} is already booked on flight {flight_id}")]
    DuplicateTraveler { document_id: String, flight_id: Uuid },

    #[error("Reservation {0} is not paid; seat changes require PAGADA")]
    NotPaid(Uuid),

    #[error(transparent)]
    Code(#[from] ReservationCodeError),

    #[error(transparent)]
    Seat(#[from] SeatError),
}
