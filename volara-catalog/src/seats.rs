use crate::seat_map::SeatMapTemplate;
use rand::seq::IteratorRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use volara_shared::{CabinClass, SeatState};

/// A single seat on a flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub id: Uuid,
    pub flight_id: Uuid,
    pub label: String,
    pub row: i32,
    pub column: char,
    pub class: CabinClass,
    pub state: SeatState,
}

/// In-memory seat inventory, one entry per (flight, seat).
///
/// The SQL mirror in volara-store enforces the same transitions with
/// state-guarded updates; this registry is the reference semantics and the
/// unit-test surface.
pub struct SeatRegistry {
    seats: HashMap<Uuid, Seat>,
}

impl SeatRegistry {
    pub fn new() -> Self {
        Self {
            seats: HashMap::new(),
        }
    }

    /// Instantiate the fixed layout for a newly scheduled flight.
    /// Re-provisioning an already seated flight is rejected.
    pub fn provision(
        &mut self,
        flight_id: Uuid,
        template: &SeatMapTemplate,
    ) -> Result<Vec<Uuid>, SeatError> {
        if self.seats.values().any(|s| s.flight_id == flight_id) {
            return Err(SeatError::AlreadyProvisioned(flight_id));
        }

        let mut ids = Vec::new();
        for blueprint in template.blueprints() {
            let seat = Seat {
                id: Uuid::new_v4(),
                flight_id,
                label: blueprint.label,
                row: blueprint.row,
                column: blueprint.column,
                class: blueprint.class,
                state: SeatState::Available,
            };
            ids.push(seat.id);
            self.seats.insert(seat.id, seat);
        }
        Ok(ids)
    }

    pub fn get(&self, seat_id: &Uuid) -> Option<&Seat> {
        self.seats.get(seat_id)
    }

    pub fn list_for_flight(&self, flight_id: Uuid) -> Vec<&Seat> {
        self.seats
            .values()
            .filter(|s| s.flight_id == flight_id)
            .collect()
    }

    pub fn count_in_state(&self, flight_id: Uuid, state: SeatState) -> usize {
        self.seats
            .values()
            .filter(|s| s.flight_id == flight_id && s.state == state)
            .count()
    }

    /// Draw an arbitrary free seat of the class and hold it (RESERVADO).
    pub fn reserve_random(
        &mut self,
        flight_id: Uuid,
        class: CabinClass,
    ) -> Result<Seat, SeatError> {
        let mut rng = rand::thread_rng();
        let candidate = self
            .seats
            .values()
            .filter(|s| {
                s.flight_id == flight_id
                    && s.class == class
                    && s.state == SeatState::Available
            })
            .map(|s| s.id)
            .choose(&mut rng)
            .ok_or(SeatError::NoSeatsAvailable { flight_id, class })?;

        let seat = self.seats.get_mut(&candidate).ok_or(SeatError::NotFound(candidate))?;
        seat.state = SeatState::Held;
        Ok(seat.clone())
    }

    /// Back to DISPONIBLE. Releasing an already-free seat is a no-op.
    pub fn release(&mut self, seat_id: Uuid) -> Result<(), SeatError> {
        let seat = self.seats.get_mut(&seat_id).ok_or(SeatError::NotFound(seat_id))?;
        seat.state = SeatState::Available;
        Ok(())
    }

    /// RESERVADO -> OCUPADO, at payment time.
    pub fn confirm(&mut self, seat_id: Uuid) -> Result<(), SeatError> {
        let seat = self.seats.get_mut(&seat_id).ok_or(SeatError::NotFound(seat_id))?;
        if seat.state != SeatState::Held {
            return Err(SeatError::SeatUnavailable(seat_id));
        }
        seat.state = SeatState::Occupied;
        Ok(())
    }

    /// Release `from` and occupy `to`, validating flight and class first.
    /// Used by post-payment seat changes, so the new seat goes straight to OCUPADO.
    pub fn swap(
        &mut self,
        flight_id: Uuid,
        from_seat_id: Uuid,
        to_seat_id: Uuid,
        required_class: CabinClass,
    ) -> Result<Seat, SeatError> {
        let to_seat = self.seats.get(&to_seat_id).ok_or(SeatError::NotFound(to_seat_id))?;

        if to_seat.flight_id != flight_id {
            return Err(SeatError::WrongFlight(to_seat_id));
        }
        if to_seat.class != required_class {
            return Err(SeatError::WrongClass(to_seat_id));
        }
        if to_seat.state != SeatState::Available {
            return Err(SeatError::SeatUnavailable(to_seat_id));
        }

        // Both seats validated; flip them together.
        self.release(from_seat_id)?;
        let to_seat = self.seats.get_mut(&to_seat_id).ok_or(SeatError::NotFound(to_seat_id))?;
        to_seat.state = SeatState::Occupied;
        Ok(to_seat.clone())
    }
}

impl Default for SeatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SeatError {
    #[error("Seat not found: {0}")]
    NotFound(Uuid),

    #[error("Flight {0} already has seats provisioned")]
    AlreadyProvisioned(Uuid),

    #[error("No {class} seats available on flight {flight_id}")]
    NoSeatsAvailable {
        flight_id: Uuid,
        class: CabinClass,
    },

    #[error("Seat {0} is not available")]
    SeatUnavailable(Uuid),

    #[error("Seat {0} belongs to a different flight")]
    WrongFlight(Uuid),

    #[error("Seat {0} is in a different cabin class")]
    WrongClass(Uuid),
}
