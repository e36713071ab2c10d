pub mod models;
pub mod pii;

pub use models::enums::{CabinClass, Leg, ReservationState, SeatState, TripType};
