pub mod book;
pub mod checkout;
pub mod codes;
pub mod expiry;
pub mod models;

pub use book::{BookingError, ReservationBook, ReservationSpec, SeatChangeCheck, TravelerData};
pub use checkout::{CheckoutCoordinator, MockPaymentAdapter};
pub use models::{Purchase, Reservation, Segment, Ticket, Traveler};
