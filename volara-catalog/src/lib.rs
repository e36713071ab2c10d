pub mod codes;
pub mod routes;
pub mod seat_map;
pub mod seats;

pub use routes::{Route, RouteCatalog, RouteError};
pub use seat_map::SeatMapTemplate;
pub use seats::{Seat, SeatError, SeatRegistry};
