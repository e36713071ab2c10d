pub mod app_config;
pub mod catalog_repo;
pub mod database;
pub mod reservation_repo;
pub mod seat_repo;
pub mod ticket_repo;
pub mod user_repo;

pub use catalog_repo::StoreCatalogRepository;
pub use database::DbClient;
pub use reservation_repo::StoreReservationRepository;
pub use seat_repo::StoreSeatRepository;
pub use ticket_repo::StoreTicketRepository;
pub use user_repo::StoreUserRepository;

/// Postgres unique-violation SQLSTATE, used by the code allocators'
/// retry-on-collision loops.
pub fn is_unique_violation(err: &(dyn std::error::Error + 'static)) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .and_then(|db| db.code())
        .map(|code| code == "23505")
        .unwrap_or(false)
}
