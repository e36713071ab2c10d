use std::sync::Arc;
use volara_core::notify::NotificationDispatcher;
use volara_core::payment::PaymentAdapter;
use volara_core::repository::{
    CatalogRepository, ReservationRepository, SeatRepository, TicketRepository, UserRepository,
};
use volara_store::app_config::BusinessRules;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogRepository>,
    pub seats: Arc<dyn SeatRepository>,
    pub reservations: Arc<dyn ReservationRepository>,
    pub tickets: Arc<dyn TicketRepository>,
    pub users: Arc<dyn UserRepository>,
    pub payment: Arc<dyn PaymentAdapter>,
    pub notifier: Arc<dyn NotificationDispatcher>,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}
