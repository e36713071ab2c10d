use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use volara_api::{app, state::{AppState, AuthConfig}};
use volara_booking::checkout::MockPaymentAdapter;
use volara_core::notify::LogDispatcher;
use volara_store::{
    DbClient, StoreCatalogRepository, StoreReservationRepository, StoreSeatRepository,
    StoreTicketRepository, StoreUserRepository,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "volara_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = volara_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Volara API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let reservations = Arc::new(StoreReservationRepository::new(db.pool.clone()));
    let seats = Arc::new(StoreSeatRepository::new(db.pool.clone()));

    let app_state = AppState {
        catalog: Arc::new(StoreCatalogRepository::new(db.pool.clone())),
        seats: seats.clone(),
        reservations: reservations.clone(),
        tickets: Arc::new(StoreTicketRepository::new(db.pool.clone())),
        users: Arc::new(StoreUserRepository::new(db.pool.clone())),
        payment: Arc::new(MockPaymentAdapter),
        notifier: Arc::new(LogDispatcher),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        business_rules: config.business_rules.clone(),
    };

    tokio::spawn(volara_api::worker::start_expiry_worker(
        reservations,
        seats,
        config.business_rules.expiry_sweep_seconds,
    ));

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
