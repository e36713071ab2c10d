use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;
use uuid::Uuid;
use volara_api::middleware::auth::Claims;
use volara_api::state::{AppState, AuthConfig};
use volara_booking::checkout::MockPaymentAdapter;
use volara_core::notify::LogDispatcher;
use volara_core::repository::{
    CatalogRepository, ReservationRepository, SeatRepository, TicketRepository, UserRepository,
};
use volara_store::app_config::BusinessRules;

const SECRET: &str = "integration-test-secret";

type RepoError = Box<dyn std::error::Error + Send + Sync>;

/// Shared in-memory tables standing in for Postgres.
#[derive(Default)]
struct MemStore {
    cities: Mutex<Vec<Value>>,
    routes: Mutex<Vec<Value>>,
    flights: Mutex<Vec<Value>>,
    seats: Mutex<Vec<Value>>,
    reservations: Mutex<Vec<Value>>,
    travelers: Mutex<Vec<Value>>,
    segments: Mutex<Vec<Value>>,
    purchases: Mutex<Vec<Value>>,
    tickets: Mutex<Vec<Value>>,
    cards: Mutex<Vec<Value>>,
    users: Mutex<Vec<Value>>,
    pins: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
}

#[derive(Clone)]
struct MemRepo(Arc<MemStore>);

fn id_of(row: &Value) -> &str {
    row["id"].as_str().unwrap_or_default()
}

#[async_trait]
impl CatalogRepository for MemRepo {
    async fn create_city(&self, city: &Value) -> Result<Uuid, RepoError> {
        let id = Uuid::new_v4();
        let mut row = city.clone();
        row["id"] = json!(id);
        self.0.cities.lock().unwrap().push(row);
        Ok(id)
    }

    async fn list_cities(&self) -> Result<Vec<Value>, RepoError> {
        Ok(self.0.cities.lock().unwrap().clone())
    }

    async fn create_route_pair(
        &self,
        outbound: &Value,
        mirror: &Value,
    ) -> Result<(Uuid, Uuid), RepoError> {
        let mut routes = self.0.routes.lock().unwrap();
        for candidate in [outbound, mirror] {
            if routes.iter().any(|r| r["code"] == candidate["code"]) {
                return Err("duplicate code".into());
            }
        }
        let (outbound_id, mirror_id) = (Uuid::new_v4(), Uuid::new_v4());
        let mut out_row = outbound.clone();
        out_row["id"] = json!(outbound_id);
        let mut mirror_row = mirror.clone();
        mirror_row["id"] = json!(mirror_id);
        routes.push(out_row);
        routes.push(mirror_row);
        Ok((outbound_id, mirror_id))
    }

    async fn route_pair_exists(
        &self,
        origin_city_id: Uuid,
        destination_city_id: Uuid,
    ) -> Result<bool, RepoError> {
        Ok(self.0.routes.lock().unwrap().iter().any(|r| {
            r["origin_city_id"] == json!(origin_city_id)
                && r["destination_city_id"] == json!(destination_city_id)
        }))
    }

    async fn list_route_codes(&self) -> Result<Vec<String>, RepoError> {
        Ok(self
            .0
            .routes
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| r["code"].as_str().map(String::from))
            .collect())
    }

    async fn get_route(&self, id: Uuid) -> Result<Option<Value>, RepoError> {
        Ok(self
            .0
            .routes
            .lock()
            .unwrap()
            .iter()
            .find(|r| id_of(r) == id.to_string())
            .cloned())
    }

    async fn list_routes(&self) -> Result<Vec<Value>, RepoError> {
        Ok(self.0.routes.lock().unwrap().clone())
    }

    async fn create_flight(&self, flight: &Value) -> Result<Uuid, RepoError> {
        let id = Uuid::new_v4();
        let mut row = flight.clone();
        row["id"] = json!(id);
        self.0.flights.lock().unwrap().push(row);
        Ok(id)
    }

    async fn get_flight(&self, id: Uuid) -> Result<Option<Value>, RepoError> {
        Ok(self
            .0
            .flights
            .lock()
            .unwrap()
            .iter()
            .find(|f| id_of(f) == id.to_string())
            .cloned())
    }

    async fn list_flights(
        &self,
        route_id: Option<Uuid>,
        date: Option<&str>,
    ) -> Result<Vec<Value>, RepoError> {
        Ok(self
            .0
            .flights
            .lock()
            .unwrap()
            .iter()
            .filter(|f| route_id.map(|r| f["route_id"] == json!(r)).unwrap_or(true))
            .filter(|f| date.map(|d| f["flight_date"] == json!(d)).unwrap_or(true))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SeatRepository for MemRepo {
    async fn provision(&self, flight_id: Uuid, seats: &[Value]) -> Result<u64, RepoError> {
        let mut table = self.0.seats.lock().unwrap();
        if table.iter().any(|s| s["flight_id"] == json!(flight_id)) {
            return Err("already provisioned".into());
        }
        for seat in seats {
            let mut row = seat.clone();
            row["id"] = json!(Uuid::new_v4());
            row["flight_id"] = json!(flight_id);
            row["state"] = json!("DISPONIBLE");
            table.push(row);
        }
        Ok(seats.len() as u64)
    }

    async fn reserve_random(
        &self,
        flight_id: Uuid,
        class: &str,
    ) -> Result<Option<Value>, RepoError> {
        let mut table = self.0.seats.lock().unwrap();
        for seat in table.iter_mut() {
            if seat["flight_id"] == json!(flight_id)
                && seat["class"] == json!(class)
                && seat["state"] == json!("DISPONIBLE")
            {
                seat["state"] = json!("RESERVADO");
                return Ok(Some(seat.clone()));
            }
        }
        Ok(None)
    }

    async fn release(&self, seat_id: Uuid) -> Result<(), RepoError> {
        let mut table = self.0.seats.lock().unwrap();
        if let Some(seat) = table.iter_mut().find(|s| id_of(s) == seat_id.to_string()) {
            seat["state"] = json!("DISPONIBLE");
        }
        Ok(())
    }

    async fn try_transition(
        &self,
        seat_id: Uuid,
        from: &str,
        to: &str,
    ) -> Result<bool, RepoError> {
        let mut table = self.0.seats.lock().unwrap();
        if let Some(seat) = table.iter_mut().find(|s| id_of(s) == seat_id.to_string()) {
            if seat["state"] == json!(from) {
                seat["state"] = json!(to);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn confirm_held(&self, reservation_id: Uuid) -> Result<u64, RepoError> {
        let seat_ids: Vec<String> = self
            .0
            .segments
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s["reservation_id"] == json!(reservation_id))
            .filter_map(|s| s["seat_id"].as_str().map(String::from))
            .collect();

        let mut flipped = 0;
        let mut table = self.0.seats.lock().unwrap();
        for seat in table.iter_mut() {
            if seat_ids.contains(&id_of(seat).to_string()) && seat["state"] == json!("RESERVADO") {
                seat["state"] = json!("OCUPADO");
                flipped += 1;
            }
        }
        Ok(flipped)
    }

    async fn get_seat(&self, seat_id: Uuid) -> Result<Option<Value>, RepoError> {
        Ok(self
            .0
            .seats
            .lock()
            .unwrap()
            .iter()
            .find(|s| id_of(s) == seat_id.to_string())
            .cloned())
    }

    async fn list_for_flight(&self, flight_id: Uuid) -> Result<Vec<Value>, RepoError> {
        Ok(self
            .0
            .seats
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s["flight_id"] == json!(flight_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReservationRepository for MemRepo {
    async fn create_reservation(&self, reservation: &Value) -> Result<Uuid, RepoError> {
        let id = Uuid::new_v4();
        let mut row = reservation.clone();
        row["id"] = json!(id);
        row["state"] = json!("ACTIVA");
        let mut table = self.0.reservations.lock().unwrap();
        if table.iter().any(|r| r["code"] == reservation["code"]) {
            return Err("duplicate code".into());
        }
        table.push(row);
        Ok(id)
    }

    async fn get_reservation(&self, id: Uuid) -> Result<Option<Value>, RepoError> {
        let row = self
            .0
            .reservations
            .lock()
            .unwrap()
            .iter()
            .find(|r| id_of(r) == id.to_string())
            .cloned();

        Ok(row.map(|mut r| {
            let travelers: Vec<Value> = self
                .0
                .travelers
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t["reservation_id"] == json!(id))
                .cloned()
                .collect();
            let segments: Vec<Value> = self
                .0
                .segments
                .lock()
                .unwrap()
                .iter()
                .filter(|s| s["reservation_id"] == json!(id))
                .cloned()
                .collect();
            r["travelers"] = json!(travelers);
            r["segments"] = json!(segments);
            r
        }))
    }

    async fn list_reservations(&self, user_id: Uuid) -> Result<Vec<Value>, RepoError> {
        Ok(self
            .0
            .reservations
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r["user_id"] == json!(user_id))
            .cloned()
            .collect())
    }

    async fn try_update_state(&self, id: Uuid, from: &str, to: &str) -> Result<bool, RepoError> {
        let mut table = self.0.reservations.lock().unwrap();
        if let Some(row) = table.iter_mut().find(|r| id_of(r) == id.to_string()) {
            if row["state"] == json!(from) {
                row["state"] = json!(to);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn list_codes_with_prefix(&self, prefix: &str) -> Result<Vec<String>, RepoError> {
        Ok(self
            .0
            .reservations
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| r["code"].as_str())
            .filter(|c| c.starts_with(prefix))
            .map(String::from)
            .collect())
    }

    async fn add_traveler_with_segments(
        &self,
        reservation_id: Uuid,
        traveler: &Value,
        segments: &[Value],
    ) -> Result<Uuid, RepoError> {
        let traveler_id = Uuid::new_v4();
        let mut row = traveler.clone();
        row["id"] = json!(traveler_id);
        row["reservation_id"] = json!(reservation_id);
        self.0.travelers.lock().unwrap().push(row);

        let mut table = self.0.segments.lock().unwrap();
        for segment in segments {
            let mut seg = segment.clone();
            seg["id"] = json!(Uuid::new_v4());
            seg["reservation_id"] = json!(reservation_id);
            seg["traveler_id"] = json!(traveler_id);
            table.push(seg);
        }
        Ok(traveler_id)
    }

    async fn traveler_booked_on_flight(
        &self,
        flight_id: Uuid,
        document_id: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<bool, RepoError> {
        let reservations = self.0.reservations.lock().unwrap();
        let travelers = self.0.travelers.lock().unwrap();

        Ok(travelers.iter().any(|t| {
            let reservation = reservations
                .iter()
                .find(|r| r["id"] == t["reservation_id"]);
            let on_flight = reservation
                .map(|r| {
                    r["state"] != json!("CANCELADA")
                        && (r["outbound_flight_id"] == json!(flight_id)
                            || r["return_flight_id"] == json!(flight_id))
                })
                .unwrap_or(false);

            let same_doc = t["document_id"].as_str().map(str::trim)
                == Some(document_id.trim());
            let same_name = t["first_name"].as_str().unwrap_or_default().trim().to_lowercase()
                == first_name.trim().to_lowercase()
                && t["last_name"].as_str().unwrap_or_default().trim().to_lowercase()
                    == last_name.trim().to_lowercase();

            on_flight && (same_doc || same_name)
        }))
    }

    async fn get_segment(&self, segment_id: Uuid) -> Result<Option<Value>, RepoError> {
        let segment = self
            .0
            .segments
            .lock()
            .unwrap()
            .iter()
            .find(|s| id_of(s) == segment_id.to_string())
            .cloned();

        Ok(segment.map(|mut s| {
            let reservations = self.0.reservations.lock().unwrap();
            if let Some(r) = reservations.iter().find(|r| r["id"] == s["reservation_id"]) {
                s["reservation_state"] = r["state"].clone();
                s["reservation_class"] = r["class"].clone();
                s["reservation_user_id"] = r["user_id"].clone();
            }
            s
        }))
    }

    async fn update_segment_seat(&self, segment_id: Uuid, seat_id: Uuid) -> Result<(), RepoError> {
        let mut table = self.0.segments.lock().unwrap();
        if let Some(segment) = table.iter_mut().find(|s| id_of(s) == segment_id.to_string()) {
            segment["seat_id"] = json!(seat_id);
        }
        Ok(())
    }

    async fn seat_ids_for_reservation(&self, id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        Ok(self
            .0
            .segments
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s["reservation_id"] == json!(id))
            .filter_map(|s| s["seat_id"].as_str())
            .filter_map(|s| Uuid::parse_str(s).ok())
            .collect())
    }

    async fn list_expired_active(&self, now: DateTime<Utc>) -> Result<Vec<Value>, RepoError> {
        Ok(self
            .0
            .reservations
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                r["state"] == json!("ACTIVA")
                    && r["expires_at"]
                        .as_str()
                        .and_then(|s| s.parse::<DateTime<Utc>>().ok())
                        .map(|deadline| deadline <= now)
                        .unwrap_or(false)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TicketRepository for MemRepo {
    async fn create_purchase_with_tickets(
        &self,
        purchase: &Value,
        tickets: &[Value],
    ) -> Result<Uuid, RepoError> {
        let purchase_id = Uuid::new_v4();
        let mut row = purchase.clone();
        row["id"] = json!(purchase_id);
        self.0.purchases.lock().unwrap().push(row);

        let mut table = self.0.tickets.lock().unwrap();
        for ticket in tickets {
            let mut t = ticket.clone();
            t["id"] = json!(Uuid::new_v4());
            t["purchase_id"] = json!(purchase_id);
            t["reservation_id"] = purchase["reservation_id"].clone();
            t["checked_in"] = json!(false);
            table.push(t);
        }
        Ok(purchase_id)
    }

    async fn list_tickets_for_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Vec<Value>, RepoError> {
        Ok(self
            .0
            .tickets
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t["reservation_id"] == json!(reservation_id))
            .cloned()
            .collect())
    }

    async fn get_ticket(&self, ticket_id: Uuid) -> Result<Option<Value>, RepoError> {
        Ok(self
            .0
            .tickets
            .lock()
            .unwrap()
            .iter()
            .find(|t| id_of(t) == ticket_id.to_string())
            .cloned())
    }

    async fn set_checked_in(&self, ticket_id: Uuid, checked_in: bool) -> Result<bool, RepoError> {
        let mut table = self.0.tickets.lock().unwrap();
        if let Some(ticket) = table.iter_mut().find(|t| id_of(t) == ticket_id.to_string()) {
            ticket["checked_in"] = json!(checked_in);
            return Ok(true);
        }
        Ok(false)
    }

    async fn traveler_ticketed_on_flight(
        &self,
        flight_id: Uuid,
        document_id: &str,
    ) -> Result<bool, RepoError> {
        let tickets = self.0.tickets.lock().unwrap();
        let travelers = self.0.travelers.lock().unwrap();
        Ok(tickets.iter().any(|t| {
            t["flight_id"] == json!(flight_id)
                && travelers
                    .iter()
                    .any(|tr| tr["id"] == t["traveler_id"] && tr["document_id"] == json!(document_id))
        }))
    }

    async fn create_card(&self, card: &Value) -> Result<Uuid, RepoError> {
        let id = Uuid::new_v4();
        let mut row = card.clone();
        row["id"] = json!(id);
        self.0.cards.lock().unwrap().push(row);
        Ok(id)
    }

    async fn list_cards(&self, user_id: Uuid) -> Result<Vec<Value>, RepoError> {
        Ok(self
            .0
            .cards
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c["user_id"] == json!(user_id.to_string()))
            .cloned()
            .collect())
    }

    async fn adjust_card_balance(&self, card_id: Uuid, delta: i64) -> Result<bool, RepoError> {
        let mut table = self.0.cards.lock().unwrap();
        if let Some(card) = table.iter_mut().find(|c| id_of(c) == card_id.to_string()) {
            let balance = card["balance"].as_i64().unwrap_or(0);
            if balance + delta < 0 {
                return Ok(false);
            }
            card["balance"] = json!(balance + delta);
            return Ok(true);
        }
        Ok(false)
    }
}

#[async_trait]
impl UserRepository for MemRepo {
    async fn create_user(&self, user: &Value) -> Result<Uuid, RepoError> {
        let id = Uuid::new_v4();
        let mut row = user.clone();
        row["id"] = json!(id);
        row["created_at"] = json!(Utc::now().to_rfc3339());
        self.0.users.lock().unwrap().push(row);
        Ok(id)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Value>, RepoError> {
        Ok(self
            .0
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u["email"] == json!(email))
            .cloned())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<Value>, RepoError> {
        Ok(self
            .0
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| id_of(u) == id.to_string())
            .cloned())
    }

    async fn store_reset_pin(
        &self,
        email: &str,
        pin: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepoError> {
        self.0
            .pins
            .lock()
            .unwrap()
            .insert(email.to_string(), (pin.to_string(), expires_at));
        Ok(())
    }

    async fn take_reset_pin(&self, email: &str, pin: &str) -> Result<bool, RepoError> {
        let mut pins = self.0.pins.lock().unwrap();
        if let Some((stored, expires_at)) = pins.get(email) {
            if stored == pin && *expires_at > Utc::now() {
                pins.remove(email);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn update_password(&self, email: &str, password_hash: &str) -> Result<(), RepoError> {
        let mut users = self.0.users.lock().unwrap();
        if let Some(user) = users.iter_mut().find(|u| u["email"] == json!(email)) {
            user["password_hash"] = json!(password_hash);
        }
        Ok(())
    }
}

fn test_app() -> Router {
    let repo = MemRepo(Arc::new(MemStore::default()));
    let state = AppState {
        catalog: Arc::new(repo.clone()),
        seats: Arc::new(repo.clone()),
        reservations: Arc::new(repo.clone()),
        tickets: Arc::new(repo.clone()),
        users: Arc::new(repo),
        payment: Arc::new(MockPaymentAdapter),
        notifier: Arc::new(LogDispatcher),
        auth: AuthConfig {
            secret: SECRET.to_string(),
            expiration: 3600,
        },
        business_rules: BusinessRules {
            reservation_ttl_hours: 24,
            expiry_sweep_seconds: 300,
            reset_pin_ttl_seconds: 900,
            currency: "COP".to_string(),
        },
    };
    volara_api::app(state)
}

fn admin_token() -> String {
    let claims = Claims {
        sub: Uuid::new_v4().to_string(),
        email: "admin@volara.test".to_string(),
        role: "ADMIN".to_string(),
        exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

async fn call(
    app: &Router,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = builder
        .body(match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

/// Admin seeds the catalog; a customer registers, books, pays and moves seat.
#[tokio::test]
async fn test_booking_flow_end_to_end() {
    let app = test_app();
    let admin = admin_token();

    // Register + login a customer.
    let (status, body) = call(
        &app,
        "POST",
        "/v1/auth/register",
        None,
        Some(json!({
            "email": "ana@example.com",
            "password": "hunter2hunter2",
            "first_name": "Ana",
            "last_name": "Moreno",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let customer = body["token"].as_str().unwrap().to_string();

    // Catalog: two cities, one route pair, one flight.
    let (status, bogota) = call(
        &app,
        "POST",
        "/v1/admin/cities",
        Some(&admin),
        Some(json!({ "name": "Bogota" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, medellin) = call(
        &app,
        "POST",
        "/v1/admin/cities",
        Some(&admin),
        Some(json!({ "name": "Medellin" })),
    )
    .await;

    let (status, route) = call(
        &app,
        "POST",
        "/v1/admin/routes",
        Some(&admin),
        Some(json!({
            "origin_city_id": bogota["id"],
            "destination_city_id": medellin["id"],
            "domestic": true,
            "price_first": 900_000,
            "price_economy": 300_000,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(route["outbound_code"], "AP001");
    assert_eq!(route["mirror_code"], "AP002");

    // The same pair again is rejected.
    let (status, _) = call(
        &app,
        "POST",
        "/v1/admin/routes",
        Some(&admin),
        Some(json!({
            "origin_city_id": bogota["id"],
            "destination_city_id": medellin["id"],
            "domestic": true,
            "price_first": 1,
            "price_economy": 1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, flight) = call(
        &app,
        "POST",
        "/v1/admin/flights",
        Some(&admin),
        Some(json!({
            "route_id": route["outbound_id"],
            "flight_date": "2026-09-20",
            "departure_time": "08:30:00",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(flight["seats_provisioned"], 114);
    let flight_id = flight["id"].as_str().unwrap().to_string();

    // Customer books one economy seat, one-way.
    let (status, reservation) = call(
        &app,
        "POST",
        "/v1/reservations",
        Some(&customer),
        Some(json!({
            "outbound_flight_id": flight_id,
            "return_flight_id": null,
            "trip_type": "SOLOIDA",
            "class": "SEGUNDACLASE",
            "traveler_count": 1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(reservation["code"]
        .as_str()
        .unwrap()
        .starts_with("RES-"));
    assert_eq!(reservation["total"], 300_000);
    let reservation_id = reservation["id"].as_str().unwrap().to_string();

    let (status, traveler) = call(
        &app,
        "POST",
        &format!("/v1/reservations/{}/travelers", reservation_id),
        Some(&customer),
        Some(json!({
            "document_id": "CC-1001",
            "first_name": "Ana",
            "last_name": "Moreno",
            "birth_date": "1992-05-01",
            "email": "ana@example.com",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let segment_id = traveler["segments"][0]["id"].as_str().map(String::from);

    // Same person on the same flight is rejected, even from a fresh reservation.
    let (status, _) = call(
        &app,
        "POST",
        &format!("/v1/reservations/{}/travelers", reservation_id),
        Some(&customer),
        Some(json!({
            "document_id": "CC-1001",
            "first_name": "Ana",
            "last_name": "Moreno",
            "birth_date": "1992-05-01",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Seat changes are refused pre-payment.
    let (_, snapshot) = call(
        &app,
        "GET",
        &format!("/v1/reservations/{}", reservation_id),
        Some(&customer),
        None,
    )
    .await;
    let segment_id = segment_id
        .or_else(|| snapshot["segments"][0]["id"].as_str().map(String::from))
        .unwrap();
    let (status, check) = call(
        &app,
        "GET",
        &format!("/v1/segments/{}/can-change-seat", segment_id),
        Some(&customer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(check["allowed"], false);
    assert_eq!(check["reason"], "NOT_PAID");

    // Checkout, then pay.
    let (status, session) = call(
        &app,
        "POST",
        &format!("/v1/reservations/{}/checkout", reservation_id),
        Some(&customer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let session_id = session["id"].as_str().unwrap().to_string();

    let (status, paid) = call(
        &app,
        "POST",
        &format!("/v1/reservations/{}/pay", reservation_id),
        Some(&customer),
        Some(json!({ "session_id": session_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["state"], "PAGADA");
    assert_eq!(paid["tickets_issued"], 1);

    // Paying twice is a conflict.
    let (status, _) = call(
        &app,
        "POST",
        &format!("/v1/reservations/{}/pay", reservation_id),
        Some(&customer),
        Some(json!({ "session_id": format!("mock_cs_{}", Uuid::new_v4().simple()) })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // The held seat is now occupied.
    let (_, seats) = call(
        &app,
        "GET",
        &format!("/v1/flights/{}/seats", flight_id),
        None,
        None,
    )
    .await;
    let occupied = seats["seats"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|s| s["state"] == "OCUPADO")
        .count();
    assert_eq!(occupied, 1);

    // Now a seat change works, onto a free economy seat.
    let target = seats["seats"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["class"] == "SEGUNDACLASE" && s["state"] == "DISPONIBLE")
        .unwrap();
    let (status, moved) = call(
        &app,
        "POST",
        &format!("/v1/segments/{}/change-seat", segment_id),
        Some(&customer),
        Some(json!({ "seat_id": target["id"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["seat_id"], target["id"]);

    // A first-class target is refused for an economy reservation.
    let first_class = seats["seats"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["class"] == "PRIMERACLASE")
        .unwrap();
    let (status, _) = call(
        &app,
        "POST",
        &format!("/v1/segments/{}/change-seat", segment_id),
        Some(&customer),
        Some(json!({ "seat_id": first_class["id"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Tickets are listed and check in.
    let (status, tickets) = call(
        &app,
        "GET",
        &format!("/v1/reservations/{}/tickets", reservation_id),
        Some(&customer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let ticket_id = tickets["tickets"][0]["id"].as_str().unwrap();
    let (status, checked) = call(
        &app,
        "POST",
        &format!("/v1/tickets/{}/check-in", ticket_id),
        Some(&customer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(checked["checked_in"], true);

    // Another customer cannot check in someone else's ticket.
    let (_, body) = call(
        &app,
        "POST",
        "/v1/auth/register",
        None,
        Some(json!({
            "email": "luis@example.com",
            "password": "hunter2hunter2",
            "first_name": "Luis",
            "last_name": "Parra",
        })),
    )
    .await;
    let stranger = body["token"].as_str().unwrap().to_string();
    let (status, _) = call(
        &app,
        "POST",
        &format!("/v1/tickets/{}/check-in", ticket_id),
        Some(&stranger),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_endpoints_reject_customers() {
    let app = test_app();

    let (_, body) = call(
        &app,
        "POST",
        "/v1/auth/register",
        None,
        Some(json!({
            "email": "eve@example.com",
            "password": "hunter2hunter2",
            "first_name": "Eve",
            "last_name": "Diaz",
        })),
    )
    .await;
    let customer = body["token"].as_str().unwrap().to_string();

    let (status, _) = call(
        &app,
        "POST",
        "/v1/admin/cities",
        Some(&customer),
        Some(json!({ "name": "Cali" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&app, "GET", "/v1/reservations", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_password_reset_flow() {
    // Keep a handle on the backing store so the test can read the stored PIN.
    let store = MemRepo(Arc::new(MemStore::default()));
    let state = AppState {
        catalog: Arc::new(store.clone()),
        seats: Arc::new(store.clone()),
        reservations: Arc::new(store.clone()),
        tickets: Arc::new(store.clone()),
        users: Arc::new(store.clone()),
        payment: Arc::new(MockPaymentAdapter),
        notifier: Arc::new(LogDispatcher),
        auth: AuthConfig {
            secret: SECRET.to_string(),
            expiration: 3600,
        },
        business_rules: BusinessRules {
            reservation_ttl_hours: 24,
            expiry_sweep_seconds: 300,
            reset_pin_ttl_seconds: 900,
            currency: "COP".to_string(),
        },
    };
    let app = volara_api::app(state);

    let (status, _) = call(
        &app,
        "POST",
        "/v1/auth/register",
        None,
        Some(json!({
            "email": "luis@example.com",
            "password": "originalpass1",
            "first_name": "Luis",
            "last_name": "Prado",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
        &app,
        "POST",
        "/v1/auth/forgot-password",
        None,
        Some(json!({ "email": "luis@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let pin = store
        .0
        .pins
        .lock()
        .unwrap()
        .get("luis@example.com")
        .map(|(pin, _)| pin.clone())
        .unwrap();

    // Wrong PIN is rejected, right PIN resets the password.
    let (status, _) = call(
        &app,
        "POST",
        "/v1/auth/reset-password",
        None,
        Some(json!({
            "email": "luis@example.com",
            "pin": "000000x",
            "new_password": "freshpassword9",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(
        &app,
        "POST",
        "/v1/auth/reset-password",
        None,
        Some(json!({
            "email": "luis@example.com",
            "pin": pin,
            "new_password": "freshpassword9",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
        &app,
        "POST",
        "/v1/auth/login",
        None,
        Some(json!({ "email": "luis@example.com", "password": "freshpassword9" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
        &app,
        "POST",
        "/v1/auth/login",
        None,
        Some(json!({ "email": "luis@example.com", "password": "originalpass1" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
