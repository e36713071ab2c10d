use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};
use volara_catalog::codes;
use volara_catalog::seat_map::SeatMapTemplate;

const CODE_ALLOC_ATTEMPTS: usize = 5;

#[derive(Debug, Deserialize)]
struct CreateCityRequest {
    name: String,
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateRouteRequest {
    origin_city_id: Uuid,
    destination_city_id: Uuid,
    domestic: bool,
    price_first: i64,
    price_economy: i64,
}

#[derive(Debug, Deserialize)]
struct CreateFlightRequest {
    route_id: Uuid,
    flight_date: String,
    departure_time: String,
    #[serde(default)]
    promotion_pct: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct FlightFilter {
    route_id: Option<Uuid>,
    date: Option<String>,
}

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/cities", get(list_cities))
        .route("/v1/routes", get(list_routes))
        .route("/v1/flights", get(list_flights))
        .route("/v1/flights/{id}", get(get_flight))
        .route("/v1/flights/{id}/seats", get(list_seats))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/cities", post(create_city))
        .route("/v1/admin/routes", post(create_route))
        .route("/v1/admin/flights", post(create_flight))
}

async fn create_city(
    State(state): State<AppState>,
    Json(req): Json<CreateCityRequest>,
) -> Result<Json<Value>, AppError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::ValidationError("City name is required".to_string()));
    }

    let id = state
        .catalog
        .create_city(&json!({ "name": name, "country": req.country }))
        .await
        .map_err(|e| {
            if volara_store::is_unique_violation(e.as_ref()) {
                AppError::ConflictError("City already exists".to_string())
            } else {
                AppError::InternalServerError(e.to_string())
            }
        })?;

    Ok(Json(json!({ "id": id })))
}

async fn list_cities(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let cities = state.catalog.list_cities().await?;
    Ok(Json(json!({ "cities": cities })))
}

/// Creating a route always creates its mirror in the same transaction, so
/// the catalog only ever holds two-way city pairs. Code allocation scans the
/// persisted codes and retries when a concurrent insert wins the candidate.
async fn create_route(
    State(state): State<AppState>,
    Json(req): Json<CreateRouteRequest>,
) -> Result<Json<Value>, AppError> {
    if req.origin_city_id == req.destination_city_id {
        return Err(AppError::ValidationError(
            "Origin and destination must differ".to_string(),
        ));
    }

    let exists = state
        .catalog
        .route_pair_exists(req.origin_city_id, req.destination_city_id)
        .await?;
    if exists {
        return Err(AppError::ConflictError(
            "Route pair already exists for these cities".to_string(),
        ));
    }

    for attempt in 0..CODE_ALLOC_ATTEMPTS {
        let existing = state.catalog.list_route_codes().await?;

        let outbound_code = codes::next_route_code(&existing, req.domestic)
            .map_err(|e| AppError::ConflictError(e.to_string()))?;
        let mut with_outbound = existing.clone();
        with_outbound.push(outbound_code.clone());
        let mirror_code = codes::next_route_code(&with_outbound, req.domestic)
            .map_err(|e| AppError::ConflictError(e.to_string()))?;

        let outbound = json!({
            "code": outbound_code,
            "origin_city_id": req.origin_city_id,
            "destination_city_id": req.destination_city_id,
            "domestic": req.domestic,
            "price_first": req.price_first,
            "price_economy": req.price_economy,
        });
        let mirror = json!({
            "code": mirror_code,
            "origin_city_id": req.destination_city_id,
            "destination_city_id": req.origin_city_id,
            "domestic": req.domestic,
            "price_first": req.price_first,
            "price_economy": req.price_economy,
        });

        match state.catalog.create_route_pair(&outbound, &mirror).await {
            Ok((outbound_id, mirror_id)) => {
                info!(
                    "Created route pair {} / {} ({} attempts)",
                    outbound_code,
                    mirror_code,
                    attempt + 1
                );
                return Ok(Json(json!({
                    "outbound_id": outbound_id,
                    "outbound_code": outbound_code,
                    "mirror_id": mirror_id,
                    "mirror_code": mirror_code,
                })));
            }
            Err(e) if volara_store::is_unique_violation(e.as_ref()) => {
                // Either a concurrent allocator took the code or another
                // admin inserted the same city pair. Re-check the pair,
                // then rescan and retry.
                if state
                    .catalog
                    .route_pair_exists(req.origin_city_id, req.destination_city_id)
                    .await?
                {
                    return Err(AppError::ConflictError(
                        "Route pair already exists for these cities".to_string(),
                    ));
                }
                continue;
            }
            Err(e) => return Err(AppError::InternalServerError(e.to_string())),
        }
    }

    Err(AppError::ConflictError(
        "Could not allocate a route code, try again".to_string(),
    ))
}

async fn list_routes(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let routes = state.catalog.list_routes().await?;
    Ok(Json(json!({ "routes": routes })))
}

/// Scheduling a flight provisions its full seat map immediately.
async fn create_flight(
    State(state): State<AppState>,
    Json(req): Json<CreateFlightRequest>,
) -> Result<Json<Value>, AppError> {
    let route = state
        .catalog
        .get_route(req.route_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Route not found".to_string()))?;

    let promotion_pct = req.promotion_pct.unwrap_or(0);
    if !(0..=100).contains(&promotion_pct) {
        return Err(AppError::ValidationError(
            "promotion_pct must be between 0 and 100".to_string(),
        ));
    }

    let flight_id = state
        .catalog
        .create_flight(&json!({
            "route_id": req.route_id,
            "flight_date": req.flight_date,
            "departure_time": req.departure_time,
            "promotion_pct": promotion_pct,
        }))
        .await?;

    let blueprints: Vec<Value> = SeatMapTemplate::standard()
        .blueprints()
        .into_iter()
        .map(|b| {
            json!({
                "label": b.label,
                "row": b.row,
                "column": b.column.to_string(),
                "class": b.class.as_str(),
            })
        })
        .collect();

    let provisioned = state.seats.provision(flight_id, &blueprints).await?;
    info!(
        "Scheduled flight {} on route {} with {} seats",
        flight_id,
        route["code"].as_str().unwrap_or_default(),
        provisioned
    );

    Ok(Json(json!({ "id": flight_id, "seats_provisioned": provisioned })))
}

async fn get_flight(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let flight = state
        .catalog
        .get_flight(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Flight not found".to_string()))?;
    Ok(Json(flight))
}

async fn list_flights(
    State(state): State<AppState>,
    Query(filter): Query<FlightFilter>,
) -> Result<Json<Value>, AppError> {
    let flights = state
        .catalog
        .list_flights(filter.route_id, filter.date.as_deref())
        .await?;
    Ok(Json(json!({ "flights": flights })))
}

async fn list_seats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let seats = state.seats.list_for_flight(id).await?;
    if seats.is_empty() && state.catalog.get_flight(id).await?.is_none() {
        return Err(AppError::NotFoundError("Flight not found".to_string()));
    }
    Ok(Json(json!({ "seats": seats })))
}
