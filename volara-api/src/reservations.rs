use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{error::AppError, middleware::auth::Claims, state::AppState};
use volara_booking::codes::{day_prefix, next_reservation_code};
use volara_shared::{Leg, ReservationState, TripType};

const CODE_ALLOC_ATTEMPTS: usize = 5;

#[derive(Debug, Deserialize)]
struct CreateReservationRequest {
    outbound_flight_id: Uuid,
    return_flight_id: Option<Uuid>,
    trip_type: TripType,
    class: volara_shared::CabinClass,
    traveler_count: u32,
}

#[derive(Debug, Deserialize)]
struct AddTravelerRequest {
    document_id: String,
    first_name: String,
    last_name: String,
    birth_date: String,
    gender: Option<String>,
    email: Option<String>,
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PayRequest {
    session_id: String,
    card_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct ChangeSeatRequest {
    seat_id: Uuid,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/reservations", post(create_reservation).get(list_reservations))
        .route("/v1/reservations/{id}", get(get_reservation))
        .route("/v1/reservations/{id}/travelers", post(add_traveler))
        .route("/v1/reservations/{id}/checkout", post(start_checkout))
        .route("/v1/reservations/{id}/pay", post(pay_reservation))
        .route("/v1/reservations/{id}/cancel", post(cancel_reservation))
        .route("/v1/segments/{id}/can-change-seat", get(can_change_seat))
        .route("/v1/segments/{id}/change-seat", post(change_seat))
}

fn claims_user_id(claims: &Claims) -> Result<Uuid, AppError> {
    Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::AuthenticationError("Invalid token subject".to_string()))
}

fn is_admin(claims: &Claims) -> bool {
    claims.role == "ADMIN" || claims.role == "ROOT"
}

fn assert_owner(claims: &Claims, reservation: &Value) -> Result<(), AppError> {
    let owner = reservation["user_id"].as_str().unwrap_or_default();
    if owner != claims.sub && !is_admin(claims) {
        return Err(AppError::AuthorizationError(
            "Reservation does not belong to you".to_string(),
        ));
    }
    Ok(())
}

fn is_expired(reservation: &Value) -> bool {
    reservation["expires_at"]
        .as_str()
        .and_then(|s| s.parse::<DateTime<Utc>>().ok())
        .map(|deadline| Utc::now() >= deadline)
        .unwrap_or(false)
}

/// Per-traveler leg price: the route's class price with the flight's
/// promotion percentage applied.
async fn leg_price(
    state: &AppState,
    flight_id: Uuid,
    class: volara_shared::CabinClass,
) -> Result<i64, AppError> {
    let flight = state
        .catalog
        .get_flight(flight_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Flight not found".to_string()))?;
    let route_id = Uuid::parse_str(flight["route_id"].as_str().unwrap_or_default())
        .map_err(|_| AppError::InternalServerError("Flight has no route".to_string()))?;
    let route = state
        .catalog
        .get_route(route_id)
        .await?
        .ok_or_else(|| AppError::InternalServerError("Route vanished".to_string()))?;

    let base = match class {
        volara_shared::CabinClass::First => route["price_first"].as_i64().unwrap_or(0),
        volara_shared::CabinClass::Economy => route["price_economy"].as_i64().unwrap_or(0),
    };
    let promo = flight["promotion_pct"].as_i64().unwrap_or(0).clamp(0, 100);
    Ok(base * (100 - promo) / 100)
}

async fn create_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateReservationRequest>,
) -> Result<Json<Value>, AppError> {
    let user_id = claims_user_id(&claims)?;

    if req.traveler_count < 1 {
        return Err(AppError::ValidationError(
            "traveler_count must be at least 1".to_string(),
        ));
    }
    match (req.trip_type, req.return_flight_id) {
        (TripType::RoundTrip, None) => {
            return Err(AppError::ValidationError(
                "Round trip requires a return flight".to_string(),
            ));
        }
        (TripType::OneWay, Some(_)) => {
            return Err(AppError::ValidationError(
                "One-way trip cannot have a return flight".to_string(),
            ));
        }
        _ => {}
    }

    let mut total = leg_price(&state, req.outbound_flight_id, req.class).await?;
    if let Some(return_id) = req.return_flight_id {
        if return_id == req.outbound_flight_id {
            return Err(AppError::ValidationError(
                "Return flight must differ from the outbound".to_string(),
            ));
        }
        total += leg_price(&state, return_id, req.class).await?;
    }
    total *= req.traveler_count as i64;

    let now = Utc::now();
    let expires_at = now + Duration::hours(state.business_rules.reservation_ttl_hours as i64);
    let today = now.date_naive();

    for attempt in 0..CODE_ALLOC_ATTEMPTS {
        let prefix = day_prefix(today);
        let existing = state.reservations.list_codes_with_prefix(&prefix).await?;
        let code = next_reservation_code(&existing, today)
            .map_err(|e| AppError::ConflictError(e.to_string()))?;

        let snapshot = json!({
            "code": code,
            "user_id": user_id,
            "class": req.class.as_str(),
            "trip_type": req.trip_type.as_str(),
            "traveler_count": req.traveler_count,
            "total": total,
            "outbound_flight_id": req.outbound_flight_id,
            "return_flight_id": req.return_flight_id,
            "created_at": now.to_rfc3339(),
            "expires_at": expires_at.to_rfc3339(),
        });

        match state.reservations.create_reservation(&snapshot).await {
            Ok(id) => {
                info!("Created reservation {} ({}, {} attempts)", id, code, attempt + 1);
                return Ok(Json(json!({
                    "id": id,
                    "code": code,
                    "total": total,
                    "expires_at": expires_at.to_rfc3339(),
                })));
            }
            Err(e) if volara_store::is_unique_violation(e.as_ref()) => continue,
            Err(e) => return Err(AppError::InternalServerError(e.to_string())),
        }
    }

    Err(AppError::ConflictError(
        "Could not allocate a reservation code, try again".to_string(),
    ))
}

async fn get_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let reservation = state
        .reservations
        .get_reservation(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Reservation not found".to_string()))?;
    assert_owner(&claims, &reservation)?;
    Ok(Json(reservation))
}

async fn list_reservations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Value>, AppError> {
    let user_id = claims_user_id(&claims)?;
    let reservations = state.reservations.list_reservations(user_id).await?;
    Ok(Json(json!({ "reservations": reservations })))
}

/// Adding a traveler draws a random held seat per leg. If the return draw
/// comes up empty the outbound hold is released before the error surfaces,
/// so a failed add never leaks a seat.
async fn add_traveler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddTravelerRequest>,
) -> Result<Json<Value>, AppError> {
    let reservation = state
        .reservations
        .get_reservation(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Reservation not found".to_string()))?;
    assert_owner(&claims, &reservation)?;

    if reservation["state"].as_str() != Some(ReservationState::Active.as_str()) {
        return Err(AppError::ConflictError(
            "Travelers can only be added to an active reservation".to_string(),
        ));
    }
    if is_expired(&reservation) {
        return Err(AppError::ConflictError("Reservation has expired".to_string()));
    }

    let document_id = req.document_id.trim();
    let first_name = req.first_name.trim();
    let last_name = req.last_name.trim();
    if document_id.is_empty() || first_name.is_empty() || last_name.is_empty() {
        return Err(AppError::ValidationError(
            "document_id, first_name and last_name are required".to_string(),
        ));
    }

    let class: volara_shared::CabinClass = reservation["class"]
        .as_str()
        .unwrap_or_default()
        .parse()
        .map_err(|e: String| AppError::InternalServerError(e))?;
    let outbound_flight_id =
        Uuid::parse_str(reservation["outbound_flight_id"].as_str().unwrap_or_default())
            .map_err(|_| AppError::InternalServerError("Corrupt reservation".to_string()))?;
    let return_flight_id = reservation["return_flight_id"]
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok());

    // One person per flight, across all non-cancelled reservations.
    let mut flights = vec![outbound_flight_id];
    flights.extend(return_flight_id);
    for flight_id in &flights {
        let duplicate = state
            .reservations
            .traveler_booked_on_flight(*flight_id, document_id, first_name, last_name)
            .await?;
        if duplicate {
            return Err(AppError::ConflictError(
                "This person already holds a booking on the flight".to_string(),
            ));
        }
        let ticketed = state
            .tickets
            .traveler_ticketed_on_flight(*flight_id, document_id)
            .await?;
        if ticketed {
            return Err(AppError::ConflictError(
                "This person already holds a ticket on the flight".to_string(),
            ));
        }
    }

    // Checked after the duplicate guard: re-adding a known person reports
    // the conflict even when the reservation is already full.
    let booked = reservation["travelers"].as_array().map(|t| t.len()).unwrap_or(0);
    let capacity = reservation["traveler_count"].as_i64().unwrap_or(1) as usize;
    if booked >= capacity {
        return Err(AppError::ValidationError(
            "Reservation already has its full traveler count".to_string(),
        ));
    }

    let outbound_seat = state
        .seats
        .reserve_random(outbound_flight_id, class.as_str())
        .await?
        .ok_or_else(|| {
            AppError::ConflictError("No seats available on the outbound flight".to_string())
        })?;
    let outbound_seat_id =
        Uuid::parse_str(outbound_seat["id"].as_str().unwrap_or_default())
            .map_err(|_| AppError::InternalServerError("Corrupt seat row".to_string()))?;

    let mut segments = vec![json!({
        "flight_id": outbound_flight_id,
        "seat_id": outbound_seat_id,
        "leg": Leg::Outbound.as_str(),
    })];

    let mut return_seat_id = None;
    if let Some(return_flight) = return_flight_id {
        match state.seats.reserve_random(return_flight, class.as_str()).await {
            Ok(Some(seat)) => {
                let seat_id = Uuid::parse_str(seat["id"].as_str().unwrap_or_default())
                    .map_err(|_| AppError::InternalServerError("Corrupt seat row".to_string()))?;
                return_seat_id = Some(seat_id);
                segments.push(json!({
                    "flight_id": return_flight,
                    "seat_id": seat_id,
                    "leg": Leg::Return.as_str(),
                }));
            }
            Ok(None) => {
                state.seats.release(outbound_seat_id).await?;
                return Err(AppError::ConflictError(
                    "No seats available on the return flight".to_string(),
                ));
            }
            Err(e) => {
                state.seats.release(outbound_seat_id).await?;
                return Err(AppError::InternalServerError(e.to_string()));
            }
        }
    }

    let traveler = json!({
        "user_id": reservation["user_id"],
        "document_id": document_id,
        "first_name": first_name,
        "last_name": last_name,
        "birth_date": req.birth_date,
        "gender": req.gender,
        "email": req.email,
        "phone": req.phone,
    });

    match state
        .reservations
        .add_traveler_with_segments(id, &traveler, &segments)
        .await
    {
        Ok(traveler_id) => {
            info!("Added traveler {} to reservation {}", traveler_id, id);
            Ok(Json(json!({
                "traveler_id": traveler_id,
                "segments": segments,
            })))
        }
        Err(e) => {
            // Roll the holds back before surfacing the failure.
            state.seats.release(outbound_seat_id).await?;
            if let Some(seat_id) = return_seat_id {
                state.seats.release(seat_id).await?;
            }
            Err(AppError::InternalServerError(e.to_string()))
        }
    }
}

async fn start_checkout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let reservation = state
        .reservations
        .get_reservation(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Reservation not found".to_string()))?;
    assert_owner(&claims, &reservation)?;

    if reservation["state"].as_str() != Some(ReservationState::Active.as_str()) {
        return Err(AppError::ConflictError(
            "Only active reservations can be checked out".to_string(),
        ));
    }
    if is_expired(&reservation) {
        return Err(AppError::ConflictError("Reservation has expired".to_string()));
    }
    if reservation["travelers"].as_array().map(|t| t.is_empty()).unwrap_or(true) {
        return Err(AppError::ValidationError(
            "Add at least one traveler before checkout".to_string(),
        ));
    }

    let total = reservation["total"].as_i64().unwrap_or(0);
    let session = state
        .payment
        .create_session(id, total, &state.business_rules.currency)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(Json(serde_json::to_value(session)?))
}

/// The PAGADA transition is the point of no return: once the conditional
/// state update lands, seat confirmation and ticket issuance follow, and a
/// notification failure is logged rather than rolled back.
async fn pay_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<PayRequest>,
) -> Result<Json<Value>, AppError> {
    let reservation = state
        .reservations
        .get_reservation(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Reservation not found".to_string()))?;
    assert_owner(&claims, &reservation)?;

    if reservation["state"].as_str() != Some(ReservationState::Active.as_str()) {
        return Err(AppError::ConflictError(
            "Only active reservations can be paid".to_string(),
        ));
    }
    if is_expired(&reservation) {
        return Err(AppError::ConflictError("Reservation has expired".to_string()));
    }

    let status = state
        .payment
        .verify_session(&req.session_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    if status != volara_core::payment::PaymentStatus::Succeeded {
        return Err(AppError::ConflictError(format!(
            "Payment session is not settled ({:?})",
            status
        )));
    }

    let total = reservation["total"].as_i64().unwrap_or(0);

    if let Some(card_id) = req.card_id {
        let debited = state.tickets.adjust_card_balance(card_id, -total).await?;
        if !debited {
            return Err(AppError::ConflictError(
                "Insufficient card balance".to_string(),
            ));
        }
    }

    let flipped = state
        .reservations
        .try_update_state(
            id,
            ReservationState::Active.as_str(),
            ReservationState::Paid.as_str(),
        )
        .await?;
    if !flipped {
        // Someone else settled or cancelled it first; give the money back.
        if let Some(card_id) = req.card_id {
            let _ = state.tickets.adjust_card_balance(card_id, total).await;
        }
        return Err(AppError::ConflictError(
            "Reservation is no longer active".to_string(),
        ));
    }

    let confirmed = state.seats.confirm_held(id).await?;
    info!("Reservation {} paid, {} seats confirmed", id, confirmed);

    let tickets: Vec<Value> = reservation["segments"]
        .as_array()
        .map(|segments| {
            segments
                .iter()
                .map(|s| {
                    json!({
                        "traveler_id": s["traveler_id"],
                        "flight_id": s["flight_id"],
                        "seat_id": s["seat_id"],
                        "leg": s["leg"],
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let purchase = json!({
        "reservation_id": id,
        "user_id": reservation["user_id"],
        "card_id": req.card_id,
        "amount": total,
        "currency": state.business_rules.currency,
        "session_id": req.session_id,
    });
    let purchase_id = state
        .tickets
        .create_purchase_with_tickets(&purchase, &tickets)
        .await?;

    let traveler_emails: Vec<String> = reservation["travelers"]
        .as_array()
        .map(|travelers| {
            travelers
                .iter()
                .filter_map(|t| t["email"].as_str())
                .map(|e| e.to_string())
                .collect()
        })
        .unwrap_or_default();
    if let Err(e) = state
        .notifier
        .send_purchase_confirmation(&claims.email, &traveler_emails, &reservation)
        .await
    {
        warn!("Purchase notification failed for {}: {}", id, e);
    }

    Ok(Json(json!({
        "purchase_id": purchase_id,
        "state": ReservationState::Paid.as_str(),
        "tickets_issued": tickets.len(),
    })))
}

async fn cancel_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let reservation = state
        .reservations
        .get_reservation(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Reservation not found".to_string()))?;
    assert_owner(&claims, &reservation)?;

    let flipped = state
        .reservations
        .try_update_state(
            id,
            ReservationState::Active.as_str(),
            ReservationState::Cancelled.as_str(),
        )
        .await?;
    if !flipped {
        return Err(AppError::ConflictError(
            "Only active reservations can be cancelled".to_string(),
        ));
    }

    // Segments stay as history; only the seats go back to the pool.
    let seat_ids = state.reservations.seat_ids_for_reservation(id).await?;
    for seat_id in &seat_ids {
        state.seats.release(*seat_id).await?;
    }

    info!("Cancelled reservation {}, released {} seats", id, seat_ids.len());
    Ok(Json(json!({
        "state": ReservationState::Cancelled.as_str(),
        "seats_released": seat_ids.len(),
    })))
}

async fn can_change_seat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let segment = state
        .reservations
        .get_segment(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Segment not found".to_string()))?;
    assert_segment_owner(&claims, &segment)?;

    let paid = segment["reservation_state"].as_str() == Some(ReservationState::Paid.as_str());
    Ok(Json(json!({
        "allowed": paid,
        "reason": if paid { Value::Null } else { Value::from("NOT_PAID") },
    })))
}

fn assert_segment_owner(claims: &Claims, segment: &Value) -> Result<(), AppError> {
    let owner = segment["reservation_user_id"].as_str().unwrap_or_default();
    if owner != claims.sub && !is_admin(claims) {
        return Err(AppError::AuthorizationError(
            "Segment does not belong to you".to_string(),
        ));
    }
    Ok(())
}

/// Seat changes only exist on paid reservations. The target seat is claimed
/// with a conditional DISPONIBLE -> OCUPADO flip before the old one is
/// released, so a race can never strand the traveler without a seat.
async fn change_seat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeSeatRequest>,
) -> Result<Json<Value>, AppError> {
    let segment = state
        .reservations
        .get_segment(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Segment not found".to_string()))?;
    assert_segment_owner(&claims, &segment)?;

    if segment["reservation_state"].as_str() != Some(ReservationState::Paid.as_str()) {
        return Err(AppError::ConflictError(
            "Seat changes require a paid reservation".to_string(),
        ));
    }

    let current_seat_id = Uuid::parse_str(segment["seat_id"].as_str().unwrap_or_default())
        .map_err(|_| AppError::InternalServerError("Corrupt segment".to_string()))?;
    if req.seat_id == current_seat_id {
        return Err(AppError::ValidationError(
            "Already assigned to that seat".to_string(),
        ));
    }

    let target = state
        .seats
        .get_seat(req.seat_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Seat not found".to_string()))?;

    if target["flight_id"] != segment["flight_id"] {
        return Err(AppError::ValidationError(
            "Seat belongs to a different flight".to_string(),
        ));
    }
    if target["class"] != segment["reservation_class"] {
        return Err(AppError::ValidationError(
            "Seat is in a different cabin class".to_string(),
        ));
    }

    let claimed = state
        .seats
        .try_transition(
            req.seat_id,
            volara_shared::SeatState::Available.as_str(),
            volara_shared::SeatState::Occupied.as_str(),
        )
        .await?;
    if !claimed {
        return Err(AppError::ConflictError("Seat is not available".to_string()));
    }

    state.reservations.update_segment_seat(id, req.seat_id).await?;
    state.seats.release(current_seat_id).await?;

    info!(
        "Segment {} moved from seat {} to {}",
        id, current_seat_id, req.seat_id
    );
    Ok(Json(json!({
        "segment_id": id,
        "seat_id": req.seat_id,
        "label": target["label"],
    })))
}
