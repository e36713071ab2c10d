use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::{error::AppError, middleware::auth::Claims, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/reservations/{id}/tickets", get(list_tickets))
        .route("/v1/tickets/{id}/check-in", post(check_in))
}

fn assert_owner(claims: &Claims, reservation: &Value) -> Result<(), AppError> {
    let owner = reservation["user_id"].as_str().unwrap_or_default();
    if owner != claims.sub && claims.role != "ADMIN" && claims.role != "ROOT" {
        return Err(AppError::AuthorizationError(
            "Reservation does not belong to you".to_string(),
        ));
    }
    Ok(())
}

async fn list_tickets(
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

    let tickets = state.tickets.list_tickets_for_reservation(id).await?;
    Ok(Json(json!({ "tickets": tickets })))
}

async fn check_in(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let ticket = state
        .tickets
        .get_ticket(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Ticket not found".to_string()))?;
    let reservation_id = Uuid::parse_str(ticket["reservation_id"].as_str().unwrap_or_default())
        .map_err(|_| AppError::InternalServerError("Corrupt ticket row".to_string()))?;
    let reservation = state
        .reservations
        .get_reservation(reservation_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Reservation not found".to_string()))?;
    assert_owner(&claims, &reservation)?;

    let updated = state.tickets.set_checked_in(id, true).await?;
    if !updated {
        return Err(AppError::NotFoundError("Ticket not found".to_string()));
    }
    info!("Ticket {} checked in", id);
    Ok(Json(json!({ "checked_in": true })))
}
