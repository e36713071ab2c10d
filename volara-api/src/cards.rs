use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use volara_shared::pii::Masked;

use crate::{error::AppError, middleware::auth::Claims, state::AppState};

#[derive(Debug, Deserialize)]
struct CreateCardRequest {
    holder_name: String,
    card_number: Masked<String>,
    #[serde(default)]
    balance: i64,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/cards", post(create_card).get(list_cards))
}

/// Only the last four digits are ever stored.
fn mask_card_number(number: &str) -> Option<String> {
    let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
    if !(13..=19).contains(&digits.len()) {
        return None;
    }
    Some(format!("**** **** **** {}", &digits[digits.len() - 4..]))
}

async fn create_card(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateCardRequest>,
) -> Result<Json<Value>, AppError> {
    if req.holder_name.trim().is_empty() {
        return Err(AppError::ValidationError("holder_name is required".to_string()));
    }
    let masked = mask_card_number(&req.card_number.0)
        .ok_or_else(|| AppError::ValidationError("Invalid card number".to_string()))?;
    if req.balance < 0 {
        return Err(AppError::ValidationError("Balance cannot be negative".to_string()));
    }

    let id = state
        .tickets
        .create_card(&json!({
            "user_id": claims.sub,
            "holder_name": req.holder_name.trim(),
            "masked_number": masked,
            "balance": req.balance,
        }))
        .await?;

    Ok(Json(json!({ "id": id, "masked_number": masked })))
}

async fn list_cards(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Value>, AppError> {
    let user_id = uuid::Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::AuthenticationError("Invalid token subject".to_string()))?;
    let cards = state.tickets.list_cards(user_id).await?;
    Ok(Json(json!({ "cards": cards })))
}
