use axum::{
    extract::State,
    routing::post,
    Json, Router,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use volara_core::roles::Role;
use volara_shared::pii::Masked;

use crate::{error::AppError, middleware::auth::Claims, state::AppState};

// Passwords and PINs ride in `Masked` so a stray debug log cannot leak them.
#[derive(Debug, Deserialize)]
struct RegisterRequest {
    email: String,
    password: Masked<String>,
    first_name: String,
    last_name: String,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: Masked<String>,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ForgotPasswordRequest {
    email: String,
}

#[derive(Debug, Deserialize)]
struct ResetPasswordRequest {
    email: String,
    pin: Masked<String>,
    new_password: Masked<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/auth/register", post(register))
        .route("/v1/auth/login", post(login))
        .route("/v1/auth/forgot-password", post(forgot_password))
        .route("/v1/auth/reset-password", post(reset_password))
}

fn issue_token(state: &AppState, user: &serde_json::Value) -> Result<String, AppError> {
    let role = Role::from_ordinal(user["role"].as_i64().unwrap_or(3) as i16)
        .unwrap_or(Role::Customer);

    let claims = Claims {
        sub: user["id"].as_str().unwrap_or_default().to_string(),
        email: user["email"].as_str().unwrap_or_default().to_string(),
        role: role.as_str().to_string(),
        exp: (Utc::now() + Duration::seconds(state.auth.expiration as i64)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.auth.secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::ValidationError("Invalid email".to_string()));
    }
    if req.password.0.len() < 8 {
        return Err(AppError::ValidationError(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    if state.users.find_by_email(&email).await?.is_some() {
        return Err(AppError::ConflictError("Email already registered".to_string()));
    }

    let password_hash = bcrypt::hash(&req.password.0, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let id = state
        .users
        .create_user(&json!({
            "email": email,
            "password_hash": password_hash,
            "first_name": req.first_name,
            "last_name": req.last_name,
            "role": Role::Customer.ordinal(),
        }))
        .await?;

    info!("Registered user {}", id);

    let user = state
        .users
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::InternalServerError("User vanished after insert".to_string()))?;

    let token = issue_token(&state, &user)?;
    Ok(Json(AuthResponse { token }))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = req.email.trim().to_lowercase();

    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::AuthenticationError("Invalid credentials".to_string()))?;

    let hash = user["password_hash"].as_str().unwrap_or_default();
    let valid = bcrypt::verify(&req.password.0, hash)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    if !valid {
        return Err(AppError::AuthenticationError("Invalid credentials".to_string()));
    }

    let token = issue_token(&state, &user)?;
    Ok(Json(AuthResponse { token }))
}

async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let email = req.email.trim().to_lowercase();

    // Respond identically whether or not the account exists, so the
    // endpoint cannot be used to probe for registered emails.
    if state.users.find_by_email(&email).await?.is_some() {
        let pin: String = {
            let mut rng = rand::thread_rng();
            (0..6).map(|_| rng.gen_range(0..10).to_string()).collect()
        };
        let expires_at =
            Utc::now() + Duration::seconds(state.business_rules.reset_pin_ttl_seconds as i64);

        state.users.store_reset_pin(&email, &pin, expires_at).await?;

        if let Err(e) = state.notifier.send_pin(&email, &pin).await {
            tracing::warn!("Failed to dispatch reset PIN: {}", e);
        }
    }

    Ok(Json(json!({ "status": "PIN_SENT" })))
}

async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let email = req.email.trim().to_lowercase();
    if req.new_password.0.len() < 8 {
        return Err(AppError::ValidationError(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let taken = state.users.take_reset_pin(&email, &req.pin.0).await?;
    if !taken {
        return Err(AppError::AuthenticationError(
            "Invalid or expired PIN".to_string(),
        ));
    }

    let password_hash = bcrypt::hash(&req.new_password.0, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    state.users.update_password(&email, &password_hash).await?;

    info!("Password reset completed for {}", email);
    Ok(Json(json!({ "status": "PASSWORD_UPDATED" })))
}
