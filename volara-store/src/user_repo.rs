use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;
use volara_core::repository::UserRepository;

pub struct StoreUserRepository {
    pool: PgPool,
}

impl StoreUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    role: i32,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_json(self) -> Value {
        serde_json::json!({
            "id": self.id,
            "email": self.email,
            "password_hash": self.password_hash,
            "first_name": self.first_name,
            "last_name": self.last_name,
            "role": self.role,
            "created_at": self.created_at.to_rfc3339(),
        })
    }
}

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, role, created_at";

#[async_trait]
impl UserRepository for StoreUserRepository {
    async fn create_user(
        &self,
        user: &Value,
    ) -> Result<Uuid, Box<dyn std::error::Error + Send + Sync>> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, role, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, now())
            "#,
        )
        .bind(id)
        .bind(user["email"].as_str().ok_or("Missing email")?)
        .bind(user["password_hash"].as_str().ok_or("Missing password_hash")?)
        .bind(user["first_name"].as_str().ok_or("Missing first_name")?)
        .bind(user["last_name"].as_str().ok_or("Missing last_name")?)
        .bind(user["role"].as_i64().unwrap_or(3) as i32)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Value>, Box<dyn std::error::Error + Send + Sync>> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserRow::into_json))
    }

    async fn get_user(
        &self,
        id: Uuid,
    ) -> Result<Option<Value>, Box<dyn std::error::Error + Send + Sync>> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserRow::into_json))
    }

    async fn store_reset_pin(
        &self,
        email: &str,
        pin: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query(
            r#"
            INSERT INTO reset_pins (email, pin, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE SET pin = $2, expires_at = $3
            "#,
        )
        .bind(email)
        .bind(pin)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn take_reset_pin(
        &self,
        email: &str,
        pin: &str,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        // Expiry is checked on read; stale rows just fail the match
        // and get overwritten by the next request.
        let result = sqlx::query(
            "DELETE FROM reset_pins WHERE email = $1 AND pin = $2 AND expires_at > now()",
        )
        .bind(email)
        .bind(pin)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_password(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query("UPDATE users SET password_hash = $1 WHERE email = $2")
            .bind(password_hash)
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
