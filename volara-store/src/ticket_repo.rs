use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;
use volara_core::repository::TicketRepository;

pub struct StoreTicketRepository {
    pool: PgPool,
}

impl StoreTicketRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: Uuid,
    purchase_id: Uuid,
    reservation_id: Uuid,
    traveler_id: Uuid,
    flight_id: Uuid,
    seat_id: Uuid,
    leg: String,
    checked_in: bool,
    issued_at: DateTime<Utc>,
}

impl TicketRow {
    fn into_json(self) -> Value {
        serde_json::json!({
            "id": self.id,
            "purchase_id": self.purchase_id,
            "reservation_id": self.reservation_id,
            "traveler_id": self.traveler_id,
            "flight_id": self.flight_id,
            "seat_id": self.seat_id,
            "leg": self.leg,
            "checked_in": self.checked_in,
            "issued_at": self.issued_at.to_rfc3339(),
        })
    }
}

#[derive(sqlx::FromRow)]
struct CardRow {
    id: Uuid,
    user_id: Uuid,
    holder_name: String,
    masked_number: String,
    balance: i64,
}

impl CardRow {
    fn into_json(self) -> Value {
        serde_json::json!({
            "id": self.id,
            "user_id": self.user_id,
            "holder_name": self.holder_name,
            "masked_number": self.masked_number,
            "balance": self.balance,
        })
    }
}

#[async_trait]
impl TicketRepository for StoreTicketRepository {
    async fn create_purchase_with_tickets(
        &self,
        purchase: &Value,
        tickets: &[Value],
    ) -> Result<Uuid, Box<dyn std::error::Error + Send + Sync>> {
        let purchase_id = if let Some(id_str) = purchase["id"].as_str() {
            Uuid::parse_str(id_str)?
        } else {
            Uuid::new_v4()
        };
        let reservation_id = Uuid::parse_str(
            purchase["reservation_id"]
                .as_str()
                .ok_or("Missing reservation_id")?,
        )?;
        let user_id = Uuid::parse_str(purchase["user_id"].as_str().ok_or("Missing user_id")?)?;
        let card_id = match purchase["card_id"].as_str() {
            Some(s) => Some(Uuid::parse_str(s)?),
            None => None,
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO purchases (id, reservation_id, user_id, card_id, amount, currency, session_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, now())
            "#,
        )
        .bind(purchase_id)
        .bind(reservation_id)
        .bind(user_id)
        .bind(card_id)
        .bind(purchase["amount"].as_i64().unwrap_or(0))
        .bind(purchase["currency"].as_str().unwrap_or("COP"))
        .bind(purchase["session_id"].as_str())
        .execute(&mut *tx)
        .await?;

        for ticket in tickets {
            let traveler_id =
                Uuid::parse_str(ticket["traveler_id"].as_str().ok_or("Missing traveler_id")?)?;
            let flight_id =
                Uuid::parse_str(ticket["flight_id"].as_str().ok_or("Missing flight_id")?)?;
            let seat_id = Uuid::parse_str(ticket["seat_id"].as_str().ok_or("Missing seat_id")?)?;

            sqlx::query(
                r#"
                INSERT INTO tickets (id, purchase_id, reservation_id, traveler_id, flight_id, seat_id, leg, checked_in, issued_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, false, now())
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(purchase_id)
            .bind(reservation_id)
            .bind(traveler_id)
            .bind(flight_id)
            .bind(seat_id)
            .bind(ticket["leg"].as_str().ok_or("Missing leg")?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(purchase_id)
    }

    async fn list_tickets_for_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Vec<Value>, Box<dyn std::error::Error + Send + Sync>> {
        let rows: Vec<TicketRow> = sqlx::query_as(
            r#"
            SELECT id, purchase_id, reservation_id, traveler_id, flight_id, seat_id, leg, checked_in, issued_at
            FROM tickets WHERE reservation_id = $1 ORDER BY issued_at
            "#,
        )
        .bind(reservation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TicketRow::into_json).collect())
    }

    async fn get_ticket(
        &self,
        ticket_id: Uuid,
    ) -> Result<Option<Value>, Box<dyn std::error::Error + Send + Sync>> {
        let row: Option<TicketRow> = sqlx::query_as(
            r#"
            SELECT id, purchase_id, reservation_id, traveler_id, flight_id, seat_id, leg, checked_in, issued_at
            FROM tickets WHERE id = $1
            "#,
        )
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(TicketRow::into_json))
    }

    async fn set_checked_in(
        &self,
        ticket_id: Uuid,
        checked_in: bool,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let result = sqlx::query("UPDATE tickets SET checked_in = $1 WHERE id = $2")
            .bind(checked_in)
            .bind(ticket_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn traveler_ticketed_on_flight(
        &self,
        flight_id: Uuid,
        document_id: &str,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM tickets k
            JOIN travelers t ON t.id = k.traveler_id
            WHERE k.flight_id = $1 AND TRIM(t.document_id) = TRIM($2)
            "#,
        )
        .bind(flight_id)
        .bind(document_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn create_card(
        &self,
        card: &Value,
    ) -> Result<Uuid, Box<dyn std::error::Error + Send + Sync>> {
        let id = Uuid::new_v4();
        let user_id = Uuid::parse_str(card["user_id"].as_str().ok_or("Missing user_id")?)?;

        sqlx::query(
            r#"
            INSERT INTO cards (id, user_id, holder_name, masked_number, balance)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(card["holder_name"].as_str().ok_or("Missing holder_name")?)
        .bind(card["masked_number"].as_str().ok_or("Missing masked_number")?)
        .bind(card["balance"].as_i64().unwrap_or(0))
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn list_cards(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Value>, Box<dyn std::error::Error + Send + Sync>> {
        let rows: Vec<CardRow> = sqlx::query_as(
            "SELECT id, user_id, holder_name, masked_number, balance FROM cards WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CardRow::into_json).collect())
    }

    async fn adjust_card_balance(
        &self,
        card_id: Uuid,
        delta: i64,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        // Guarded in the WHERE clause so a debit can never push the
        // balance negative, even under concurrent charges.
        let result = sqlx::query(
            "UPDATE cards SET balance = balance + $1 WHERE id = $2 AND balance + $1 >= 0",
        )
        .bind(delta)
        .bind(card_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
