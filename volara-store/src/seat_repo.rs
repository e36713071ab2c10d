use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;
use volara_core::repository::SeatRepository;

pub struct StoreSeatRepository {
    pool: PgPool,
}

impl StoreSeatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal struct for type-safe querying
#[derive(sqlx::FromRow)]
struct SeatRow {
    id: Uuid,
    flight_id: Uuid,
    label: String,
    seat_row: i32,
    seat_column: String,
    class: String,
    state: String,
}

impl SeatRow {
    fn into_json(self) -> Value {
        serde_json::json!({
            "id": self.id,
            "flight_id": self.flight_id,
            "label": self.label,
            "row": self.seat_row,
            "column": self.seat_column,
            "class": self.class,
            "state": self.state,
        })
    }
}

const SEAT_COLUMNS: &str = "id, flight_id, label, seat_row, seat_column, class, state";

#[async_trait]
impl SeatRepository for StoreSeatRepository {
    async fn provision(
        &self,
        flight_id: Uuid,
        seats: &[Value],
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        let mut tx = self.pool.begin().await?;

        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM seats WHERE flight_id = $1")
                .bind(flight_id)
                .fetch_one(&mut *tx)
                .await?;
        if existing > 0 {
            return Err(format!("flight {} already has seats provisioned", flight_id).into());
        }

        let mut inserted = 0u64;
        for seat in seats {
            let label = seat["label"].as_str().ok_or("Missing seat label")?;
            let row = seat["row"].as_i64().ok_or("Missing seat row")? as i32;
            let column = seat["column"].as_str().ok_or("Missing seat column")?;
            let class = seat["class"].as_str().ok_or("Missing seat class")?;

            sqlx::query(
                r#"
                INSERT INTO seats (id, flight_id, label, seat_row, seat_column, class, state)
                VALUES ($1, $2, $3, $4, $5, $6, 'DISPONIBLE')
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(flight_id)
            .bind(label)
            .bind(row)
            .bind(column)
            .bind(class)
            .execute(&mut *tx)
            .await?;
            inserted += 1;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn reserve_random(
        &self,
        flight_id: Uuid,
        class: &str,
    ) -> Result<Option<Value>, Box<dyn std::error::Error + Send + Sync>> {
        // The candidate is picked and re-validated under a row lock;
        // SKIP LOCKED keeps concurrent bookers from colliding on it.
        let row: Option<SeatRow> = sqlx::query_as(
            r#"
            UPDATE seats SET state = 'RESERVADO'
            WHERE id = (
                SELECT id FROM seats
                WHERE flight_id = $1 AND class = $2 AND state = 'DISPONIBLE'
                ORDER BY random()
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, flight_id, label, seat_row, seat_column, class, state
            "#,
        )
        .bind(flight_id)
        .bind(class)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SeatRow::into_json))
    }

    async fn release(
        &self,
        seat_id: Uuid,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // Idempotent: releasing an already-available seat is a no-op.
        sqlx::query("UPDATE seats SET state = 'DISPONIBLE' WHERE id = $1")
            .bind(seat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn try_transition(
        &self,
        seat_id: Uuid,
        from: &str,
        to: &str,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let result = sqlx::query("UPDATE seats SET state = $1 WHERE id = $2 AND state = $3")
            .bind(to)
            .bind(seat_id)
            .bind(from)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn confirm_held(
        &self,
        reservation_id: Uuid,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        let result = sqlx::query(
            r#"
            UPDATE seats SET state = 'OCUPADO'
            WHERE state = 'RESERVADO'
              AND id IN (SELECT seat_id FROM segments WHERE reservation_id = $1)
            "#,
        )
        .bind(reservation_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn get_seat(
        &self,
        seat_id: Uuid,
    ) -> Result<Option<Value>, Box<dyn std::error::Error + Send + Sync>> {
        let row: Option<SeatRow> = sqlx::query_as(&format!(
            "SELECT {} FROM seats WHERE id = $1",
            SEAT_COLUMNS
        ))
        .bind(seat_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SeatRow::into_json))
    }

    async fn list_for_flight(
        &self,
        flight_id: Uuid,
    ) -> Result<Vec<Value>, Box<dyn std::error::Error + Send + Sync>> {
        let rows: Vec<SeatRow> = sqlx::query_as(&format!(
            "SELECT {} FROM seats WHERE flight_id = $1 ORDER BY seat_row, seat_column",
            SEAT_COLUMNS
        ))
        .bind(flight_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SeatRow::into_json).collect())
    }
}
