use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;
use volara_core::repository::ReservationRepository;

pub struct StoreReservationRepository {
    pool: PgPool,
}

impl StoreReservationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    code: String,
    user_id: Uuid,
    class: String,
    trip_type: String,
    state: String,
    traveler_count: i32,
    total: i64,
    outbound_flight_id: Uuid,
    return_flight_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct TravelerRow {
    id: Uuid,
    document_id: String,
    first_name: String,
    last_name: String,
    birth_date: chrono::NaiveDate,
    gender: Option<String>,
    email: Option<String>,
    phone: Option<String>,
}

#[derive(sqlx::FromRow)]
struct SegmentRow {
    id: Uuid,
    reservation_id: Uuid,
    traveler_id: Uuid,
    flight_id: Uuid,
    leg: String,
    seat_id: Uuid,
}

const RESERVATION_COLUMNS: &str = "id, code, user_id, class, trip_type, state, traveler_count, total, outbound_flight_id, return_flight_id, created_at, expires_at";

impl ReservationRow {
    fn into_json(self, travelers: Vec<Value>, segments: Vec<Value>) -> Value {
        serde_json::json!({
            "id": self.id,
            "code": self.code,
            "user_id": self.user_id,
            "class": self.class,
            "trip_type": self.trip_type,
            "state": self.state,
            "traveler_count": self.traveler_count,
            "total": self.total,
            "outbound_flight_id": self.outbound_flight_id,
            "return_flight_id": self.return_flight_id,
            "created_at": self.created_at.to_rfc3339(),
            "expires_at": self.expires_at.to_rfc3339(),
            "travelers": travelers,
            "segments": segments,
        })
    }
}

impl SegmentRow {
    fn into_json(self) -> Value {
        serde_json::json!({
            "id": self.id,
            "reservation_id": self.reservation_id,
            "traveler_id": self.traveler_id,
            "flight_id": self.flight_id,
            "leg": self.leg,
            "seat_id": self.seat_id,
        })
    }
}

impl StoreReservationRepository {
    async fn fetch_children(
        &self,
        reservation_id: Uuid,
    ) -> Result<(Vec<Value>, Vec<Value>), Box<dyn std::error::Error + Send + Sync>> {
        let traveler_rows: Vec<TravelerRow> = sqlx::query_as(
            r#"
            SELECT id, document_id, first_name, last_name, birth_date, gender, email, phone
            FROM travelers WHERE reservation_id = $1
            "#,
        )
        .bind(reservation_id)
        .fetch_all(&self.pool)
        .await?;

        let travelers = traveler_rows
            .into_iter()
            .map(|t| {
                serde_json::json!({
                    "id": t.id,
                    "document_id": t.document_id,
                    "first_name": t.first_name,
                    "last_name": t.last_name,
                    "birth_date": t.birth_date.to_string(),
                    "gender": t.gender,
                    "email": t.email,
                    "phone": t.phone,
                })
            })
            .collect();

        let segment_rows: Vec<SegmentRow> = sqlx::query_as(
            "SELECT id, reservation_id, traveler_id, flight_id, leg, seat_id FROM segments WHERE reservation_id = $1",
        )
        .bind(reservation_id)
        .fetch_all(&self.pool)
        .await?;

        let segments = segment_rows.into_iter().map(SegmentRow::into_json).collect();
        Ok((travelers, segments))
    }
}

#[async_trait]
impl ReservationRepository for StoreReservationRepository {
    async fn create_reservation(
        &self,
        reservation: &Value,
    ) -> Result<Uuid, Box<dyn std::error::Error + Send + Sync>> {
        let id = if let Some(id_str) = reservation["id"].as_str() {
            Uuid::parse_str(id_str)?
        } else {
            Uuid::new_v4()
        };
        let user_id = Uuid::parse_str(reservation["user_id"].as_str().ok_or("Missing user_id")?)?;
        let outbound = Uuid::parse_str(
            reservation["outbound_flight_id"]
                .as_str()
                .ok_or("Missing outbound_flight_id")?,
        )?;
        let return_flight = match reservation["return_flight_id"].as_str() {
            Some(s) => Some(Uuid::parse_str(s)?),
            None => None,
        };
        let created_at: DateTime<Utc> = reservation["created_at"]
            .as_str()
            .ok_or("Missing created_at")?
            .parse()?;
        let expires_at: DateTime<Utc> = reservation["expires_at"]
            .as_str()
            .ok_or("Missing expires_at")?
            .parse()?;

        sqlx::query(
            r#"
            INSERT INTO reservations (id, code, user_id, class, trip_type, state, traveler_count, total, outbound_flight_id, return_flight_id, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, 'ACTIVA', $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(id)
        .bind(reservation["code"].as_str().ok_or("Missing code")?)
        .bind(user_id)
        .bind(reservation["class"].as_str().ok_or("Missing class")?)
        .bind(reservation["trip_type"].as_str().ok_or("Missing trip_type")?)
        .bind(reservation["traveler_count"].as_i64().unwrap_or(1) as i32)
        .bind(reservation["total"].as_i64().unwrap_or(0))
        .bind(outbound)
        .bind(return_flight)
        .bind(created_at)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn get_reservation(
        &self,
        id: Uuid,
    ) -> Result<Option<Value>, Box<dyn std::error::Error + Send + Sync>> {
        let row: Option<ReservationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM reservations WHERE id = $1",
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            let (travelers, segments) = self.fetch_children(id).await?;
            return Ok(Some(row.into_json(travelers, segments)));
        }
        Ok(None)
    }

    async fn list_reservations(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Value>, Box<dyn std::error::Error + Send + Sync>> {
        let rows: Vec<ReservationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM reservations WHERE user_id = $1 ORDER BY created_at DESC",
            RESERVATION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut reservations = Vec::new();
        for row in rows {
            let (travelers, segments) = self.fetch_children(row.id).await?;
            reservations.push(row.into_json(travelers, segments));
        }
        Ok(reservations)
    }

    async fn try_update_state(
        &self,
        id: Uuid,
        from: &str,
        to: &str,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let result =
            sqlx::query("UPDATE reservations SET state = $1 WHERE id = $2 AND state = $3")
                .bind(to)
                .bind(id)
                .bind(from)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_codes_with_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>> {
        let codes: Vec<String> =
            sqlx::query_scalar("SELECT code FROM reservations WHERE code LIKE $1 || '%'")
                .bind(prefix)
                .fetch_all(&self.pool)
                .await?;
        Ok(codes)
    }

    async fn add_traveler_with_segments(
        &self,
        reservation_id: Uuid,
        traveler: &Value,
        segments: &[Value],
    ) -> Result<Uuid, Box<dyn std::error::Error + Send + Sync>> {
        let traveler_id = Uuid::new_v4();
        let user_id = Uuid::parse_str(traveler["user_id"].as_str().ok_or("Missing user_id")?)?;
        let birth_date: chrono::NaiveDate = traveler["birth_date"]
            .as_str()
            .ok_or("Missing birth_date")?
            .parse()?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO travelers (id, reservation_id, user_id, document_id, first_name, last_name, birth_date, gender, email, phone)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(traveler_id)
        .bind(reservation_id)
        .bind(user_id)
        .bind(traveler["document_id"].as_str().ok_or("Missing document_id")?)
        .bind(traveler["first_name"].as_str().ok_or("Missing first_name")?)
        .bind(traveler["last_name"].as_str().ok_or("Missing last_name")?)
        .bind(birth_date)
        .bind(traveler["gender"].as_str())
        .bind(traveler["email"].as_str())
        .bind(traveler["phone"].as_str())
        .execute(&mut *tx)
        .await?;

        for segment in segments {
            let flight_id =
                Uuid::parse_str(segment["flight_id"].as_str().ok_or("Missing flight_id")?)?;
            let seat_id = Uuid::parse_str(segment["seat_id"].as_str().ok_or("Missing seat_id")?)?;

            sqlx::query(
                r#"
                INSERT INTO segments (id, reservation_id, traveler_id, flight_id, leg, seat_id)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(reservation_id)
            .bind(traveler_id)
            .bind(flight_id)
            .bind(segment["leg"].as_str().ok_or("Missing leg")?)
            .bind(seat_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(traveler_id)
    }

    async fn traveler_booked_on_flight(
        &self,
        flight_id: Uuid,
        document_id: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM travelers t
            JOIN reservations r ON r.id = t.reservation_id
            WHERE r.state <> 'CANCELADA'
              AND (r.outbound_flight_id = $1 OR r.return_flight_id = $1)
              AND (
                    TRIM(t.document_id) = TRIM($2)
                 OR (LOWER(TRIM(t.first_name)) = LOWER(TRIM($3))
                     AND LOWER(TRIM(t.last_name)) = LOWER(TRIM($4)))
              )
            "#,
        )
        .bind(flight_id)
        .bind(document_id)
        .bind(first_name)
        .bind(last_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn get_segment(
        &self,
        segment_id: Uuid,
    ) -> Result<Option<Value>, Box<dyn std::error::Error + Send + Sync>> {
        #[derive(sqlx::FromRow)]
        struct SegmentDetailRow {
            id: Uuid,
            reservation_id: Uuid,
            traveler_id: Uuid,
            flight_id: Uuid,
            leg: String,
            seat_id: Uuid,
            reservation_state: String,
            reservation_class: String,
            reservation_user_id: Uuid,
        }

        // The reservation guard fields ride along so the seat-change path
        // needs a single fetch.
        let row: Option<SegmentDetailRow> = sqlx::query_as(
            r#"
            SELECT s.id, s.reservation_id, s.traveler_id, s.flight_id, s.leg, s.seat_id,
                   r.state AS reservation_state, r.class AS reservation_class,
                   r.user_id AS reservation_user_id
            FROM segments s
            JOIN reservations r ON r.id = s.reservation_id
            WHERE s.id = $1
            "#,
        )
        .bind(segment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|s| {
            serde_json::json!({
                "id": s.id,
                "reservation_id": s.reservation_id,
                "traveler_id": s.traveler_id,
                "flight_id": s.flight_id,
                "leg": s.leg,
                "seat_id": s.seat_id,
                "reservation_state": s.reservation_state,
                "reservation_class": s.reservation_class,
                "reservation_user_id": s.reservation_user_id,
            })
        }))
    }

    async fn update_segment_seat(
        &self,
        segment_id: Uuid,
        seat_id: Uuid,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query("UPDATE segments SET seat_id = $1 WHERE id = $2")
            .bind(seat_id)
            .bind(segment_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn seat_ids_for_reservation(
        &self,
        id: Uuid,
    ) -> Result<Vec<Uuid>, Box<dyn std::error::Error + Send + Sync>> {
        let ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT seat_id FROM segments WHERE reservation_id = $1")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }

    async fn list_expired_active(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Value>, Box<dyn std::error::Error + Send + Sync>> {
        let rows: Vec<ReservationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM reservations WHERE state = 'ACTIVA' AND expires_at <= $1",
            RESERVATION_COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| r.into_json(Vec::new(), Vec::new()))
            .collect())
    }
}
