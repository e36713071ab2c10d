use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;
use volara_core::repository::CatalogRepository;

pub struct StoreCatalogRepository {
    pool: PgPool,
}

impl StoreCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CityRow {
    id: Uuid,
    name: String,
    country: String,
}

#[derive(sqlx::FromRow)]
struct RouteRow {
    id: Uuid,
    code: String,
    origin_city_id: Uuid,
    destination_city_id: Uuid,
    domestic: bool,
    price_first: i64,
    price_economy: i64,
}

#[derive(sqlx::FromRow)]
struct FlightRow {
    id: Uuid,
    route_id: Uuid,
    flight_date: chrono::NaiveDate,
    departure_time: chrono::NaiveTime,
    status: String,
    promotion_pct: i32,
}

impl RouteRow {
    fn into_json(self) -> Value {
        serde_json::json!({
            "id": self.id,
            "code": self.code,
            "origin_city_id": self.origin_city_id,
            "destination_city_id": self.destination_city_id,
            "domestic": self.domestic,
            "price_first": self.price_first,
            "price_economy": self.price_economy,
        })
    }
}

impl FlightRow {
    fn into_json(self) -> Value {
        serde_json::json!({
            "id": self.id,
            "route_id": self.route_id,
            "flight_date": self.flight_date.to_string(),
            "departure_time": self.departure_time.to_string(),
            "status": self.status,
            "promotion_pct": self.promotion_pct,
        })
    }
}

fn bind_route<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    id: Uuid,
    route: &'q Value,
) -> Result<
    sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    Box<dyn std::error::Error + Send + Sync>,
> {
    let origin = route["origin_city_id"].as_str().ok_or("Missing origin_city_id")?;
    let destination = route["destination_city_id"]
        .as_str()
        .ok_or("Missing destination_city_id")?;

    Ok(query
        .bind(id)
        .bind(route["code"].as_str().ok_or("Missing route code")?)
        .bind(Uuid::parse_str(origin)?)
        .bind(Uuid::parse_str(destination)?)
        .bind(route["domestic"].as_bool().unwrap_or(true))
        .bind(route["price_first"].as_i64().unwrap_or(0))
        .bind(route["price_economy"].as_i64().unwrap_or(0)))
}

const ROUTE_COLUMNS: &str =
    "id, code, origin_city_id, destination_city_id, domestic, price_first, price_economy";

#[async_trait]
impl CatalogRepository for StoreCatalogRepository {
    async fn create_city(
        &self,
        city: &Value,
    ) -> Result<Uuid, Box<dyn std::error::Error + Send + Sync>> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO cities (id, name, country) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(city["name"].as_str().ok_or("Missing city name")?)
            .bind(city["country"].as_str().unwrap_or("Colombia"))
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    async fn list_cities(&self) -> Result<Vec<Value>, Box<dyn std::error::Error + Send + Sync>> {
        let rows: Vec<CityRow> =
            sqlx::query_as("SELECT id, name, country FROM cities ORDER BY name")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|c| serde_json::json!({ "id": c.id, "name": c.name, "country": c.country }))
            .collect())
    }

    async fn create_route_pair(
        &self,
        outbound: &Value,
        mirror: &Value,
    ) -> Result<(Uuid, Uuid), Box<dyn std::error::Error + Send + Sync>> {
        let outbound_id = Uuid::new_v4();
        let mirror_id = Uuid::new_v4();

        let insert = r#"
            INSERT INTO routes (id, code, origin_city_id, destination_city_id, domestic, price_first, price_economy)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#;

        let mut tx = self.pool.begin().await?;
        bind_route(sqlx::query(insert), outbound_id, outbound)?
            .execute(&mut *tx)
            .await?;
        bind_route(sqlx::query(insert), mirror_id, mirror)?
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok((outbound_id, mirror_id))
    }

    async fn route_pair_exists(
        &self,
        origin_city_id: Uuid,
        destination_city_id: Uuid,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM routes WHERE origin_city_id = $1 AND destination_city_id = $2",
        )
        .bind(origin_city_id)
        .bind(destination_city_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn list_route_codes(
        &self,
    ) -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>> {
        let codes: Vec<String> = sqlx::query_scalar("SELECT code FROM routes")
            .fetch_all(&self.pool)
            .await?;
        Ok(codes)
    }

    async fn get_route(
        &self,
        id: Uuid,
    ) -> Result<Option<Value>, Box<dyn std::error::Error + Send + Sync>> {
        let row: Option<RouteRow> = sqlx::query_as(&format!(
            "SELECT {} FROM routes WHERE id = $1",
            ROUTE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(RouteRow::into_json))
    }

    async fn list_routes(&self) -> Result<Vec<Value>, Box<dyn std::error::Error + Send + Sync>> {
        let rows: Vec<RouteRow> = sqlx::query_as(&format!(
            "SELECT {} FROM routes ORDER BY code",
            ROUTE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(RouteRow::into_json).collect())
    }

    async fn create_flight(
        &self,
        flight: &Value,
    ) -> Result<Uuid, Box<dyn std::error::Error + Send + Sync>> {
        let id = Uuid::new_v4();
        let route_id = flight["route_id"].as_str().ok_or("Missing route_id")?;
        let flight_date: chrono::NaiveDate = flight["flight_date"]
            .as_str()
            .ok_or("Missing flight_date")?
            .parse()?;
        let departure_time: chrono::NaiveTime = flight["departure_time"]
            .as_str()
            .ok_or("Missing departure_time")?
            .parse()?;

        sqlx::query(
            r#"
            INSERT INTO flights (id, route_id, flight_date, departure_time, status, promotion_pct)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(Uuid::parse_str(route_id)?)
        .bind(flight_date)
        .bind(departure_time)
        .bind(flight["status"].as_str().unwrap_or("PROGRAMADO"))
        .bind(flight["promotion_pct"].as_i64().unwrap_or(0) as i32)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn get_flight(
        &self,
        id: Uuid,
    ) -> Result<Option<Value>, Box<dyn std::error::Error + Send + Sync>> {
        let row: Option<FlightRow> = sqlx::query_as(
            "SELECT id, route_id, flight_date, departure_time, status, promotion_pct FROM flights WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(FlightRow::into_json))
    }

    async fn list_flights(
        &self,
        route_id: Option<Uuid>,
        date: Option<&str>,
    ) -> Result<Vec<Value>, Box<dyn std::error::Error + Send + Sync>> {
        let date: Option<chrono::NaiveDate> = match date {
            Some(d) => Some(d.parse()?),
            None => None,
        };

        let rows: Vec<FlightRow> = sqlx::query_as(
            r#"
            SELECT id, route_id, flight_date, departure_time, status, promotion_pct
            FROM flights
            WHERE ($1::uuid IS NULL OR route_id = $1)
              AND ($2::date IS NULL OR flight_date = $2)
            ORDER BY flight_date, departure_time
            "#,
        )
        .bind(route_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FlightRow::into_json).collect())
    }
}
