use crate::codes::{self, CodeError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A directional city pair with per-class pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: Uuid,
    pub code: String,
    pub origin_city_id: Uuid,
    pub destination_city_id: Uuid,
    pub domestic: bool,
    pub price_first: i64,
    pub price_economy: i64,
}

/// Route catalog with directional-pair uniqueness and implicit mirror creation.
pub struct RouteCatalog {
    routes: HashMap<Uuid, Route>,
}

impl RouteCatalog {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    pub fn get(&self, route_id: &Uuid) -> Option<&Route> {
        self.routes.get(route_id)
    }

    pub fn find_pair(&self, origin: Uuid, destination: Uuid) -> Option<&Route> {
        self.routes
            .values()
            .find(|r| r.origin_city_id == origin && r.destination_city_id == destination)
    }

    pub fn codes(&self) -> Vec<String> {
        self.routes.values().map(|r| r.code.clone()).collect()
    }

    /// Create origin->destination and its destination->origin mirror, each
    /// with its own allocated code. Fails if the forward pair already exists.
    pub fn create_pair(
        &mut self,
        origin: Uuid,
        destination: Uuid,
        domestic: bool,
        price_first: i64,
        price_economy: i64,
    ) -> Result<(Route, Route), RouteError> {
        if self.find_pair(origin, destination).is_some() {
            return Err(RouteError::PairExists {
                origin,
                destination,
            });
        }

        let mut existing = self.codes();
        let outbound_code = codes::next_route_code(&existing, domestic)?;
        existing.push(outbound_code.clone());

        let outbound = Route {
            id: Uuid::new_v4(),
            code: outbound_code,
            origin_city_id: origin,
            destination_city_id: destination,
            domestic,
            price_first,
            price_economy,
        };
        self.routes.insert(outbound.id, outbound.clone());

        // The mirror may already exist (it was created as someone else's
        // outbound); in that case only the forward route is new.
        if let Some(mirror) = self.find_pair(destination, origin) {
            return Ok((outbound, mirror.clone()));
        }

        let mirror_code = codes::next_route_code(&existing, domestic)?;
        let mirror = Route {
            id: Uuid::new_v4(),
            code: mirror_code,
            origin_city_id: destination,
            destination_city_id: origin,
            domestic,
            price_first,
            price_economy,
        };
        self.routes.insert(mirror.id, mirror.clone());

        Ok((outbound, mirror))
    }
}

impl Default for RouteCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("Route already exists between {origin} and {destination}")]
    PairExists { origin: Uuid, destination: Uuid },

    #[error(transparent)]
    Code(#[from] CodeError),
}
