use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use bulkbuy_engine::db_types::Coordinate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Body of `POST /api/groups`. The group center can be given as explicit coordinates,
/// or omitted and resolved from `postcode` via the geocoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGroupParams {
    pub product_id: String,
    pub area: Option<String>,
    pub postcode: Option<String>,
    pub center: Option<Coordinate>,
    pub radius_km: f64,
    pub target_quantity: i64,
    pub min_quantity: i64,
    pub discount_percent: i64,
    pub expires_at: DateTime<Utc>,
}

/// Body of `POST /api/groups/{id}/commitments`. If `location` is omitted, the buyer's
/// postcode is geocoded server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitParams {
    pub buyer_id: String,
    pub quantity: i64,
    pub postcode: String,
    pub location: Option<Coordinate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelParams {
    pub buyer_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthParams {
    pub buyer_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
}
