use crate::sensor::{SensorKind, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted sensor reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub id: i64,
    pub sensor_id: String,
    #[sqlx(rename = "sensor_value")]
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A reading that has not been stored yet.
///
/// The store assigns the id and stamps `created_at`/`updated_at`. A missing
/// `timestamp` is replaced by the creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub sensor_id: String,
    pub value: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Inclusive bounds on the observation timestamp
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| ts >= start) && self.end.map_or(true, |end| ts <= end)
    }
}

/// Body of `POST /api/readings`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReadingRequest {
    pub sensor_id: String,
    pub value: f64,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<CreateReadingRequest> for NewReading {
    fn from(req: CreateReadingRequest) -> Self {
        Self {
            sensor_id: req.sensor_id,
            value: req.value,
            timestamp: req.timestamp,
        }
    }
}

/// Latest state of one sensor, as returned by `GET /api/sensors`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorSummary {
    pub id: String,
    pub name: String,
    pub status: Status,
    pub value: f64,
    #[serde(rename = "type")]
    pub kind: SensorKind,
    pub unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub email: String,
    pub message: String,
}

impl AuthResponse {
    pub fn success(token: String, email: String) -> Self {
        Self {
            token,
            token_type: "Bearer".to_string(),
            email,
            message: "Login successful".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateQuery {
    pub count: Option<u32>,
}
