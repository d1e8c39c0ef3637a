use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct CreateIncidentParams {
    pub latitude: f64,
    pub longitude: f64,
    pub radius: i32,
}

#[derive(Debug, Clone)]
pub struct UpdateIncidentParams {
    pub id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: i32,
}

/// A circular danger zone. Never physically deleted; deactivation is a
/// terminal soft delete.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Incident {
    pub id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Read-optimized projection of an active incident, used for geofence
/// evaluation and as the cached active-set entry.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct IncidentShort {
    pub id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: i32,
}

/// Distinct users seen inside an incident's radius within the stats window.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct IncidentStats {
    pub incident_id: i64,
    pub user_count: i64,
    pub latitude: f64,
    pub longitude: f64,
}
