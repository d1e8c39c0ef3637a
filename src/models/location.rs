use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::incident::IncidentShort;

#[derive(Debug, Clone)]
pub struct CheckLocationParams {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Outcome of one geofence check. One copy is persisted as a
/// `location_checks` audit row by the detached post-check pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct CheckLocationResult {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub has_danger: bool,
    pub dangers: Vec<IncidentShort>,
    pub created_at: DateTime<Utc>,
}

/// Durable message body carried by the notification queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
}
