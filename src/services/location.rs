//! Geofence evaluation and the detached post-check pipeline.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::db::TxContext;
use crate::errors::{CacheError, IncidentError, QueueError};
use crate::geo;
use crate::models::incident::IncidentShort;
use crate::models::location::{CheckLocationParams, CheckLocationResult};

#[async_trait]
pub trait CheckLogStore: Send + Sync {
    async fn save_check_log(
        &self,
        ctx: &TxContext,
        check: &CheckLocationResult,
    ) -> Result<(), IncidentError>;
}

#[async_trait]
pub trait ActiveIncidentSource: Send + Sync {
    async fn get_active(&self, ctx: &TxContext) -> Result<Vec<IncidentShort>, IncidentError>;
}

#[async_trait]
pub trait ActiveIncidentCache: Send + Sync {
    async fn get_active_incidents(&self) -> Result<Vec<IncidentShort>, CacheError>;
    async fn set_active_incidents(&self, incidents: &[IncidentShort]) -> Result<(), CacheError>;
}

#[async_trait]
pub trait AlertProducer: Send + Sync {
    async fn enqueue_danger_alert(
        &self,
        user_id: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<(), QueueError>;
}

/// Membership test, boundary inclusive: a point exactly at radius distance
/// counts as inside.
fn is_within(incident: &IncidentShort, latitude: f64, longitude: f64) -> bool {
    geo::distance(latitude, longitude, incident.latitude, incident.longitude)
        <= f64::from(incident.radius)
}

pub struct LocationService {
    async_job_timeout: Duration,
    check_log: Arc<dyn CheckLogStore>,
    incidents: Arc<dyn ActiveIncidentSource>,
    cache: Arc<dyn ActiveIncidentCache>,
    queue: Arc<dyn AlertProducer>,
}

impl LocationService {
    pub fn new(
        async_job_timeout: Duration,
        check_log: Arc<dyn CheckLogStore>,
        incidents: Arc<dyn ActiveIncidentSource>,
        cache: Arc<dyn ActiveIncidentCache>,
        queue: Arc<dyn AlertProducer>,
    ) -> Self {
        Self {
            async_job_timeout,
            check_log,
            incidents,
            cache,
            queue,
        }
    }

    /// Evaluates the point against every active incident and returns before
    /// any durable side effect. The audit write and the webhook enqueue run
    /// on a detached task with its own deadline; if the process dies before
    /// that task finishes, those side effects are lost (best effort until
    /// the task is enqueued, at-least-once after).
    pub async fn check(
        &self,
        params: &CheckLocationParams,
    ) -> Result<CheckLocationResult, IncidentError> {
        let ctx = TxContext::default();

        let incidents = match self.get_active_incidents(&ctx).await {
            Ok(incidents) => incidents,
            Err(err) => {
                error!(user_id = %params.user_id, "failed to get active incidents: {err}");
                return Err(err);
            }
        };

        let dangers: Vec<IncidentShort> = incidents
            .into_iter()
            .filter(|inc| is_within(inc, params.latitude, params.longitude))
            .collect();

        let result = CheckLocationResult {
            user_id: params.user_id.clone(),
            latitude: params.latitude,
            longitude: params.longitude,
            has_danger: !dangers.is_empty(),
            dangers,
            created_at: Utc::now(),
        };

        let check_log = Arc::clone(&self.check_log);
        let queue = Arc::clone(&self.queue);
        let job_timeout = self.async_job_timeout;
        let check = result.clone();
        // Detached on purpose: the response must not wait on audit or broker
        // IO, and the pipeline must not inherit the request's cancellation.
        tokio::spawn(async move {
            let pipeline = Self::post_check(check_log, queue, check);
            if tokio::time::timeout(job_timeout, pipeline).await.is_err() {
                error!("post-check pipeline timed out");
            }
        });

        Ok(result)
    }

    /// Cache-aside read of the active set. A miss (or any cache failure)
    /// falls back to the store; repopulation is best effort.
    async fn get_active_incidents(
        &self,
        ctx: &TxContext,
    ) -> Result<Vec<IncidentShort>, IncidentError> {
        match self.cache.get_active_incidents().await {
            Ok(incidents) => return Ok(incidents),
            Err(CacheError::Miss) => debug!("active-incident cache miss, reading from store"),
            Err(err) => warn!("failed to read active-incident cache: {err}"),
        }

        let incidents = self.incidents.get_active(ctx).await?;

        if let Err(err) = self.cache.set_active_incidents(&incidents).await {
            warn!("failed to populate active-incident cache: {err}");
        }

        Ok(incidents)
    }

    async fn post_check(
        check_log: Arc<dyn CheckLogStore>,
        queue: Arc<dyn AlertProducer>,
        check: CheckLocationResult,
    ) {
        let ctx = TxContext::default();

        if let Err(err) = check_log.save_check_log(&ctx, &check).await {
            error!(user_id = %check.user_id, "failed to save location check log: {err}");
        }

        if check.has_danger {
            if let Err(err) = queue
                .enqueue_danger_alert(&check.user_id, check.latitude, check.longitude)
                .await
            {
                error!(user_id = %check.user_id, "failed to enqueue danger webhook: {err}");
            }
        }
    }
}
