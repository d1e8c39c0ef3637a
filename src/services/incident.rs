//! Incident CRUD orchestration: every mutation is followed by a best-effort
//! invalidation of the cached active set.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, warn};

use crate::db::TxContext;
use crate::errors::{CacheError, IncidentError};
use crate::models::incident::{
    CreateIncidentParams, Incident, IncidentStats, UpdateIncidentParams,
};

#[async_trait]
pub trait IncidentStore: Send + Sync {
    async fn create(
        &self,
        ctx: &TxContext,
        params: &CreateIncidentParams,
    ) -> Result<Incident, IncidentError>;
    async fn get_by_id(&self, ctx: &TxContext, id: i64) -> Result<Incident, IncidentError>;
    async fn update(
        &self,
        ctx: &TxContext,
        params: &UpdateIncidentParams,
    ) -> Result<Incident, IncidentError>;
    async fn deactivate(&self, ctx: &TxContext, id: i64) -> Result<(), IncidentError>;
    async fn list(
        &self,
        ctx: &TxContext,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Incident>, IncidentError>;
    async fn get_stats(
        &self,
        ctx: &TxContext,
        window_minutes: i64,
    ) -> Result<Vec<IncidentStats>, IncidentError>;
}

#[async_trait]
pub trait ActiveSetInvalidator: Send + Sync {
    async fn invalidate_active_incidents(&self) -> Result<(), CacheError>;
}

pub struct IncidentService {
    stats_window_minutes: i64,
    store: Arc<dyn IncidentStore>,
    cache: Arc<dyn ActiveSetInvalidator>,
}

impl IncidentService {
    pub fn new(
        stats_window_minutes: i64,
        store: Arc<dyn IncidentStore>,
        cache: Arc<dyn ActiveSetInvalidator>,
    ) -> Self {
        Self {
            stats_window_minutes,
            store,
            cache,
        }
    }

    /// Invalidation failure is diagnostic only: a successful mutation must
    /// never be overridden by cache availability.
    async fn invalidate_active_set(&self) {
        if let Err(err) = self.cache.invalidate_active_incidents().await {
            warn!("failed to invalidate active-incident cache: {err}");
        }
    }

    pub async fn create(&self, params: &CreateIncidentParams) -> Result<Incident, IncidentError> {
        let ctx = TxContext::default();

        let created = match self.store.create(&ctx, params).await {
            Ok(incident) => incident,
            Err(err) => {
                if !matches!(err, IncidentError::Exists) {
                    error!(
                        latitude = params.latitude,
                        longitude = params.longitude,
                        "failed to create incident: {err}"
                    );
                }
                return Err(err);
            }
        };

        self.invalidate_active_set().await;
        Ok(created)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Incident, IncidentError> {
        let ctx = TxContext::default();
        match self.store.get_by_id(&ctx, id).await {
            Ok(incident) => Ok(incident),
            Err(err) => {
                if !matches!(err, IncidentError::NotFound) {
                    error!(id, "failed to get incident: {err}");
                }
                Err(err)
            }
        }
    }

    pub async fn update(&self, params: &UpdateIncidentParams) -> Result<Incident, IncidentError> {
        let ctx = TxContext::default();

        let updated = match self.store.update(&ctx, params).await {
            Ok(incident) => incident,
            Err(err) => {
                if !matches!(err, IncidentError::NotFound | IncidentError::Exists) {
                    error!(id = params.id, "failed to update incident: {err}");
                }
                return Err(err);
            }
        };

        self.invalidate_active_set().await;
        Ok(updated)
    }

    pub async fn deactivate(&self, id: i64) -> Result<(), IncidentError> {
        let ctx = TxContext::default();

        if let Err(err) = self.store.deactivate(&ctx, id).await {
            if !matches!(err, IncidentError::NotFound) {
                error!(id, "failed to deactivate incident: {err}");
            }
            return Err(err);
        }

        self.invalidate_active_set().await;
        Ok(())
    }

    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Incident>, IncidentError> {
        let ctx = TxContext::default();
        self.store.list(&ctx, limit, offset).await.map_err(|err| {
            error!("failed to list incidents: {err}");
            err
        })
    }

    pub async fn get_stats(&self) -> Result<Vec<IncidentStats>, IncidentError> {
        let ctx = TxContext::default();
        self.store
            .get_stats(&ctx, self.stats_window_minutes)
            .await
            .map_err(|err| {
                error!("failed to get incident stats: {err}");
                err
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    fn incident(id: i64) -> Incident {
        Incident {
            id,
            latitude: 55.7558,
            longitude: 37.6173,
            radius: 1000,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Store double: each call consumes the next preloaded outcome.
    #[derive(Default)]
    struct StubStore {
        create_result: Mutex<Option<Result<Incident, IncidentError>>>,
        update_result: Mutex<Option<Result<Incident, IncidentError>>>,
        deactivate_result: Mutex<Option<Result<(), IncidentError>>>,
        stats_windows: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl IncidentStore for StubStore {
        async fn create(
            &self,
            _ctx: &TxContext,
            _params: &CreateIncidentParams,
        ) -> Result<Incident, IncidentError> {
            self.create_result
                .lock()
                .await
                .take()
                .unwrap_or(Err(IncidentError::NotFound))
        }

        async fn get_by_id(&self, _ctx: &TxContext, id: i64) -> Result<Incident, IncidentError> {
            Ok(incident(id))
        }

        async fn update(
            &self,
            _ctx: &TxContext,
            _params: &UpdateIncidentParams,
        ) -> Result<Incident, IncidentError> {
            self.update_result
                .lock()
                .await
                .take()
                .unwrap_or(Err(IncidentError::NotFound))
        }

        async fn deactivate(&self, _ctx: &TxContext, _id: i64) -> Result<(), IncidentError> {
            self.deactivate_result
                .lock()
                .await
                .take()
                .unwrap_or(Err(IncidentError::NotFound))
        }

        async fn list(
            &self,
            _ctx: &TxContext,
            _limit: i64,
            _offset: i64,
        ) -> Result<Vec<Incident>, IncidentError> {
            Ok(vec![])
        }

        async fn get_stats(
            &self,
            _ctx: &TxContext,
            window_minutes: i64,
        ) -> Result<Vec<IncidentStats>, IncidentError> {
            self.stats_windows.lock().await.push(window_minutes);
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct CountingInvalidator {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ActiveSetInvalidator for CountingInvalidator {
        async fn invalidate_active_incidents(&self) -> Result<(), CacheError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CacheError::Redis(redis::RedisError::from((
                    redis::ErrorKind::IoError,
                    "cache unreachable",
                ))));
            }
            Ok(())
        }
    }

    fn params() -> CreateIncidentParams {
        CreateIncidentParams {
            latitude: 55.7558,
            longitude: 37.6173,
            radius: 1000,
        }
    }

    #[tokio::test]
    async fn test_create_invalidates_cache() {
        let store = Arc::new(StubStore {
            create_result: Mutex::new(Some(Ok(incident(1)))),
            ..Default::default()
        });
        let cache = Arc::new(CountingInvalidator::default());
        let svc = IncidentService::new(15, store, Arc::clone(&cache) as _);

        let created = svc.create(&params()).await.unwrap();
        assert_eq!(created.id, 1);
        assert_eq!(cache.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_create_conflict_skips_invalidation() {
        let store = Arc::new(StubStore {
            create_result: Mutex::new(Some(Err(IncidentError::Exists))),
            ..Default::default()
        });
        let cache = Arc::new(CountingInvalidator::default());
        let svc = IncidentService::new(15, store, Arc::clone(&cache) as _);

        let res = svc.create(&params()).await;
        assert!(matches!(res, Err(IncidentError::Exists)));
        assert_eq!(cache.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_create_survives_invalidation_failure() {
        let store = Arc::new(StubStore {
            create_result: Mutex::new(Some(Ok(incident(7)))),
            ..Default::default()
        });
        let cache = Arc::new(CountingInvalidator {
            fail: true,
            ..Default::default()
        });
        let svc = IncidentService::new(15, store, Arc::clone(&cache) as _);

        let created = svc.create(&params()).await.unwrap();
        assert_eq!(created.id, 7);
        assert_eq!(cache.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_update_conflict_propagates() {
        let store = Arc::new(StubStore {
            update_result: Mutex::new(Some(Err(IncidentError::Exists))),
            ..Default::default()
        });
        let cache = Arc::new(CountingInvalidator::default());
        let svc = IncidentService::new(15, store, Arc::clone(&cache) as _);

        let res = svc
            .update(&UpdateIncidentParams {
                id: 1,
                latitude: 10.0,
                longitude: 10.0,
                radius: 500,
            })
            .await;

        assert!(matches!(res, Err(IncidentError::Exists)));
        assert_eq!(cache.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_deactivate_invalidates_cache() {
        let store = Arc::new(StubStore {
            deactivate_result: Mutex::new(Some(Ok(()))),
            ..Default::default()
        });
        let cache = Arc::new(CountingInvalidator::default());
        let svc = IncidentService::new(15, store, Arc::clone(&cache) as _);

        svc.deactivate(1).await.unwrap();
        assert_eq!(cache.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deactivate_missing_id_is_not_found() {
        let store = Arc::new(StubStore::default());
        let cache = Arc::new(CountingInvalidator::default());
        let svc = IncidentService::new(15, store, Arc::clone(&cache) as _);

        let res = svc.deactivate(404).await;
        assert!(matches!(res, Err(IncidentError::NotFound)));
        assert_eq!(cache.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stats_use_configured_window() {
        let store = Arc::new(StubStore::default());
        let cache = Arc::new(CountingInvalidator::default());
        let svc = IncidentService::new(42, Arc::clone(&store) as _, cache);

        svc.get_stats().await.unwrap();
        assert_eq!(store.stats_windows.lock().await.as_slice(), &[42]);
    }
}
