//! Postgres-backed incident store. The overlap-exclusion invariant is
//! enforced in the write statements themselves: the existence check and the
//! mutation are one atomic statement, so concurrent writers cannot both pass
//! the check. See `db::queries` for the SQL.

use async_trait::async_trait;
use futures::FutureExt;
use std::sync::Arc;

use crate::db::{queries, Transactor, TxContext};
use crate::errors::IncidentError;
use crate::models::incident::{
    CreateIncidentParams, Incident, IncidentShort, IncidentStats, UpdateIncidentParams,
};
use crate::services::incident::IncidentStore;
use crate::services::location::ActiveIncidentSource;

#[derive(Clone)]
pub struct IncidentRepo {
    transactor: Arc<Transactor>,
}

impl IncidentRepo {
    pub fn new(transactor: Arc<Transactor>) -> Self {
        Self { transactor }
    }

    async fn exists(&self, ctx: &TxContext, id: i64) -> Result<bool, IncidentError> {
        let mut handle = self.transactor.query_handle(ctx).await?;
        let exists = sqlx::query_scalar::<_, bool>(queries::INCIDENT_EXISTS)
            .bind(id)
            .fetch_one(handle.conn())
            .await?;
        Ok(exists)
    }
}

#[async_trait]
impl IncidentStore for IncidentRepo {
    async fn create(
        &self,
        ctx: &TxContext,
        params: &CreateIncidentParams,
    ) -> Result<Incident, IncidentError> {
        let mut handle = self.transactor.query_handle(ctx).await?;
        let created = sqlx::query_as::<_, Incident>(queries::INSERT_INCIDENT)
            .bind(params.longitude)
            .bind(params.latitude)
            .bind(params.radius)
            .bind(queries::MIN_SEPARATION_METERS)
            .fetch_optional(handle.conn())
            .await?;

        // No row back means the separation guard filtered the insert out.
        created.ok_or(IncidentError::Exists)
    }

    async fn get_by_id(&self, ctx: &TxContext, id: i64) -> Result<Incident, IncidentError> {
        let mut handle = self.transactor.query_handle(ctx).await?;
        let incident = sqlx::query_as::<_, Incident>(queries::GET_INCIDENT_BY_ID)
            .bind(id)
            .fetch_optional(handle.conn())
            .await?;
        incident.ok_or(IncidentError::NotFound)
    }

    async fn update(
        &self,
        ctx: &TxContext,
        params: &UpdateIncidentParams,
    ) -> Result<Incident, IncidentError> {
        let repo = self.clone();
        let params = params.clone();

        // The guarded update and the follow-up probe must observe one
        // consistent snapshot, so both run inside a single transaction.
        self.transactor
            .run_in_transaction(ctx, move |ctx: &TxContext| {
                async move {
                    let updated = {
                        let mut handle = repo.transactor.query_handle(ctx).await?;
                        sqlx::query_as::<_, Incident>(queries::UPDATE_INCIDENT)
                            .bind(params.longitude)
                            .bind(params.latitude)
                            .bind(params.radius)
                            .bind(params.id)
                            .bind(queries::MIN_SEPARATION_METERS)
                            .fetch_optional(handle.conn())
                            .await?
                    };

                    match updated {
                        Some(incident) => Ok(incident),
                        // Zero rows is ambiguous: the id may be absent, or
                        // present but blocked by the separation guard.
                        None => {
                            if repo.exists(ctx, params.id).await? {
                                Err(IncidentError::Exists)
                            } else {
                                Err(IncidentError::NotFound)
                            }
                        }
                    }
                }
                .boxed()
            })
            .await
    }

    async fn deactivate(&self, ctx: &TxContext, id: i64) -> Result<(), IncidentError> {
        let repo = self.clone();

        self.transactor
            .run_in_transaction(ctx, move |ctx: &TxContext| {
                async move {
                    let affected = {
                        let mut handle = repo.transactor.query_handle(ctx).await?;
                        sqlx::query(queries::DEACTIVATE_INCIDENT)
                            .bind(id)
                            .execute(handle.conn())
                            .await?
                            .rows_affected()
                    };

                    if affected == 0 && !repo.exists(ctx, id).await? {
                        return Err(IncidentError::NotFound);
                    }

                    // Zero rows against an existing id: already inactive,
                    // which is a silent no-op.
                    Ok(())
                }
                .boxed()
            })
            .await
    }

    async fn list(
        &self,
        ctx: &TxContext,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Incident>, IncidentError> {
        let mut handle = self.transactor.query_handle(ctx).await?;
        let incidents = sqlx::query_as::<_, Incident>(queries::LIST_INCIDENTS)
            .bind(limit)
            .bind(offset)
            .fetch_all(handle.conn())
            .await?;
        Ok(incidents)
    }

    async fn get_stats(
        &self,
        ctx: &TxContext,
        window_minutes: i64,
    ) -> Result<Vec<IncidentStats>, IncidentError> {
        let mut handle = self.transactor.query_handle(ctx).await?;
        let stats = sqlx::query_as::<_, IncidentStats>(queries::GET_INCIDENT_STATS)
            .bind(window_minutes as f64)
            .fetch_all(handle.conn())
            .await?;
        Ok(stats)
    }
}

#[async_trait]
impl ActiveIncidentSource for IncidentRepo {
    async fn get_active(&self, ctx: &TxContext) -> Result<Vec<IncidentShort>, IncidentError> {
        let mut handle = self.transactor.query_handle(ctx).await?;
        let incidents = sqlx::query_as::<_, IncidentShort>(queries::GET_ACTIVE_INCIDENTS)
            .fetch_all(handle.conn())
            .await?;
        Ok(incidents)
    }
}
