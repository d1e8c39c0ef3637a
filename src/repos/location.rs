use async_trait::async_trait;
use std::sync::Arc;

use crate::db::{queries, Transactor, TxContext};
use crate::errors::IncidentError;
use crate::models::location::CheckLocationResult;
use crate::services::location::CheckLogStore;

/// Audit log of location checks (`location_checks`).
#[derive(Clone)]
pub struct LocationRepo {
    transactor: Arc<Transactor>,
}

impl LocationRepo {
    pub fn new(transactor: Arc<Transactor>) -> Self {
        Self { transactor }
    }
}

#[async_trait]
impl CheckLogStore for LocationRepo {
    async fn save_check_log(
        &self,
        ctx: &TxContext,
        check: &CheckLocationResult,
    ) -> Result<(), IncidentError> {
        let mut handle = self.transactor.query_handle(ctx).await?;
        sqlx::query(queries::INSERT_LOCATION_CHECK)
            .bind(&check.user_id)
            .bind(check.longitude)
            .bind(check.latitude)
            .bind(check.has_danger)
            .execute(handle.conn())
            .await?;
        Ok(())
    }
}
