use anyhow::Result;
use futures::future::BoxFuture;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, Pool, Postgres, Transaction};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

pub mod queries;

pub type DbPool = Pool<Postgres>;

pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

type TxSlot = Arc<Mutex<Option<Transaction<'static, Postgres>>>>;

/// Scoped unit-of-work value threaded through repository calls. `Default` is
/// "no ambient transaction": every query resolves to its own pooled
/// connection. Inside [`Transactor::run_in_transaction`] the context carries
/// the open transaction, and nested calls compose into it.
#[derive(Clone, Default)]
pub struct TxContext {
    tx: Option<TxSlot>,
}

impl TxContext {
    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }
}

/// Executor resolved from a [`TxContext`]: either the ambient transaction's
/// connection or a connection checked out from the pool.
pub enum QueryHandle<'a> {
    Pooled(PoolConnection<Postgres>),
    Ambient(MutexGuard<'a, Option<Transaction<'static, Postgres>>>),
}

impl QueryHandle<'_> {
    pub fn conn(&mut self) -> &mut PgConnection {
        match self {
            QueryHandle::Pooled(conn) => &mut **conn,
            QueryHandle::Ambient(guard) => guard
                .as_mut()
                .map(|tx| &mut **tx)
                // query_handle only hands out guards over a live transaction
                .expect("ambient transaction used after completion"),
        }
    }
}

/// Runs units of work against Postgres, reusing an already-open transaction
/// when the calling context carries one.
pub struct Transactor {
    pool: DbPool,
}

impl Transactor {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Resolves the executor for `ctx`: the ambient transaction if one is
    /// active, otherwise a pooled connection. Repositories must obtain their
    /// executor through this call rather than holding one directly.
    pub async fn query_handle<'a>(&self, ctx: &'a TxContext) -> sqlx::Result<QueryHandle<'a>> {
        if let Some(slot) = &ctx.tx {
            let guard = slot.lock().await;
            if guard.is_some() {
                return Ok(QueryHandle::Ambient(guard));
            }
        }
        Ok(QueryHandle::Pooled(self.pool.acquire().await?))
    }

    /// Executes `work` inside a transaction. If `ctx` already carries one,
    /// `work` runs directly against it and the outer call owns commit and
    /// rollback. Otherwise a new transaction is begun and committed on `Ok`;
    /// on `Err` (or an unwind, via the transaction's drop) it is rolled back
    /// before the error propagates.
    pub async fn run_in_transaction<T, E, F>(&self, ctx: &TxContext, work: F) -> Result<T, E>
    where
        E: From<sqlx::Error>,
        F: for<'c> FnOnce(&'c TxContext) -> BoxFuture<'c, Result<T, E>>,
    {
        if ctx.in_transaction() {
            return work(ctx).await;
        }

        let tx = self.pool.begin().await.map_err(E::from)?;
        let slot: TxSlot = Arc::new(Mutex::new(Some(tx)));
        let inner = TxContext {
            tx: Some(slot.clone()),
        };

        let result = work(&inner).await;
        drop(inner);

        let tx = slot.lock().await.take();
        match (result, tx) {
            (Ok(value), Some(tx)) => {
                tx.commit().await.map_err(E::from)?;
                Ok(value)
            }
            (Err(err), Some(tx)) => {
                let _ = tx.rollback().await;
                Err(err)
            }
            // The slot is only emptied here, after the unit of work returned.
            (result, None) => result,
        }
    }
}
