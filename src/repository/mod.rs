//! Backing-store access: pooled handles and the per-request resource scope

use crate::api::error::{ApiError, Diagnostic};
use crate::context::RequestContext;
use async_trait::async_trait;
use metrics::counter;
use sqlx::{pool::PoolConnection, MySql, MySqlPool};
use thiserror::Error;

/// Failure to obtain a handle from the pool.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("timed out waiting for a connection")]
    Exhausted,

    #[error("pool is closed")]
    Closed,

    #[error("connection error: {0}")]
    Connection(String),
}

impl From<sqlx::Error> for AcquireError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => AcquireError::Exhausted,
            sqlx::Error::PoolClosed => AcquireError::Closed,
            other => AcquireError::Connection(other.to_string()),
        }
    }
}

/// Shared pool fronting the backing store.
///
/// Implementations must be safe to acquire from concurrently and must bound
/// the wait: an exhausted pool returns [`AcquireError::Exhausted`] instead of
/// blocking forever. Dropping a handle returns it to the pool.
#[async_trait]
pub trait ResourcePool: Send + Sync + 'static {
    type Handle: Send;

    async fn acquire(&self) -> Result<Self::Handle, AcquireError>;
}

/// A handle held for the duration of one request.
///
/// The handle is released when the scope is dropped, which happens exactly
/// once on every exit path of the owning handler.
pub struct ResourceScope<H> {
    handle: H,
    operation: &'static str,
}

impl<H: Send> ResourceScope<H> {
    /// Acquire a handle for `operation`, racing the pool against request
    /// cancellation. Failures are internal errors, never domain errors.
    pub async fn acquire<P>(
        pool: &P,
        ctx: &RequestContext,
        operation: &'static str,
    ) -> Result<Self, ApiError>
    where
        P: ResourcePool<Handle = H> + ?Sized,
    {
        if ctx.is_cancelled() {
            return Err(ApiError::cancelled(Diagnostic::new(operation)));
        }

        let acquired = tokio::select! {
            result = pool.acquire() => result,
            _ = ctx.cancelled() => {
                return Err(ApiError::cancelled(Diagnostic::new(operation)));
            }
        };

        match acquired {
            Ok(handle) => {
                tracing::trace!(operation, "resource acquired");
                Ok(Self { handle, operation })
            }
            Err(err) => {
                counter!("userapi_pool_acquire_failures_total").increment(1);
                Err(ApiError::internal(Diagnostic::new(operation), err))
            }
        }
    }

    pub fn handle(&mut self) -> &mut H {
        &mut self.handle
    }
}

impl<H> Drop for ResourceScope<H> {
    fn drop(&mut self) {
        tracing::trace!(operation = self.operation, "resource released");
    }
}

/// MySQL connection pool adapter.
#[derive(Clone)]
pub struct MySqlResourcePool {
    pool: MySqlPool,
}

impl MySqlResourcePool {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourcePool for MySqlResourcePool {
    type Handle = PoolConnection<MySql>;

    async fn acquire(&self) -> Result<Self::Handle, AcquireError> {
        // The acquire timeout configured on the pool bounds this wait.
        Ok(self.pool.acquire().await?)
    }
}
