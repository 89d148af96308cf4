// Transaction management with tenant scope application
use crate::connection::DatabasePool;
use crate::error::{DatabaseError, DatabaseResult};
use crate::scope::TenantScope;
use sqlx::{Executor, Postgres, Transaction};
use tracing::debug;

/// Transaction manager that applies the tenant scope before any statement
/// runs inside the transaction.
pub struct TransactionManager {
    pool: DatabasePool,
    scope: Option<TenantScope>,
}

impl TransactionManager {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool, scope: None }
    }

    /// Set the tenant scope for transactions opened by this manager.
    pub fn with_scope(mut self, scope: TenantScope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Begin a new transaction with the tenant scope applied.
    pub async fn begin(&self) -> DatabaseResult<Transaction<'_, Postgres>> {
        debug!("Beginning transaction");

        let mut tx = self
            .pool
            .pool()
            .begin()
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Failed to begin transaction: {}", e)))?;

        if let Some(scope) = &self.scope {
            // SET LOCAL cannot go through the prepared-statement path;
            // executing the plain string uses the simple query protocol.
            (&mut *tx)
                .execute(scope.set_local_sql().as_str())
                .await
                .map_err(|e| {
                    DatabaseError::QueryFailed(format!("Failed to apply tenant scope: {}", e))
                })?;
        }

        Ok(tx)
    }
}
