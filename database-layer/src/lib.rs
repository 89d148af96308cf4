//! Database access layer for MedLedger.
//!
//! Wraps a PostgreSQL connection pool and provides tenant-scoped
//! transactions: every transaction opened through [`TransactionManager`]
//! first applies the acting principal's identity as `SET LOCAL` GUCs so
//! row-level policies and audit triggers can see who is writing.

pub mod connection;
pub mod error;
pub mod scope;
pub mod transaction;

pub use connection::DatabasePool;
pub use error::{DatabaseError, DatabaseResult};
pub use scope::TenantScope;
pub use transaction::TransactionManager;
