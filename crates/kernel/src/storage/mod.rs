//! Storage backends.
//!
//! A backend executes one [`QueryPlan`]: the page query, the count the
//! dataset asks for, and one batched lookup per eager-load directive.

pub mod memory;
pub mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::query::plan::QueryPlan;
use crate::query::row::Row;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

/// Faults raised while executing a plan.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    /// The server cancelled a statement at `statement_timeout`.
    #[error("statement cancelled by the server timeout")]
    StatementTimeout,

    #[error("cannot decode column '{column}': {details}")]
    Decode { column: String, details: String },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// SQLSTATE `query_canceled`.
const QUERY_CANCELED: &str = "57014";

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        let cancelled = err
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| code == QUERY_CANCELED);
        if cancelled {
            StorageError::StatementTimeout
        } else {
            StorageError::Database(err)
        }
    }
}

/// Size of the filtered set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowCount {
    Exact(u64),
    Estimated(u64),
}

impl RowCount {
    pub fn value(self) -> u64 {
        match self {
            RowCount::Exact(n) | RowCount::Estimated(n) => n,
        }
    }

    pub fn is_estimated(self) -> bool {
        matches!(self, RowCount::Estimated(_))
    }
}

/// Everything a backend returns for one plan.
#[derive(Debug, Clone, Default)]
pub struct FetchResult {
    /// Page rows in plan order, including the probe row if present.
    pub rows: Vec<Row>,
    /// Related records per eager-load relation name.
    pub related: HashMap<String, Vec<Row>>,
    /// `None` when the dataset counts returned rows only.
    pub count: Option<RowCount>,
}

/// Storage backend trait.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Execute a plan.
    async fn fetch(&self, plan: &QueryPlan) -> Result<FetchResult, StorageError>;

    /// Backend name for logs (e.g., "postgres", "memory").
    fn backend(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_stay_database_faults() {
        let err = StorageError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StorageError::Database(sqlx::Error::RowNotFound)));
    }
}
