//! The database seam consumed by the extraction engine.
//!
//! The engine never talks to a driver directly; it takes an injected
//! [`DataSource`] so the HTTP wiring can hand it a real client and the
//! tests an in-memory fake. Schema/table enumeration comes from the static
//! catalog, so live introspection is column-level only.

use async_trait::async_trait;
use thiserror::Error;

use crate::resolver::LiveColumn;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SourceError {
    #[error("Schema introspection failed: {0}")]
    Introspection(String),
    #[error("Database query failed: {0}")]
    Query(String),
}

/// A query-executing database handle.
///
/// Implementations are expected to be cheap to use per-call (pooled or
/// clonable clients); the engine checks a connection out per table query,
/// never across the whole multi-table loop.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Live columns (name + declared type) for a schema-qualified table.
    async fn list_columns(&self, schema: &str, table: &str)
        -> Result<Vec<LiveColumn>, SourceError>;

    /// Execute a SELECT and return its rows as JSON objects keyed by the
    /// database column names.
    async fn fetch_rows(
        &self,
        sql: &str,
    ) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, SourceError>;
}
