use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use vecbench_domain::{
    CollectionInfo, ConnectionCheck, Identifier, PoolStats, QualifiedTable, Row, TableMetadata,
    VectorTable,
};

use crate::connection_error::ConnectionErrorInfo;
use crate::query::BuiltQuery;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("not connected")]
    NotConnected,

    #[error(
        "connection pool exhausted after {waited:?} (size {size}, idle {idle}, max {max})"
    )]
    PoolExhausted {
        size: u32,
        idle: u32,
        max: u32,
        waited: Duration,
    },

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Query(String),

    #[error("{0}")]
    NotFound(String),
}

/// One pooled connection to one target database.
///
/// Implementations serialize `connect`/`disconnect` so a single instance
/// never owns two pools, and clear any discovery cache on disconnect.
#[async_trait]
pub trait TargetConnection: Send + Sync {
    /// Replaces any existing pool. On failure no pool is left behind.
    async fn connect(&self, dsn: &str) -> Result<(), ConnectionErrorInfo>;

    /// Idempotent.
    async fn disconnect(&self);

    fn is_connected(&self) -> bool;

    /// Liveness plus capability probe. Never returns an error value.
    async fn test_connection(&self) -> ConnectionCheck;

    /// `None` when there is no pool. Never acquires a connection.
    fn pool_stats(&self) -> Option<PoolStats>;

    /// Time since the last acquisition or transition.
    fn idle_for(&self) -> Duration;

    async fn list_vector_tables(&self) -> Result<Vec<VectorTable>, TargetError>;

    async fn table_metadata(&self, table: &QualifiedTable) -> Result<TableMetadata, TargetError>;

    async fn collection_names(
        &self,
        table: &QualifiedTable,
        id_column: &Identifier,
        name_column: &Identifier,
    ) -> Result<BTreeMap<String, String>, TargetError>;

    async fn collection_info(
        &self,
        table: &QualifiedTable,
        collection_id: &str,
    ) -> Result<CollectionInfo, TargetError>;

    async fn fetch_rows(&self, query: &BuiltQuery) -> Result<Vec<Row>, TargetError>;

    async fn fetch_count(&self, query: &BuiltQuery) -> Result<i64, TargetError>;
}

/// Builds fresh, disconnected connection managers for the registry.
pub trait ConnectionFactory: Send + Sync {
    fn create(&self) -> Arc<dyn TargetConnection>;
}
