mod catalog;
mod rows;

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::Postgres;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use vecbench_app::config::{CacheSettings, PoolSettings};
use vecbench_app::connection_error::{ConnectionErrorInfo, ConnectionErrorKind, mask_password};
use vecbench_app::metadata_cache::MetadataCache;
use vecbench_app::ports::{ConnectionFactory, TargetConnection, TargetError};
use vecbench_app::query::BuiltQuery;
use vecbench_domain::{
    Collection, CollectionInfo, ConnectionCheck, DatabaseInfo, Identifier, PoolStats,
    QualifiedTable, QueryVector, Row, TableMetadata, VectorTable,
};

/// Number of leading values reported in [`CollectionInfo::sample_embedding`].
const SAMPLE_VALUES: usize = 5;

/// SQLSTATE raised when `statement_timeout` cancels a query.
const QUERY_CANCELED: &str = "57014";

/// Everything a manager needs besides the DSN.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub pool: PoolSettings,
    pub cache: CacheSettings,
    pub precise_count_threshold: i64,
    pub tenant_column: Identifier,
}

/// A pool of connections to one target database.
///
/// `connect` and `disconnect` are serialized by `transition`; readers clone
/// the pool handle out of `pool` and never hold the lock across an await.
pub struct PgConnectionManager {
    settings: ManagerSettings,
    pool: RwLock<Option<PgPool>>,
    transition: tokio::sync::Mutex<()>,
    last_activity: Mutex<Instant>,
    cache: MetadataCache,
}

impl PgConnectionManager {
    pub fn new(settings: ManagerSettings) -> Self {
        let cache = MetadataCache::new(&settings.cache);
        Self {
            settings,
            pool: RwLock::new(None),
            transition: tokio::sync::Mutex::new(()),
            last_activity: Mutex::new(Instant::now()),
            cache,
        }
    }

    fn current_pool(&self) -> Option<PgPool> {
        self.pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_pool(&self, pool: Option<PgPool>) -> Option<PgPool> {
        let mut guard = self.pool.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, pool)
    }

    fn mark_active(&self) {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn connect_options(&self, dsn: &str) -> Result<PgConnectOptions, ConnectionErrorInfo> {
        let options = PgConnectOptions::from_str(dsn)
            .map_err(|e| ConnectionErrorInfo::new(e.to_string()))?;
        Ok(options
            .application_name(&self.settings.pool.application_name)
            .options([(
                "statement_timeout",
                format!("{}ms", self.settings.pool.statement_timeout_ms),
            )]))
    }

    async fn open_pool(&self, dsn: &str) -> Result<PgPool, ConnectionErrorInfo> {
        let pool_settings = &self.settings.pool;
        let options = self.connect_options(dsn)?;
        let builder = PgPoolOptions::new()
            .min_connections(pool_settings.min_connections)
            .max_connections(pool_settings.max_connections.max(1))
            .acquire_timeout(pool_settings.acquire_timeout())
            .idle_timeout(Some(pool_settings.idle_lifetime()));

        let pool = match timeout(pool_settings.connect_timeout(), builder.connect_with(options))
            .await
        {
            Ok(Ok(pool)) => pool,
            Ok(Err(e)) => return Err(ConnectionErrorInfo::new(e.to_string())),
            Err(_) => {
                return Err(ConnectionErrorInfo::with_kind(
                    ConnectionErrorKind::Timeout,
                    format!(
                        "no connection within {}s",
                        pool_settings.connect_timeout_secs
                    ),
                ));
            }
        };

        if let Err(e) = sqlx::query("SELECT 1").execute(&pool).await {
            pool.close().await;
            return Err(ConnectionErrorInfo::new(e.to_string()));
        }
        Ok(pool)
    }

    /// Checks out one connection for caller work and counts as activity.
    async fn acquire(&self) -> Result<PoolConnection<Postgres>, TargetError> {
        let conn = self.checkout().await;
        self.mark_active();
        conn
    }

    /// Checks out one connection without touching the idle clock. It returns
    /// to the pool when dropped, on every exit path including cancellation.
    async fn checkout(&self) -> Result<PoolConnection<Postgres>, TargetError> {
        let pool = self.current_pool().ok_or(TargetError::NotConnected)?;
        let started = Instant::now();

        match pool.acquire().await {
            Ok(conn) => Ok(conn),
            Err(sqlx::Error::PoolTimedOut) => {
                let stats = stats_for(&pool);
                warn!(
                    size = stats.size,
                    idle = stats.idle_size,
                    max = stats.max_size,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "Connection pool exhausted"
                );
                Err(TargetError::PoolExhausted {
                    size: stats.size,
                    idle: stats.idle_size,
                    max: stats.max_size,
                    waited: started.elapsed(),
                })
            }
            Err(sqlx::Error::PoolClosed) => Err(TargetError::NotConnected),
            Err(e) => Err(self.query_error(e)),
        }
    }

    fn query_error(&self, err: sqlx::Error) -> TargetError {
        match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(QUERY_CANCELED) => {
                TargetError::Timeout(Duration::from_millis(
                    self.settings.pool.statement_timeout_ms,
                ))
            }
            sqlx::Error::PoolClosed => TargetError::NotConnected,
            _ => TargetError::Query(mask_password(&err.to_string())),
        }
    }

    /// Health checks must not keep an otherwise idle session alive.
    async fn probe(&self) -> Result<DatabaseInfo, TargetError> {
        let mut conn = self.checkout().await?;
        let (database_name, version, vector_extension): (String, String, Option<String>) =
            sqlx::query_as(
                "SELECT current_database()::text, version(), \
                 (SELECT extversion FROM pg_extension WHERE extname = 'vector')",
            )
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| self.query_error(e))?;
        Ok(DatabaseInfo {
            database_name,
            version,
            vector_extension,
        })
    }

    async fn discover_tables(&self) -> Result<Vec<VectorTable>, TargetError> {
        let mut conn = self.acquire().await?;
        let tables = catalog::vector_tables(&mut conn)
            .await
            .map_err(|e| self.query_error(e))?;
        debug!(count = tables.len(), "Discovered vector tables");
        Ok(tables)
    }

    async fn discover_metadata(&self, table: &QualifiedTable) -> Result<TableMetadata, TargetError> {
        let mut conn = self.acquire().await?;
        catalog::table_metadata(&mut conn, table, self.settings.precise_count_threshold)
            .await
            .map_err(|e| self.query_error(e))?
            .ok_or_else(|| TargetError::NotFound(format!("Table {} not found", table)))
    }
}

fn stats_for(pool: &PgPool) -> PoolStats {
    PoolStats::new(
        pool.size(),
        pool.num_idle() as u32,
        pool.options().get_max_connections(),
    )
}

#[async_trait]
impl TargetConnection for PgConnectionManager {
    async fn connect(&self, dsn: &str) -> Result<(), ConnectionErrorInfo> {
        let _transition = self.transition.lock().await;

        if let Some(previous) = self.replace_pool(None) {
            previous.close().await;
        }
        self.cache.clear().await;

        let pool = self.open_pool(dsn).await.inspect_err(|err| {
            warn!(kind = ?err.kind, error = %err, "Failed to open pool");
        })?;
        self.replace_pool(Some(pool));
        self.mark_active();

        info!(
            target_dsn = %mask_password(dsn),
            max_connections = self.settings.pool.max_connections,
            "Connection pool opened"
        );
        Ok(())
    }

    async fn disconnect(&self) {
        let _transition = self.transition.lock().await;
        if let Some(pool) = self.replace_pool(None) {
            pool.close().await;
            debug!("Connection pool closed");
        }
        self.cache.clear().await;
    }

    fn is_connected(&self) -> bool {
        self.current_pool().is_some_and(|pool| !pool.is_closed())
    }

    async fn test_connection(&self) -> ConnectionCheck {
        match self.probe().await {
            Ok(info) => ConnectionCheck::Healthy(info),
            Err(e) => ConnectionCheck::failed(e.to_string()),
        }
    }

    fn pool_stats(&self) -> Option<PoolStats> {
        self.current_pool().as_ref().map(stats_for)
    }

    fn idle_for(&self) -> Duration {
        self.last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    async fn list_vector_tables(&self) -> Result<Vec<VectorTable>, TargetError> {
        self.cache.vector_tables(|| self.discover_tables()).await
    }

    async fn table_metadata(&self, table: &QualifiedTable) -> Result<TableMetadata, TargetError> {
        self.cache
            .table_metadata(table, || self.discover_metadata(table))
            .await
    }

    async fn collection_names(
        &self,
        table: &QualifiedTable,
        id_column: &Identifier,
        name_column: &Identifier,
    ) -> Result<BTreeMap<String, String>, TargetError> {
        let mut conn = self.acquire().await?;
        catalog::collection_names(&mut conn, table, id_column, name_column)
            .await
            .map_err(|e| self.query_error(e))
    }

    async fn collection_info(
        &self,
        table: &QualifiedTable,
        collection_id: &str,
    ) -> Result<CollectionInfo, TargetError> {
        let no_vectors =
            || TargetError::NotFound(format!("No vectors found for collection {}", collection_id));

        let mut conn = self.acquire().await?;
        let vector_column = catalog::first_vector_column(&mut conn, table)
            .await
            .map_err(|e| self.query_error(e))?
            .and_then(|name| Identifier::parse(name).ok())
            .ok_or_else(no_vectors)?;

        let sample = catalog::sample_vector(
            &mut conn,
            table,
            &vector_column,
            &self.settings.tenant_column,
            collection_id,
        )
        .await
        .map_err(|e| self.query_error(e))?
        .ok_or_else(no_vectors)?;

        let vector = QueryVector::parse_literal(&sample)
            .map_err(|e| TargetError::Query(format!("Unreadable vector value: {}", e)))?;
        let collection_name = catalog::registered_collection_name(&mut conn, collection_id)
            .await
            .unwrap_or_else(|| Collection::fallback_name(collection_id, None));

        Ok(CollectionInfo {
            collection_id: collection_id.to_string(),
            collection_name,
            vector_dimensions: vector.dimensions(),
            sample_embedding: vector.as_slice().iter().take(SAMPLE_VALUES).copied().collect(),
        })
    }

    async fn fetch_rows(&self, query: &BuiltQuery) -> Result<Vec<Row>, TargetError> {
        let mut conn = self.acquire().await?;
        let fetched = rows::bind_params(&query.sql, &query.params)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| self.query_error(e))?;
        fetched
            .iter()
            .map(rows::decode_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.query_error(e))
    }

    async fn fetch_count(&self, query: &BuiltQuery) -> Result<i64, TargetError> {
        let mut conn = self.acquire().await?;
        let row = rows::bind_params(&query.sql, &query.params)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| self.query_error(e))?;
        rows::decode_count(&row).map_err(|e| self.query_error(e))
    }
}

/// Builds disconnected [`PgConnectionManager`]s for the session registry.
pub struct PgConnectionFactory {
    settings: ManagerSettings,
}

impl PgConnectionFactory {
    pub fn new(settings: ManagerSettings) -> Self {
        Self { settings }
    }
}

impl ConnectionFactory for PgConnectionFactory {
    fn create(&self) -> Arc<dyn TargetConnection> {
        Arc::new(PgConnectionManager::new(self.settings.clone()))
    }
}
