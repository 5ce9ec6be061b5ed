//! In-memory port implementations for tests.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use vecbench_domain::{
    CollectionInfo, ConnectionCheck, DatabaseInfo, Identifier, PoolStats, QualifiedTable, Row,
    SessionKey, SessionName, SessionRecord, TableMetadata, UserId, VectorTable,
};

use crate::connection_error::ConnectionErrorInfo;
use crate::ports::{
    ConnectionFactory, MAX_LISTED_SESSIONS, SessionStore, SessionStoreError, TargetConnection,
    TargetError,
};
use crate::query::{BuiltQuery, SqlParam};

/// Knobs and counters shared by every [`FakeTarget`] a factory produces.
#[derive(Debug, Default)]
pub struct FakeBehavior {
    pub connect_calls: AtomicUsize,
    pub disconnect_calls: AtomicUsize,
    pub test_calls: AtomicUsize,
    pub fail_connect: AtomicBool,
    pub unhealthy: AtomicBool,
    pub hang_tests: AtomicBool,
    pub connect_delay_ms: AtomicUsize,
    pub idle_secs: AtomicUsize,
    pub rows: Mutex<Vec<Row>>,
    pub queries: Mutex<Vec<BuiltQuery>>,
    pub tables: Mutex<Vec<VectorTable>>,
    pub discovery_calls: AtomicUsize,
}

impl FakeBehavior {
    pub fn connects(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn set_rows(&self, rows: Vec<Row>) {
        *self.rows.lock().unwrap() = rows;
    }

    pub fn recorded_queries(&self) -> Vec<BuiltQuery> {
        self.queries.lock().unwrap().clone()
    }
}

/// A target that answers from memory. Queries are recorded, and rows are
/// served by applying the trailing bound `LIMIT`/`OFFSET` integers to the
/// configured row set.
pub struct FakeTarget {
    behavior: Arc<FakeBehavior>,
    connected: AtomicBool,
}

impl FakeTarget {
    pub fn new(behavior: Arc<FakeBehavior>) -> Self {
        Self {
            behavior,
            connected: AtomicBool::new(false),
        }
    }

    fn ensure_connected(&self) -> Result<(), TargetError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TargetError::NotConnected)
        }
    }
}

pub fn fake_database_info() -> DatabaseInfo {
    DatabaseInfo {
        database_name: "docs".to_string(),
        version: "PostgreSQL 16.2".to_string(),
        vector_extension: Some("0.7.0".to_string()),
    }
}

#[async_trait]
impl TargetConnection for FakeTarget {
    async fn connect(&self, dsn: &str) -> Result<(), ConnectionErrorInfo> {
        self.behavior.connect_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.behavior.connect_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        if self.behavior.fail_connect.load(Ordering::SeqCst) {
            return Err(ConnectionErrorInfo::new(format!(
                "failed to connect to {}: password authentication failed",
                dsn
            )));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {
        self.behavior.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn test_connection(&self) -> ConnectionCheck {
        self.behavior.test_calls.fetch_add(1, Ordering::SeqCst);
        if self.behavior.hang_tests.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if !self.is_connected() {
            return ConnectionCheck::failed("not connected");
        }
        if self.behavior.unhealthy.load(Ordering::SeqCst) {
            return ConnectionCheck::failed("server closed the connection unexpectedly");
        }
        ConnectionCheck::Healthy(fake_database_info())
    }

    fn pool_stats(&self) -> Option<PoolStats> {
        self.is_connected().then(|| PoolStats::new(1, 1, 8))
    }

    fn idle_for(&self) -> Duration {
        Duration::from_secs(self.behavior.idle_secs.load(Ordering::SeqCst) as u64)
    }

    async fn list_vector_tables(&self) -> Result<Vec<VectorTable>, TargetError> {
        self.ensure_connected()?;
        self.behavior.discovery_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.behavior.tables.lock().unwrap().clone())
    }

    async fn table_metadata(&self, table: &QualifiedTable) -> Result<TableMetadata, TargetError> {
        self.ensure_connected()?;
        self.behavior.discovery_calls.fetch_add(1, Ordering::SeqCst);
        Ok(TableMetadata {
            schema: table.schema.to_string(),
            table: table.table.to_string(),
            row_count: self.behavior.rows.lock().unwrap().len() as i64,
            row_count_precise: true,
            columns: vec![],
            vector_dimensions: BTreeMap::new(),
            size_bytes: 0,
            size_pretty: "0 bytes".to_string(),
            indexes: vec![],
            primary_key: vec![],
        })
    }

    async fn collection_names(
        &self,
        _table: &QualifiedTable,
        _id_column: &Identifier,
        _name_column: &Identifier,
    ) -> Result<BTreeMap<String, String>, TargetError> {
        self.ensure_connected()?;
        Ok(BTreeMap::new())
    }

    async fn collection_info(
        &self,
        _table: &QualifiedTable,
        collection_id: &str,
    ) -> Result<CollectionInfo, TargetError> {
        self.ensure_connected()?;
        Err(TargetError::NotFound(format!(
            "No vectors found for collection {}",
            collection_id
        )))
    }

    async fn fetch_rows(&self, query: &BuiltQuery) -> Result<Vec<Row>, TargetError> {
        self.ensure_connected()?;
        self.behavior.queries.lock().unwrap().push(query.clone());

        let ints: Vec<i64> = query
            .params
            .iter()
            .filter_map(|p| match p {
                SqlParam::Int(n) => Some(*n),
                _ => None,
            })
            .collect();
        let (limit, offset) = match ints.as_slice() {
            [.., limit, offset] => (*limit, *offset),
            [limit] => (*limit, 0),
            [] => (i64::MAX, 0),
        };

        let rows = self.behavior.rows.lock().unwrap();
        Ok(rows
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn fetch_count(&self, query: &BuiltQuery) -> Result<i64, TargetError> {
        self.ensure_connected()?;
        self.behavior.queries.lock().unwrap().push(query.clone());
        Ok(self.behavior.rows.lock().unwrap().len() as i64)
    }
}

#[derive(Default)]
pub struct FakeFactory {
    pub behavior: Arc<FakeBehavior>,
    pub created: AtomicUsize,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConnectionFactory for FakeFactory {
    fn create(&self) -> Arc<dyn TargetConnection> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Arc::new(FakeTarget::new(Arc::clone(&self.behavior)))
    }
}

#[derive(Default)]
pub struct InMemorySessionStore {
    records: Mutex<HashMap<SessionKey, SessionRecord>>,
    pub touches: AtomicUsize,
    pub fail_touch: AtomicBool,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session and returns its key.
    pub fn seed(&self, user: &str, name: &str, dsn: &str) -> SessionKey {
        let record = SessionRecord::new(
            UserId::from_string(user),
            SessionName::new(name).unwrap(),
            dsn,
        );
        let key = record.key();
        self.records.lock().unwrap().insert(key.clone(), record);
        key
    }
}

impl SessionStore for InMemorySessionStore {
    fn find(&self, key: &SessionKey) -> Result<Option<SessionRecord>, SessionStoreError> {
        Ok(self.records.lock().unwrap().get(key).cloned())
    }

    fn list(&self, user_id: &UserId) -> Result<Vec<SessionRecord>, SessionStoreError> {
        let mut records: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| &r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at));
        records.truncate(MAX_LISTED_SESSIONS);
        Ok(records)
    }

    fn create(
        &self,
        user_id: &UserId,
        name: SessionName,
        dsn: &str,
    ) -> Result<SessionRecord, SessionStoreError> {
        let record = SessionRecord::new(user_id.clone(), name, dsn);
        self.records
            .lock()
            .unwrap()
            .insert(record.key(), record.clone());
        Ok(record)
    }

    fn delete(&self, key: &SessionKey) -> Result<bool, SessionStoreError> {
        Ok(self.records.lock().unwrap().remove(key).is_some())
    }

    fn touch(&self, key: &SessionKey, info: &DatabaseInfo) -> Result<(), SessionStoreError> {
        self.touches.fetch_add(1, Ordering::SeqCst);
        if self.fail_touch.load(Ordering::SeqCst) {
            return Err(SessionStoreError::WriteError("disk full".to_string()));
        }
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(key)
            .ok_or_else(|| SessionStoreError::NotFound(key.to_string()))?;
        record.last_used_at = SystemTime::now();
        record.last_db_name = Some(info.database_name.clone());
        record.last_db_version = Some(info.version.clone());
        Ok(())
    }

    fn storage_path(&self) -> PathBuf {
        PathBuf::from(":memory:")
    }
}
