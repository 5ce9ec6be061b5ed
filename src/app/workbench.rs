//! The operations offered to the outer surface, one method per operation.
//!
//! Inputs are validated before any session is touched, so a rejected request
//! never reaches the target database.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument};

use vecbench_domain::{
    CollectionInfo, DatabaseInfo, Identifier, PoolStats, QualifiedTable, Row, SearchInfo,
    SearchResult, SessionKey, SessionName, SessionSummary, SortOrder, TableMetadata, TablePage,
    UserId, VectorTable, decode_vector_strings,
};

use crate::config::QuerySettings;
use crate::error::{ErrorReport, WorkbenchError};
use crate::query::{
    PageRequest, QueryLimits, SearchParams, SearchRequest, TableDataParams, count_query,
    page_query, search_query,
};
use crate::registry::SessionRegistry;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResult {
    pub connected: bool,
    pub database_info: Option<DatabaseInfo>,
    pub error: Option<ErrorReport>,
}

pub struct Workbench {
    registry: Arc<SessionRegistry>,
    limits: QueryLimits,
    tenant_column: Identifier,
}

impl Workbench {
    pub fn new(
        registry: Arc<SessionRegistry>,
        settings: &QuerySettings,
    ) -> Result<Self, WorkbenchError> {
        Ok(Self {
            registry,
            limits: settings.limits(),
            tenant_column: Identifier::parse(&settings.tenant_column)?,
        })
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Never fails; the outcome (including a classified error) is reported
    /// in the result.
    #[instrument(skip(self), fields(session = %key))]
    pub async fn connect(&self, key: &SessionKey) -> ConnectResult {
        match self.registry.connect(key).await {
            Ok((_, info)) => ConnectResult {
                connected: true,
                database_info: Some(info),
                error: None,
            },
            Err(err) => ConnectResult {
                connected: false,
                database_info: None,
                error: Some(ErrorReport::from(&err)),
            },
        }
    }

    pub async fn disconnect(&self, key: &SessionKey) {
        if self.registry.evict(key).await {
            info!(session = %key, "Session disconnected");
        }
    }

    pub async fn list_vector_tables(
        &self,
        key: &SessionKey,
    ) -> Result<Vec<VectorTable>, WorkbenchError> {
        let manager = self.registry.get_or_create(key).await?;
        Ok(manager.list_vector_tables().await?)
    }

    pub async fn table_metadata(
        &self,
        key: &SessionKey,
        schema: &str,
        table: &str,
    ) -> Result<TableMetadata, WorkbenchError> {
        let table = QualifiedTable::parse(schema, table)?;
        let manager = self.registry.get_or_create(key).await?;
        Ok(manager.table_metadata(&table).await?)
    }

    #[instrument(skip(self, params), fields(session = %key, table = %params.table))]
    pub async fn table_data(
        &self,
        key: &SessionKey,
        params: &TableDataParams,
    ) -> Result<TablePage, WorkbenchError> {
        let request = PageRequest::validate(params, &self.tenant_column, &self.limits)?;
        let count = count_query(&request.table, request.tenant.as_ref());
        let page = page_query(&request);

        let manager = self.registry.get_or_create(key).await?;
        let total = manager.fetch_count(&count).await?;
        let rows = decode_rows(manager.fetch_rows(&page).await?);
        debug!(total, returned = rows.len(), "Fetched table page");

        Ok(TablePage::new(rows, total, request.limit, request.offset))
    }

    #[instrument(skip(self, params), fields(session = %key, table = %params.table))]
    pub async fn search(
        &self,
        key: &SessionKey,
        params: &SearchParams,
    ) -> Result<SearchResult, WorkbenchError> {
        let request = SearchRequest::validate(params, &self.tenant_column, &self.limits)?;
        let query = search_query(&request);
        let count = count_query(&request.table, request.tenant.as_ref());

        let manager = self.registry.get_or_create(key).await?;
        let rows = decode_rows(manager.fetch_rows(&query).await?);
        let total_available = manager.fetch_count(&count).await?;
        debug!(
            returned = rows.len(),
            total_available,
            vector = request.has_similarity_score(),
            "Search complete"
        );

        let query_info = SearchInfo {
            text_query: params.text_query.clone(),
            search_column: params.search_column.clone(),
            vector_query_provided: params.vector_query.is_some(),
            vector_column: params.vector_column.clone(),
            limit: request.limit,
            metric: params.metric,
            sort_by: request.sort.as_ref().map(|s| s.column.to_string()),
            sort_order: request
                .sort
                .as_ref()
                .map_or(SortOrder::Asc, |s| s.order),
            has_similarity_score: request.has_similarity_score(),
            tenant_filter: request.tenant.as_ref().map(|t| t.value.clone()),
            results_returned: rows.len(),
            total_available,
        };
        Ok(SearchResult {
            data: rows,
            query_info,
        })
    }

    pub async fn collection_names(
        &self,
        key: &SessionKey,
        schema: &str,
        table: &str,
        id_column: &str,
        name_column: &str,
    ) -> Result<BTreeMap<String, String>, WorkbenchError> {
        let table = QualifiedTable::parse(schema, table)?;
        let id_column = Identifier::parse(id_column)?;
        let name_column = Identifier::parse(name_column)?;
        let manager = self.registry.get_or_create(key).await?;
        Ok(manager
            .collection_names(&table, &id_column, &name_column)
            .await?)
    }

    pub async fn collection_info(
        &self,
        key: &SessionKey,
        schema: &str,
        table: &str,
        collection_id: &str,
    ) -> Result<CollectionInfo, WorkbenchError> {
        let table = QualifiedTable::parse(schema, table)?;
        let manager = self.registry.get_or_create(key).await?;
        Ok(manager.collection_info(&table, collection_id).await?)
    }

    /// Reports on the live pool only; never connects.
    pub async fn pool_stats(&self, key: &SessionKey) -> Result<PoolStats, WorkbenchError> {
        self.registry
            .get(key)
            .await
            .and_then(|manager| manager.pool_stats())
            .ok_or_else(|| {
                WorkbenchError::ConnectionUnavailable(format!("no live pool for {}", key))
            })
    }

    /// Like [`Self::pool_stats`], but opens or re-verifies the session first.
    /// For callers that do not keep a registry alive between requests.
    pub async fn connected_pool_stats(
        &self,
        key: &SessionKey,
    ) -> Result<PoolStats, WorkbenchError> {
        let manager = self.registry.get_or_create(key).await?;
        manager.pool_stats().ok_or_else(|| {
            WorkbenchError::ConnectionUnavailable(format!("no live pool for {}", key))
        })
    }

    pub fn list_sessions(&self, user_id: &UserId) -> Result<Vec<SessionSummary>, WorkbenchError> {
        Ok(self
            .registry
            .store()
            .list(user_id)?
            .iter()
            .map(SessionSummary::from)
            .collect())
    }

    pub fn create_session(
        &self,
        user_id: &UserId,
        name: &str,
        dsn: &str,
    ) -> Result<SessionSummary, WorkbenchError> {
        let name = SessionName::new(name)?;
        let record = self.registry.store().create(user_id, name, dsn)?;
        info!(session = %record.key(), "Session registered");
        Ok(SessionSummary::from(&record))
    }

    /// Drops the live connection (if any) and forgets the session.
    pub async fn delete_session(&self, key: &SessionKey) -> Result<(), WorkbenchError> {
        self.registry.evict(key).await;
        if self.registry.store().delete(key)? {
            info!(session = %key, "Session deleted");
            Ok(())
        } else {
            Err(WorkbenchError::SessionNotFound(key.clone()))
        }
    }
}

fn decode_rows(rows: Vec<Row>) -> Vec<Row> {
    rows.into_iter().map(decode_vector_strings).collect()
}
