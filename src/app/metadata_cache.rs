use std::future::Future;
use std::time::Duration;

use vecbench_domain::{QualifiedTable, TableMetadata, VectorTable};

use crate::cache::TtlCache;
use crate::config::CacheSettings;

/// Discovery results for one connection manager.
///
/// Owned by a single manager and cleared wholesale when it disconnects, so
/// nothing learned about one target survives a reconnect.
pub struct MetadataCache {
    tables: TtlCache<(), Vec<VectorTable>>,
    table_metadata: TtlCache<QualifiedTable, TableMetadata>,
}

impl MetadataCache {
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            tables: TtlCache::new(Duration::from_secs(settings.tables_ttl_secs)),
            table_metadata: TtlCache::new(Duration::from_secs(settings.table_metadata_ttl_secs)),
        }
    }

    pub async fn vector_tables<F, Fut, E>(&self, discover: F) -> Result<Vec<VectorTable>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<VectorTable>, E>>,
    {
        self.tables.get_or_compute((), discover).await
    }

    pub async fn table_metadata<F, Fut, E>(
        &self,
        table: &QualifiedTable,
        discover: F,
    ) -> Result<TableMetadata, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TableMetadata, E>>,
    {
        self.table_metadata
            .get_or_compute(table.clone(), discover)
            .await
    }

    pub async fn clear(&self) {
        self.tables.clear().await;
        self.table_metadata.clear().await;
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new(&CacheSettings::default())
    }
}
