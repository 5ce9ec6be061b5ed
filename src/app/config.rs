use std::time::Duration;

use serde::Deserialize;

use crate::query::QueryLimits;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub min_connections: u32,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub idle_lifetime_secs: u64,
    pub statement_timeout_ms: u64,
    pub application_name: String,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            min_connections: 1,
            max_connections: 8,
            acquire_timeout_secs: 10,
            connect_timeout_secs: 10,
            idle_lifetime_secs: 180,
            statement_timeout_ms: 60_000,
            application_name: "vecbench".to_string(),
        }
    }
}

impl PoolSettings {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn idle_lifetime(&self) -> Duration {
        Duration::from_secs(self.idle_lifetime_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub tables_ttl_secs: u64,
    pub table_metadata_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            tables_ttl_secs: 60,
            table_metadata_ttl_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReaperSettings {
    pub interval_secs: u64,
    pub probe_timeout_secs: u64,
    pub idle_threshold_secs: u64,
}

impl Default for ReaperSettings {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            probe_timeout_secs: 5,
            idle_threshold_secs: 1800,
        }
    }
}

impl ReaperSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_threshold_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    pub max_limit: i64,
    pub default_limit: i64,
    pub precise_count_threshold: i64,
    /// Column compared against the tenant filter value.
    pub tenant_column: String,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            max_limit: 100,
            default_limit: 20,
            precise_count_threshold: 1_000_000,
            tenant_column: "collection_id".to_string(),
        }
    }
}

impl QuerySettings {
    pub fn limits(&self) -> QueryLimits {
        QueryLimits {
            max_limit: self.max_limit,
            default_limit: self.default_limit,
        }
    }
}
