use serde::Serialize;

/// What a successful liveness probe learned about the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInfo {
    pub database_name: String,
    pub version: String,
    /// Installed pgvector version, if the extension is present.
    pub vector_extension: Option<String>,
}

impl DatabaseInfo {
    pub fn has_vector_extension(&self) -> bool {
        self.vector_extension.is_some()
    }
}

/// Outcome of `test_connection`. Probes never fail with an error value;
/// they report failure through this type instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ConnectionCheck {
    Healthy(DatabaseInfo),
    Failed { error: String },
}

impl ConnectionCheck {
    pub fn failed(error: impl Into<String>) -> Self {
        ConnectionCheck::Failed {
            error: error.into(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, ConnectionCheck::Healthy(_))
    }

    pub fn database_info(&self) -> Option<&DatabaseInfo> {
        match self {
            ConnectionCheck::Healthy(info) => Some(info),
            ConnectionCheck::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub size: u32,
    pub idle_size: u32,
    pub max_size: u32,
    pub active_connections: u32,
}

impl PoolStats {
    pub fn new(size: u32, idle_size: u32, max_size: u32) -> Self {
        Self {
            size,
            idle_size,
            max_size,
            active_connections: size.saturating_sub(idle_size),
        }
    }
}
