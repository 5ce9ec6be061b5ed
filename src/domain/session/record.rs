use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::id::{SessionId, SessionKey, UserId};
use super::name::SessionName;

/// A user's registered target database as kept by the metadata store.
///
/// The record outlives any live pool: the registry only reads `dsn` from it
/// to materialize a connection manager on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub user_id: UserId,
    pub name: SessionName,
    pub dsn: String,
    pub created_at: SystemTime,
    pub last_used_at: SystemTime,
    #[serde(default)]
    pub last_db_name: Option<String>,
    #[serde(default)]
    pub last_db_version: Option<String>,
}

impl SessionRecord {
    pub fn new(user_id: UserId, name: SessionName, dsn: impl Into<String>) -> Self {
        let now = SystemTime::now();
        Self {
            id: SessionId::new(),
            user_id,
            name,
            dsn: dsn.into(),
            created_at: now,
            last_used_at: now,
            last_db_name: None,
            last_db_version: None,
        }
    }

    pub fn key(&self) -> SessionKey {
        SessionKey::new(self.user_id.clone(), self.id.clone())
    }
}

/// Listing view of a session; never carries the DSN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: SessionId,
    pub name: SessionName,
    pub created_at: SystemTime,
    pub last_used_at: SystemTime,
    pub last_db_name: Option<String>,
    pub last_db_version: Option<String>,
}

impl From<&SessionRecord> for SessionSummary {
    fn from(record: &SessionRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            created_at: record.created_at,
            last_used_at: record.last_used_at,
            last_db_name: record.last_db_name.clone(),
            last_db_version: record.last_db_version.clone(),
        }
    }
}
