use std::path::PathBuf;

use vecbench_domain::{DatabaseInfo, SessionKey, SessionName, SessionRecord, UserId};

/// Upper bound on sessions returned by [`SessionStore::list`].
pub const MAX_LISTED_SESSIONS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionStoreError {
    #[error("Store version mismatch: found {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },
    #[error("Read error: {0}")]
    ReadError(String),
    #[error("Write error: {0}")]
    WriteError(String),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Session name already exists: {0}")]
    DuplicateName(String),
    #[error("Session not found: {0}")]
    NotFound(String),
}

/// Persistent registry of user sessions (target DSNs). Live connections are
/// never stored here; the registry only reads the DSN back out.
#[cfg_attr(test, mockall::automock)]
pub trait SessionStore: Send + Sync {
    fn find(&self, key: &SessionKey) -> Result<Option<SessionRecord>, SessionStoreError>;

    /// Most recently used first, at most [`MAX_LISTED_SESSIONS`] entries.
    fn list(&self, user_id: &UserId) -> Result<Vec<SessionRecord>, SessionStoreError>;

    fn create(
        &self,
        user_id: &UserId,
        name: SessionName,
        dsn: &str,
    ) -> Result<SessionRecord, SessionStoreError>;

    /// Returns false when nothing matched.
    fn delete(&self, key: &SessionKey) -> Result<bool, SessionStoreError>;

    /// Records a successful connect: bumps last-used time and caches the
    /// database name and version.
    fn touch(&self, key: &SessionKey, info: &DatabaseInfo) -> Result<(), SessionStoreError>;

    fn storage_path(&self) -> PathBuf;
}
