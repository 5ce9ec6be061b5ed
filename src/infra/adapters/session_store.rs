use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use tracing::debug;

use vecbench_app::ports::{MAX_LISTED_SESSIONS, SessionStore, SessionStoreError};
use vecbench_domain::{DatabaseInfo, SessionKey, SessionName, SessionRecord, UserId};

use crate::config::sessions_file::{CURRENT_VERSION, SessionsFile};

const STORE_FILE_NAME: &str = "sessions.toml";

/// Session records in a single TOML file, rewritten on every change.
///
/// The file holds DSNs with passwords, so it is created owner-readable only.
pub struct TomlSessionStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TomlSessionStore {
    pub fn new() -> Result<Self, SessionStoreError> {
        Ok(Self::with_path(default_store_path()?))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_config_dir(config_dir: &Path) -> Self {
        Self::with_path(config_dir.join(STORE_FILE_NAME))
    }

    fn load(&self) -> Result<SessionsFile, SessionStoreError> {
        if !self.path.exists() {
            return Ok(SessionsFile::default());
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| SessionStoreError::ReadError(e.to_string()))?;
        let file: SessionsFile = toml::from_str(&content)
            .map_err(|e| SessionStoreError::InvalidFormat(e.to_string()))?;

        if file.version != CURRENT_VERSION {
            return Err(SessionStoreError::VersionMismatch {
                found: file.version,
                expected: CURRENT_VERSION,
            });
        }
        Ok(file)
    }

    fn save(&self, file: &SessionsFile) -> Result<(), SessionStoreError> {
        if let Some(dir) = self.path.parent()
            && !dir.exists()
        {
            fs::create_dir_all(dir).map_err(|e| SessionStoreError::IoError(e.to_string()))?;
        }

        let content = toml::to_string_pretty(file)
            .map_err(|e| SessionStoreError::WriteError(e.to_string()))?;
        let content_with_header = format!(
            "# vecbench sessions\n# WARNING: DSNs (including passwords) are stored in plain text\n\n{}",
            content
        );

        fs::write(&self.path, content_with_header)
            .map_err(|e| SessionStoreError::WriteError(e.to_string()))?;
        set_file_permissions(&self.path)?;
        debug!(path = %self.path.display(), sessions = file.sessions.len(), "Session store saved");
        Ok(())
    }

    /// Load, mutate, save, all under the write lock.
    fn update<T>(
        &self,
        change: impl FnOnce(&mut SessionsFile) -> Result<T, SessionStoreError>,
    ) -> Result<T, SessionStoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = self.load()?;
        let result = change(&mut file)?;
        self.save(&file)?;
        Ok(result)
    }
}

impl SessionStore for TomlSessionStore {
    fn find(&self, key: &SessionKey) -> Result<Option<SessionRecord>, SessionStoreError> {
        Ok(self
            .load()?
            .sessions
            .into_iter()
            .find(|record| record.key() == *key))
    }

    fn list(&self, user_id: &UserId) -> Result<Vec<SessionRecord>, SessionStoreError> {
        let mut records: Vec<SessionRecord> = self
            .load()?
            .sessions
            .into_iter()
            .filter(|record| &record.user_id == user_id)
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
        self.update(|file| {
            if file
                .sessions
                .iter()
                .any(|r| &r.user_id == user_id && r.name == name)
            {
                return Err(SessionStoreError::DuplicateName(name.to_string()));
            }
            let record = SessionRecord::new(user_id.clone(), name, dsn);
            file.sessions.push(record.clone());
            Ok(record)
        })
    }

    fn delete(&self, key: &SessionKey) -> Result<bool, SessionStoreError> {
        self.update(|file| {
            let before = file.sessions.len();
            file.sessions.retain(|record| record.key() != *key);
            Ok(file.sessions.len() != before)
        })
    }

    fn touch(&self, key: &SessionKey, info: &DatabaseInfo) -> Result<(), SessionStoreError> {
        self.update(|file| {
            let record = file
                .sessions
                .iter_mut()
                .find(|record| record.key() == *key)
                .ok_or_else(|| SessionStoreError::NotFound(key.to_string()))?;
            record.last_used_at = SystemTime::now();
            record.last_db_name = Some(info.database_name.clone());
            record.last_db_version = Some(info.version.clone());
            Ok(())
        })
    }

    fn storage_path(&self) -> PathBuf {
        self.path.clone()
    }
}

pub fn default_store_path() -> Result<PathBuf, SessionStoreError> {
    let config_base = dirs::config_dir()
        .ok_or_else(|| SessionStoreError::IoError("Could not find config directory".into()))?;
    Ok(config_base.join("vecbench").join(STORE_FILE_NAME))
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), SessionStoreError> {
    use std::os::unix::fs::PermissionsExt;
    let perms = fs::Permissions::from_mode(0o600);
    fs::set_permissions(path, perms).map_err(|e| SessionStoreError::IoError(e.to_string()))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), SessionStoreError> {
    Ok(())
}
