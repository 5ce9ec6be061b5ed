pub mod fixtures;

use std::sync::Arc;

use tempfile::TempDir;

use vecbench::app::config::QuerySettings;
use vecbench::app::registry::SessionRegistry;
use vecbench::app::Workbench;
use vecbench::domain::{Identifier, SessionKey, UserId};
use vecbench::infra::{AppConfig, ManagerSettings, PgConnectionFactory, TomlSessionStore};

/// Database-backed tests are skipped unless this points at a PostgreSQL
/// server with the pgvector extension available.
pub const DATABASE_URL_ENV: &str = "VECBENCH_TEST_DATABASE_URL";

pub fn database_url() -> Option<String> {
    std::env::var(DATABASE_URL_ENV)
        .ok()
        .filter(|url| !url.trim().is_empty())
}

pub struct TestBench {
    pub workbench: Workbench,
    pub registry: Arc<SessionRegistry>,
    pub key: SessionKey,
    _store_dir: TempDir,
}

/// A workbench over a real pool factory and a temp-dir session store, with
/// one session registered for `dsn`.
pub fn bench_for(dsn: &str) -> TestBench {
    let config = AppConfig::default();
    let store_dir = TempDir::new().unwrap();
    let store = TomlSessionStore::with_config_dir(store_dir.path());
    let factory = PgConnectionFactory::new(ManagerSettings {
        pool: config.pool.clone(),
        cache: config.cache.clone(),
        precise_count_threshold: config.query.precise_count_threshold,
        tenant_column: Identifier::parse(&config.query.tenant_column).unwrap(),
    });
    let registry = Arc::new(SessionRegistry::new(Arc::new(store), Arc::new(factory)));
    let workbench = Workbench::new(Arc::clone(&registry), &QuerySettings::default()).unwrap();

    let user = UserId::from_string("it");
    let summary = workbench.create_session(&user, "integration", dsn).unwrap();

    TestBench {
        workbench,
        registry,
        key: SessionKey::new(user, summary.id),
        _store_dir: store_dir,
    }
}
