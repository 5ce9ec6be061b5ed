use std::time::{SystemTime, UNIX_EPOCH};

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};

pub const TABLE: &str = "docs";
pub const MAIN_TENANT: &str = "abc";
pub const MAIN_TENANT_ROWS: i64 = 45;
pub const OTHER_TENANT: &str = "xyz";
pub const OTHER_TENANT_ROWS: i64 = 5;

/// A throwaway schema holding one `docs` table:
/// `id` 1..=50, the first 45 rows in tenant `abc` and the rest in `xyz`,
/// with `embedding = [id, 1, 0]`.
pub struct TestSchema {
    pub name: String,
    pool: PgPool,
}

impl TestSchema {
    pub async fn create(dsn: &str) -> TestSchema {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(dsn)
            .await
            .unwrap();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .subsec_nanos();
        let name = format!("vb_it_{}_{}", std::process::id(), nanos);

        // Parallel tests may race on this; the CREATE TABLE below fails
        // loudly if the extension is really missing.
        let _ = pool.execute("CREATE EXTENSION IF NOT EXISTS vector").await;
        pool.execute(format!("CREATE SCHEMA {name}").as_str())
            .await
            .unwrap();
        pool.execute(
            format!(
                "CREATE TABLE {name}.{TABLE} (
                    id integer PRIMARY KEY,
                    collection_id text NOT NULL,
                    title text NOT NULL,
                    embedding vector(3)
                )"
            )
            .as_str(),
        )
        .await
        .unwrap();
        pool.execute(
            format!(
                "INSERT INTO {name}.{TABLE}
                 SELECT g,
                        CASE WHEN g <= {MAIN_TENANT_ROWS} THEN '{MAIN_TENANT}' ELSE '{OTHER_TENANT}' END,
                        'doc ' || g,
                        ARRAY[g::float8, 1, 0]::vector
                 FROM generate_series(1, {total}) AS g",
                total = MAIN_TENANT_ROWS + OTHER_TENANT_ROWS
            )
            .as_str(),
        )
        .await
        .unwrap();

        TestSchema { name, pool }
    }

    pub async fn drop(self) {
        self.pool
            .execute(format!("DROP SCHEMA {} CASCADE", self.name).as_str())
            .await
            .unwrap();
        self.pool.close().await;
    }
}
