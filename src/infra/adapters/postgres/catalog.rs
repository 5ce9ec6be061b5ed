//! Catalog queries behind vector-table discovery and table metadata.
//!
//! Catalog values are bound as parameters. The only names interpolated into
//! SQL text are ones that passed [`Identifier::parse`]; anything else is
//! skipped with a debug log.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use sqlx::PgConnection;
use tracing::debug;

use vecbench_domain::{
    Collection, Column, ColumnRef, Identifier, Index, QualifiedTable, Relationship, TableMetadata,
    VECTOR_UDT, VectorColumn, VectorTable, use_row_estimate,
};

const COLLECTION_ID_COLUMN: &str = "collection_id";
const COLLECTION_REGISTRY: &str = "langchain_pg_collection";

fn vector_columns_query() -> &'static str {
    r#"
    SELECT
        c.table_schema::text,
        c.table_name::text,
        c.column_name::text,
        c.udt_name::text
    FROM information_schema.columns c
    JOIN information_schema.tables t
      ON t.table_schema = c.table_schema
     AND t.table_name = c.table_name
    WHERE c.udt_name = 'vector'
      AND c.table_schema NOT IN ('information_schema', 'pg_catalog')
    ORDER BY c.table_schema, c.table_name, c.column_name
    "#
}

fn columns_query() -> &'static str {
    r#"
    SELECT
        column_name::text,
        data_type::text,
        udt_name::text,
        is_nullable = 'YES',
        ordinal_position::int4
    FROM information_schema.columns
    WHERE table_schema = $1 AND table_name = $2
    ORDER BY ordinal_position
    "#
}

fn references_query() -> &'static str {
    r#"
    SELECT
        c.column_name::text AS column_name,
        c.data_type::text AS data_type,
        ccu.table_schema::text AS ref_schema,
        ccu.table_name::text AS ref_table,
        ccu.column_name::text AS ref_column
    FROM information_schema.columns c
    LEFT JOIN information_schema.key_column_usage kcu
      ON c.table_schema = kcu.table_schema
     AND c.table_name = kcu.table_name
     AND c.column_name = kcu.column_name
    LEFT JOIN information_schema.referential_constraints rc
      ON kcu.constraint_name = rc.constraint_name
     AND kcu.constraint_schema = rc.constraint_schema
    LEFT JOIN information_schema.constraint_column_usage ccu
      ON rc.unique_constraint_name = ccu.constraint_name
     AND rc.unique_constraint_schema = ccu.constraint_schema
    WHERE c.table_schema = $1 AND c.table_name = $2
      AND (c.column_name ILIKE '%collection%id%'
           OR c.column_name ILIKE '%parent%id%'
           OR c.column_name ILIKE '%collection%name%'
           OR c.column_name ILIKE '%name%'
           OR ccu.table_name IS NOT NULL)
    ORDER BY c.ordinal_position
    "#
}

fn row_estimate_query() -> &'static str {
    r#"
    SELECT c.reltuples::bigint
    FROM pg_class c
    JOIN pg_namespace n ON n.oid = c.relnamespace
    WHERE n.nspname = $1 AND c.relname = $2 AND c.relkind = 'r'
    "#
}

fn relation_size_query() -> &'static str {
    r#"
    SELECT
        pg_total_relation_size(c.oid),
        pg_size_pretty(pg_total_relation_size(c.oid))
    FROM pg_class c
    JOIN pg_namespace n ON n.oid = c.relnamespace
    WHERE n.nspname = $1 AND c.relname = $2
    "#
}

fn indexes_query() -> &'static str {
    r#"
    SELECT indexname::text, indexdef
    FROM pg_indexes
    WHERE schemaname = $1 AND tablename = $2
    ORDER BY indexname
    "#
}

fn primary_key_query() -> &'static str {
    r#"
    SELECT a.attname::text
    FROM pg_index i
    JOIN pg_class c ON c.oid = i.indrelid
    JOIN pg_namespace n ON n.oid = c.relnamespace
    JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = ANY(i.indkey)
    WHERE i.indisprimary
      AND n.nspname = $1
      AND c.relname = $2
    ORDER BY array_position(i.indkey, a.attnum)
    "#
}

fn type_modifier_query() -> &'static str {
    r#"
    SELECT a.atttypmod
    FROM pg_attribute a
    JOIN pg_class c ON a.attrelid = c.oid
    JOIN pg_namespace n ON c.relnamespace = n.oid
    WHERE n.nspname = $1 AND c.relname = $2 AND a.attname = $3
    "#
}

fn collections_query(table: &QualifiedTable, has_metadata: bool) -> String {
    let sample_source = if has_metadata {
        format!(
            "(SELECT t2.cmetadata->>'source' FROM {table} AS t2 \
             WHERE t2.collection_id = t1.collection_id \
             AND t2.cmetadata->>'source' IS NOT NULL LIMIT 1)",
            table = table.quoted()
        )
    } else {
        "NULL::text".to_string()
    };
    format!(
        "SELECT t1.collection_id::text, COUNT(*), {sample_source} \
         FROM {table} AS t1 \
         WHERE t1.collection_id IS NOT NULL \
         GROUP BY t1.collection_id \
         ORDER BY 1",
        table = table.quoted()
    )
}

/// Vector tables with their vector columns, detected collections, and
/// relationships.
pub async fn vector_tables(conn: &mut PgConnection) -> Result<Vec<VectorTable>, sqlx::Error> {
    let rows: Vec<(String, String, String, String)> =
        sqlx::query_as(vector_columns_query()).fetch_all(&mut *conn).await?;
    let mut tables = group_vector_columns(rows);

    let known: BTreeSet<(String, String)> = tables
        .iter()
        .map(|t| (t.schema.clone(), t.name.clone()))
        .collect();

    for table in &mut tables {
        table.collections = collections(conn, table).await;

        let refs: Vec<ColumnReference> = sqlx::query_as(references_query())
            .bind(&table.schema)
            .bind(&table.name)
            .fetch_all(&mut *conn)
            .await?;
        table.relationships = classify_relationships(&refs, &known);
    }

    Ok(tables)
}

/// Rows must arrive ordered by schema and table.
fn group_vector_columns(rows: Vec<(String, String, String, String)>) -> Vec<VectorTable> {
    let mut tables: Vec<VectorTable> = Vec::new();
    for (schema, name, column, udt) in rows {
        let same_table = tables
            .last()
            .is_some_and(|t| t.schema == schema && t.name == name);
        if !same_table {
            tables.push(VectorTable::new(schema, name));
        }
        if let Some(table) = tables.last_mut() {
            table.vector_columns.push(VectorColumn {
                name: column,
                type_name: udt,
            });
        }
    }
    tables
}

/// Collection detection never fails discovery; a table whose collections
/// cannot be read reports none.
async fn collections(conn: &mut PgConnection, table: &VectorTable) -> Vec<Collection> {
    let Ok(qualified) = QualifiedTable::parse(&table.schema, &table.name) else {
        debug!(table = %table.qualified_name(), "Skipping collections for unquotable table");
        return Vec::new();
    };

    match load_collections(conn, &qualified).await {
        Ok(collections) => collections,
        Err(e) => {
            debug!(table = %qualified, error = %e, "Collection detection failed");
            Vec::new()
        }
    }
}

async fn load_collections(
    conn: &mut PgConnection,
    table: &QualifiedTable,
) -> Result<Vec<Collection>, sqlx::Error> {
    let columns = column_names(conn, table).await?;
    if !columns.contains(COLLECTION_ID_COLUMN) {
        return Ok(Vec::new());
    }

    let groups: Vec<(String, i64, Option<String>)> =
        sqlx::query_as(&collections_query(table, columns.contains("cmetadata")))
            .fetch_all(&mut *conn)
            .await?;
    if groups.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<String> = groups.iter().map(|(id, _, _)| id.clone()).collect();
    let registered = registered_collection_names(conn, &ids).await;

    Ok(groups
        .into_iter()
        .map(|(id, document_count, sample_source)| {
            let name = registered
                .get(&id)
                .cloned()
                .unwrap_or_else(|| Collection::fallback_name(&id, sample_source.as_deref()));
            Collection {
                id,
                name,
                document_count,
            }
        })
        .collect())
}

async fn column_names(
    conn: &mut PgConnection,
    table: &QualifiedTable,
) -> Result<BTreeSet<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT column_name::text FROM information_schema.columns \
         WHERE table_schema = $1 AND table_name = $2",
    )
    .bind(table.schema.as_str())
    .bind(table.table.as_str())
    .fetch_all(&mut *conn)
    .await
    .map(|names: Vec<String>| names.into_iter().collect())
}

async fn has_collection_registry(conn: &mut PgConnection) -> bool {
    sqlx::query_scalar::<_, bool>("SELECT to_regclass($1) IS NOT NULL")
        .bind(COLLECTION_REGISTRY)
        .fetch_one(&mut *conn)
        .await
        .unwrap_or(false)
}

async fn registered_collection_names(
    conn: &mut PgConnection,
    ids: &[String],
) -> HashMap<String, String> {
    if !has_collection_registry(conn).await {
        return HashMap::new();
    }
    let rows: Result<Vec<(String, String)>, _> = sqlx::query_as(
        "SELECT uuid::text, name::text FROM langchain_pg_collection WHERE uuid::text = ANY($1)",
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await;

    match rows {
        Ok(rows) => rows.into_iter().collect(),
        Err(e) => {
            debug!(error = %e, "Could not read collection registry");
            HashMap::new()
        }
    }
}

/// Display name for one collection id: the registry entry if there is one.
pub async fn registered_collection_name(conn: &mut PgConnection, id: &str) -> Option<String> {
    registered_collection_names(conn, &[id.to_string()])
        .await
        .remove(id)
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ColumnReference {
    column_name: String,
    data_type: String,
    ref_schema: Option<String>,
    ref_table: Option<String>,
    ref_column: Option<String>,
}

impl ColumnReference {
    #[cfg(test)]
    fn plain(column: &str, data_type: &str) -> Self {
        Self {
            column_name: column.to_string(),
            data_type: data_type.to_string(),
            ref_schema: None,
            ref_table: None,
            ref_column: None,
        }
    }
}

fn is_name_column(column: &str) -> bool {
    let lower = column.to_lowercase();
    (lower.contains("collection") && lower.contains("name"))
        || matches!(
            lower.as_str(),
            "name" | "title" | "display_name" | "collection_name"
        )
}

fn classify_relationships(
    refs: &[ColumnReference],
    vector_tables: &BTreeSet<(String, String)>,
) -> Vec<Relationship> {
    let name_column = refs
        .iter()
        .map(|r| r.column_name.as_str())
        .find(|c| is_name_column(c))
        .map(str::to_string);

    refs.iter()
        .filter_map(|r| match (&r.ref_schema, &r.ref_table, &r.ref_column) {
            (Some(schema), Some(table), column) => vector_tables
                .contains(&(schema.clone(), table.clone()))
                .then(|| Relationship::ForeignKey {
                    column: r.column_name.clone(),
                    references: ColumnRef {
                        schema: schema.clone(),
                        table: table.clone(),
                        column: column.clone().unwrap_or_default(),
                    },
                    name_column: name_column.clone(),
                }),
            _ => {
                let lower = r.column_name.to_lowercase();
                (lower.contains("collection") && r.column_name != COLLECTION_ID_COLUMN).then(
                    || Relationship::CollectionReference {
                        column: r.column_name.clone(),
                        data_type: r.data_type.clone(),
                        name_column: name_column.clone(),
                    },
                )
            }
        })
        .collect()
}

/// Row count, columns, per-vector-column dimensions, size, indexes, and
/// primary key for one table.
///
/// The planner estimate is reported when it reaches `precise_count_threshold`;
/// smaller tables are counted exactly.
pub async fn table_metadata(
    conn: &mut PgConnection,
    table: &QualifiedTable,
    precise_count_threshold: i64,
) -> Result<Option<TableMetadata>, sqlx::Error> {
    let schema = table.schema.as_str();
    let name = table.table.as_str();

    let columns: Vec<(String, String, String, bool, i32)> = sqlx::query_as(columns_query())
        .bind(schema)
        .bind(name)
        .fetch_all(&mut *conn)
        .await?;
    if columns.is_empty() {
        return Ok(None);
    }
    let columns: Vec<Column> = columns
        .into_iter()
        .map(
            |(name, data_type, udt_name, nullable, ordinal_position)| Column {
                name,
                data_type,
                udt_name,
                nullable,
                ordinal_position,
            },
        )
        .collect();

    let estimate: Option<i64> = sqlx::query_scalar(row_estimate_query())
        .bind(schema)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
    let (row_count, row_count_precise) = match estimate {
        Some(n) if use_row_estimate(Some(n), precise_count_threshold) => (n, false),
        _ => {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table.quoted()))
                .fetch_one(&mut *conn)
                .await?;
            (count, true)
        }
    };

    let mut vector_dimensions = BTreeMap::new();
    for column in columns.iter().filter(|c| c.udt_name == VECTOR_UDT) {
        let dims = vector_dimension(conn, table, &column.name).await?;
        vector_dimensions.insert(column.name.clone(), dims);
    }

    let (size_bytes, size_pretty): (i64, String) = sqlx::query_as(relation_size_query())
        .bind(schema)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?
        .unwrap_or((0, "0 bytes".to_string()));

    let indexes: Vec<(String, String)> = sqlx::query_as(indexes_query())
        .bind(schema)
        .bind(name)
        .fetch_all(&mut *conn)
        .await?;

    let primary_key: Vec<String> = sqlx::query_scalar(primary_key_query())
        .bind(schema)
        .bind(name)
        .fetch_all(&mut *conn)
        .await?;

    Ok(Some(TableMetadata {
        schema: schema.to_string(),
        table: name.to_string(),
        row_count,
        row_count_precise,
        columns,
        vector_dimensions,
        size_bytes,
        size_pretty,
        indexes: indexes
            .into_iter()
            .map(|(name, definition)| Index::from_definition(name, definition))
            .collect(),
        primary_key,
    }))
}

/// `vector_dims` on a sample value, falling back to the declared type
/// modifier (`vector(1536)`). `None` for an untyped, empty column.
async fn vector_dimension(
    conn: &mut PgConnection,
    table: &QualifiedTable,
    column: &str,
) -> Result<Option<i32>, sqlx::Error> {
    if let Ok(ident) = Identifier::parse(column) {
        let sql = format!(
            "SELECT vector_dims({col}) FROM {table} WHERE {col} IS NOT NULL LIMIT 1",
            col = ident.quoted(),
            table = table.quoted()
        );
        match sqlx::query_scalar::<_, i32>(&sql)
            .fetch_optional(&mut *conn)
            .await
        {
            Ok(Some(dims)) => return Ok(Some(dims)),
            Ok(None) => {}
            Err(e) => debug!(column, error = %e, "vector_dims failed, using type modifier"),
        }
    }

    let typmod: Option<i32> = sqlx::query_scalar(type_modifier_query())
        .bind(table.schema.as_str())
        .bind(table.table.as_str())
        .bind(column)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(typmod.filter(|m| *m > 0))
}

pub async fn collection_names(
    conn: &mut PgConnection,
    table: &QualifiedTable,
    id_column: &Identifier,
    name_column: &Identifier,
) -> Result<BTreeMap<String, String>, sqlx::Error> {
    let sql = format!(
        "SELECT DISTINCT t.{id}::text, t.{name}::text FROM {table} AS t \
         WHERE t.{id} IS NOT NULL AND t.{name} IS NOT NULL",
        id = id_column.quoted(),
        name = name_column.quoted(),
        table = table.quoted()
    );
    let rows: Vec<(String, String)> = sqlx::query_as(&sql).fetch_all(&mut *conn).await?;
    Ok(rows.into_iter().collect())
}

/// First vector column of the table in ordinal order.
pub async fn first_vector_column(
    conn: &mut PgConnection,
    table: &QualifiedTable,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT column_name::text FROM information_schema.columns \
         WHERE table_schema = $1 AND table_name = $2 AND udt_name = 'vector' \
         ORDER BY ordinal_position LIMIT 1",
    )
    .bind(table.schema.as_str())
    .bind(table.table.as_str())
    .fetch_optional(&mut *conn)
    .await
}

/// Text form of one non-null vector belonging to the collection.
pub async fn sample_vector(
    conn: &mut PgConnection,
    table: &QualifiedTable,
    vector_column: &Identifier,
    tenant_column: &Identifier,
    collection_id: &str,
) -> Result<Option<String>, sqlx::Error> {
    let sql = format!(
        "SELECT t.{vec}::text FROM {table} AS t \
         WHERE t.{tenant}::text = $1 AND t.{vec} IS NOT NULL LIMIT 1",
        vec = vector_column.quoted(),
        tenant = tenant_column.quoted(),
        table = table.quoted()
    );
    sqlx::query_scalar(&sql)
        .bind(collection_id)
        .fetch_optional(&mut *conn)
        .await
}
