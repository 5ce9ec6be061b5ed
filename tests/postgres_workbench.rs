mod harness;

use std::time::Duration;

use futures::future::join_all;
use serde_json::json;

use harness::fixtures::{
    MAIN_TENANT, MAIN_TENANT_ROWS, OTHER_TENANT, OTHER_TENANT_ROWS, TABLE, TestSchema,
};
use harness::{bench_for, database_url};

use vecbench::app::ErrorKind;
use vecbench::app::query::{SearchParams, TableDataParams};
use vecbench::domain::{DistanceMetric, SIMILARITY_SCORE};

fn page_params(schema: &str, offset: i64) -> TableDataParams {
    TableDataParams {
        schema: schema.to_string(),
        table: TABLE.to_string(),
        limit: Some(20),
        offset,
        sort_by: Some("id".to_string()),
        sort_order: Some("asc".to_string()),
        tenant_filter: Some(MAIN_TENANT.to_string()),
    }
}

#[tokio::test]
async fn pages_concatenate_to_the_tenant_rows() {
    let Some(dsn) = database_url() else { return };
    let schema = TestSchema::create(&dsn).await;
    let bench = bench_for(&dsn);

    let mut ids = Vec::new();
    let mut offset = 0;
    loop {
        let page = bench
            .workbench
            .table_data(&bench.key, &page_params(&schema.name, offset))
            .await
            .unwrap();
        assert_eq!(page.total_count, MAIN_TENANT_ROWS);
        ids.extend(page.data.iter().map(|row| row["id"].as_i64().unwrap()));
        if !page.has_next {
            break;
        }
        offset += 20;
    }

    assert_eq!(ids, (1..=MAIN_TENANT_ROWS).collect::<Vec<_>>());
    schema.drop().await;
}

#[tokio::test]
async fn last_page_is_partial() {
    let Some(dsn) = database_url() else { return };
    let schema = TestSchema::create(&dsn).await;
    let bench = bench_for(&dsn);

    let page = bench
        .workbench
        .table_data(&bench.key, &page_params(&schema.name, 40))
        .await
        .unwrap();

    assert_eq!(page.data.len(), 5);
    assert!(!page.has_next);
    assert!(page.has_previous);
    assert_eq!(page.data[0]["embedding"], json!([41.0, 1.0, 0.0]));
    schema.drop().await;
}

#[tokio::test]
async fn vector_search_ranks_by_similarity_within_tenant() {
    let Some(dsn) = database_url() else { return };
    let schema = TestSchema::create(&dsn).await;
    let bench = bench_for(&dsn);

    let params = SearchParams {
        schema: schema.name.clone(),
        table: TABLE.to_string(),
        vector_column: Some("embedding".to_string()),
        vector_query: Some(vec![1.0, 0.0, 0.0]),
        metric: DistanceMetric::Cosine,
        limit: Some(10),
        tenant_filter: Some(OTHER_TENANT.to_string()),
        ..Default::default()
    };
    let result = bench.workbench.search(&bench.key, &params).await.unwrap();

    assert!(result.query_info.has_similarity_score);
    assert_eq!(result.query_info.results_returned, OTHER_TENANT_ROWS as usize);
    assert_eq!(result.query_info.total_available, OTHER_TENANT_ROWS);
    assert_eq!(result.data[0]["id"], json!(50));

    let scores: Vec<f64> = result
        .data
        .iter()
        .map(|row| row[SIMILARITY_SCORE].as_f64().unwrap())
        .collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    schema.drop().await;
}

#[tokio::test]
async fn text_search_with_filters() {
    let Some(dsn) = database_url() else { return };
    let schema = TestSchema::create(&dsn).await;
    let bench = bench_for(&dsn);

    let params = SearchParams {
        schema: schema.name.clone(),
        table: TABLE.to_string(),
        text_query: Some("doc 4".to_string()),
        search_column: Some("title".to_string()),
        filters: [("collection_id".to_string(), MAIN_TENANT.to_string())].into(),
        sort_by: Some("id".to_string()),
        ..Default::default()
    };
    let result = bench.workbench.search(&bench.key, &params).await.unwrap();

    let ids: Vec<i64> = result
        .data
        .iter()
        .map(|row| row["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![4, 40, 41, 42, 43, 44, 45]);
    schema.drop().await;
}

#[tokio::test]
async fn injected_sort_column_is_rejected_and_table_survives() {
    let Some(dsn) = database_url() else { return };
    let schema = TestSchema::create(&dsn).await;
    let bench = bench_for(&dsn);

    let params = TableDataParams {
        sort_by: Some(format!("id; DROP TABLE {}.{}", schema.name, TABLE)),
        ..page_params(&schema.name, 0)
    };
    let err = bench
        .workbench
        .table_data(&bench.key, &params)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);

    let page = bench
        .workbench
        .table_data(&bench.key, &page_params(&schema.name, 0))
        .await
        .unwrap();
    assert_eq!(page.total_count, MAIN_TENANT_ROWS);
    schema.drop().await;
}

#[tokio::test]
async fn metadata_describes_the_vector_column() {
    let Some(dsn) = database_url() else { return };
    let schema = TestSchema::create(&dsn).await;
    let bench = bench_for(&dsn);

    let metadata = bench
        .workbench
        .table_metadata(&bench.key, &schema.name, TABLE)
        .await
        .unwrap();

    assert_eq!(metadata.row_count, MAIN_TENANT_ROWS + OTHER_TENANT_ROWS);
    assert!(metadata.row_count_precise);
    assert_eq!(metadata.vector_dimensions.get("embedding"), Some(&Some(3)));
    assert_eq!(metadata.primary_key, vec!["id".to_string()]);
    assert_eq!(metadata.columns.len(), 4);

    let tables = bench.workbench.list_vector_tables(&bench.key).await.unwrap();
    let docs = tables
        .iter()
        .find(|t| t.schema == schema.name && t.name == TABLE)
        .unwrap();
    assert_eq!(docs.vector_columns.len(), 1);
    assert_eq!(docs.collections.len(), 2);
    schema.drop().await;
}

#[tokio::test]
async fn collection_info_samples_one_vector() {
    let Some(dsn) = database_url() else { return };
    let schema = TestSchema::create(&dsn).await;
    let bench = bench_for(&dsn);

    let info = bench
        .workbench
        .collection_info(&bench.key, &schema.name, TABLE, OTHER_TENANT)
        .await
        .unwrap();
    assert_eq!(info.vector_dimensions, 3);
    assert_eq!(info.collection_name, format!("Collection {}", OTHER_TENANT));

    let missing = bench
        .workbench
        .collection_info(&bench.key, &schema.name, TABLE, "nope")
        .await
        .unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::QueryFailure);
    schema.drop().await;
}

#[tokio::test]
async fn concurrent_first_use_shares_one_pool_and_returns_connections() {
    let Some(dsn) = database_url() else { return };
    let schema = TestSchema::create(&dsn).await;
    let bench = bench_for(&dsn);

    let params = page_params(&schema.name, 0);
    let results = join_all((0..16).map(|_| bench.workbench.table_data(&bench.key, &params))).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(bench.registry.list_live().len(), 1);

    // Released connections go back to the pool on a background task.
    let mut stats = bench.workbench.pool_stats(&bench.key).await.unwrap();
    for _ in 0..50 {
        if stats.active_connections == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        stats = bench.workbench.pool_stats(&bench.key).await.unwrap();
    }
    assert_eq!(stats.active_connections, 0);
    assert!(stats.size <= stats.max_size);
    schema.drop().await;
}

#[tokio::test]
async fn disconnect_then_reuse_reconnects_transparently() {
    let Some(dsn) = database_url() else { return };
    let schema = TestSchema::create(&dsn).await;
    let bench = bench_for(&dsn);

    let first = bench.workbench.connect(&bench.key).await;
    assert!(first.connected);
    bench.workbench.disconnect(&bench.key).await;
    assert!(bench.workbench.pool_stats(&bench.key).await.is_err());

    let page = bench
        .workbench
        .table_data(&bench.key, &page_params(&schema.name, 0))
        .await
        .unwrap();
    assert_eq!(page.data.len(), 20);
    schema.drop().await;
}
