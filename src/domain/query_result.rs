use serde::Serialize;
use serde_json::{Map, Value};

use super::metric::DistanceMetric;
use super::sort::SortOrder;

/// One result row keyed by column name.
pub type Row = Map<String, Value>;

/// Column name under which vector searches report the derived score.
pub const SIMILARITY_SCORE: &str = "similarity_score";

/// Replaces textual vectors such as `"[0.1,0.2]"` with JSON number arrays.
/// Strings that merely look bracketed but do not parse stay untouched.
pub fn decode_vector_strings(row: Row) -> Row {
    row.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) if s.starts_with('[') && s.ends_with(']') => {
                    match serde_json::from_str::<Vec<f64>>(&s) {
                        Ok(values) => Value::from(values),
                        Err(_) => Value::String(s),
                    }
                }
                other => other,
            };
            (key, value)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePage {
    pub data: Vec<Row>,
    pub total_count: i64,
    pub page_size: i64,
    pub offset: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl TablePage {
    pub fn new(data: Vec<Row>, total_count: i64, limit: i64, offset: i64) -> Self {
        Self {
            data,
            total_count,
            page_size: limit,
            offset,
            has_next: offset.saturating_add(limit) < total_count,
            has_previous: offset > 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchInfo {
    pub text_query: Option<String>,
    pub search_column: Option<String>,
    pub vector_query_provided: bool,
    pub vector_column: Option<String>,
    pub limit: i64,
    pub metric: DistanceMetric,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
    pub has_similarity_score: bool,
    pub tenant_filter: Option<String>,
    pub results_returned: usize,
    pub total_available: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub data: Vec<Row>,
    pub query_info: SearchInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionInfo {
    pub collection_id: String,
    pub collection_name: String,
    pub vector_dimensions: usize,
    pub sample_embedding: Vec<f64>,
}
