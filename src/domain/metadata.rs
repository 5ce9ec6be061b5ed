use std::collections::BTreeMap;

use serde::Serialize;

use super::column::Column;
use super::index::Index;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMetadata {
    pub schema: String,
    pub table: String,
    pub row_count: i64,
    pub row_count_precise: bool,
    pub columns: Vec<Column>,
    /// Dimension per vector column; `None` when it could not be determined.
    pub vector_dimensions: BTreeMap<String, Option<i32>>,
    pub size_bytes: i64,
    pub size_pretty: String,
    pub indexes: Vec<Index>,
    pub primary_key: Vec<String>,
}

impl TableMetadata {
    pub fn vector_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_vector())
    }

    pub fn has_vector_index(&self) -> bool {
        self.indexes.iter().any(|i| i.vector_index_type.is_some())
    }
}

/// Decides whether the planner estimate is good enough to report as the row
/// count. Large tables report the estimate; everything else gets `COUNT(*)`.
pub fn use_row_estimate(estimate: Option<i64>, threshold: i64) -> bool {
    matches!(estimate, Some(n) if n >= threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some(2_500_000), true)]
    #[case(Some(1_000_000), true)]
    #[case(Some(999_999), false)]
    #[case(Some(-1), false)]
    #[case(None, false)]
    fn estimate_used_only_at_or_above_threshold(
        #[case] estimate: Option<i64>,
        #[case] expected: bool,
    ) {
        assert_eq!(use_row_estimate(estimate, 1_000_000), expected);
    }

    #[test]
    fn vector_index_detection() {
        let metadata = TableMetadata {
            schema: "public".to_string(),
            table: "docs".to_string(),
            row_count: 10,
            row_count_precise: true,
            columns: vec![],
            vector_dimensions: BTreeMap::new(),
            size_bytes: 8192,
            size_pretty: "8192 bytes".to_string(),
            indexes: vec![Index::from_definition(
                "docs_embedding_idx",
                "CREATE INDEX docs_embedding_idx ON public.docs USING ivfflat (embedding)",
            )],
            primary_key: vec!["id".to_string()],
        };
        assert!(metadata.has_vector_index());
    }
}
