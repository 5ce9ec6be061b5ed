//! Raw request parameters and their validated counterparts.
//!
//! The builder only accepts the validated types, so no name reaches SQL text
//! without passing [`Identifier::parse`].

use std::collections::BTreeMap;

use serde::Deserialize;

use vecbench_domain::{DistanceMetric, Identifier, QualifiedTable, QueryVector, SortOrder};

use crate::error::WorkbenchError;

/// Result size bounds applied regardless of what the caller asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub max_limit: i64,
    pub default_limit: i64,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            max_limit: 100,
            default_limit: 20,
        }
    }
}

impl QueryLimits {
    pub fn clamp(&self, requested: Option<i64>) -> i64 {
        let max = self.max_limit.max(1);
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, max)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDataParams {
    pub schema: String,
    pub table: String,
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: i64,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub tenant_filter: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub schema: String,
    pub table: String,
    pub text_query: Option<String>,
    pub search_column: Option<String>,
    pub vector_column: Option<String>,
    pub vector_query: Option<Vec<f64>>,
    #[serde(default)]
    pub metric: DistanceMetric,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub limit: Option<i64>,
    pub tenant_filter: Option<String>,
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub column: Identifier,
    pub order: SortOrder,
}

/// Equality on a validated column against a bound text value.
#[derive(Debug, Clone, PartialEq)]
pub struct EqualityFilter {
    pub column: Identifier,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextFilter {
    pub column: Identifier,
    pub term: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorFilter {
    pub column: Identifier,
    pub query: QueryVector,
    pub metric: DistanceMetric,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub table: QualifiedTable,
    pub limit: i64,
    pub offset: i64,
    pub sort: Option<SortSpec>,
    pub tenant: Option<EqualityFilter>,
}

impl PageRequest {
    pub fn validate(
        params: &TableDataParams,
        tenant_column: &Identifier,
        limits: &QueryLimits,
    ) -> Result<Self, WorkbenchError> {
        Ok(Self {
            table: QualifiedTable::parse(&params.schema, &params.table)?,
            limit: limits.clamp(params.limit),
            offset: params.offset.max(0),
            sort: sort_spec(params.sort_by.as_deref(), params.sort_order.as_deref())?,
            tenant: tenant_filter(tenant_column, params.tenant_filter.as_deref()),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub table: QualifiedTable,
    pub text: Option<TextFilter>,
    pub vector: Option<VectorFilter>,
    pub tenant: Option<EqualityFilter>,
    pub filters: Vec<EqualityFilter>,
    pub sort: Option<SortSpec>,
    pub limit: i64,
}

impl SearchRequest {
    /// Every supplied column name is validated, even one that would end up
    /// unused because its companion value is missing.
    pub fn validate(
        params: &SearchParams,
        tenant_column: &Identifier,
        limits: &QueryLimits,
    ) -> Result<Self, WorkbenchError> {
        let table = QualifiedTable::parse(&params.schema, &params.table)?;
        let search_column = params
            .search_column
            .as_deref()
            .map(Identifier::parse)
            .transpose()?;
        let vector_column = params
            .vector_column
            .as_deref()
            .map(Identifier::parse)
            .transpose()?;

        let text = match (search_column, non_blank(params.text_query.as_deref())) {
            (Some(column), Some(term)) => Some(TextFilter {
                column,
                term: term.to_string(),
            }),
            _ => None,
        };

        let vector = match (&params.vector_query, vector_column) {
            (Some(values), Some(column)) => Some(VectorFilter {
                column,
                query: QueryVector::new(values.clone())?,
                metric: params.metric,
            }),
            (Some(_), None) => {
                return Err(WorkbenchError::Validation(
                    "vector query requires a vector column".to_string(),
                ));
            }
            (None, _) => None,
        };

        let filters = params
            .filters
            .iter()
            .map(|(column, value)| -> Result<EqualityFilter, WorkbenchError> {
                Ok(EqualityFilter {
                    column: Identifier::parse(column)?,
                    value: value.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            table,
            text,
            vector,
            tenant: tenant_filter(tenant_column, params.tenant_filter.as_deref()),
            filters,
            sort: sort_spec(params.sort_by.as_deref(), params.sort_order.as_deref())?,
            limit: limits.clamp(params.limit),
        })
    }

    pub fn has_similarity_score(&self) -> bool {
        self.vector.is_some()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn sort_spec(
    sort_by: Option<&str>,
    sort_order: Option<&str>,
) -> Result<Option<SortSpec>, WorkbenchError> {
    match non_blank(sort_by) {
        Some(column) => Ok(Some(SortSpec {
            column: Identifier::parse(column)?,
            order: SortOrder::from_param(sort_order),
        })),
        None => Ok(None),
    }
}

fn tenant_filter(column: &Identifier, value: Option<&str>) -> Option<EqualityFilter> {
    non_blank(value).map(|v| EqualityFilter {
        column: column.clone(),
        value: v.to_string(),
    })
}
