//! SQL text plus positional parameters for the three read shapes.
//!
//! Identifiers arrive pre-validated and are quoted into the text; values
//! (tenant ids, search terms, vectors, limits) are always bound. Every row is
//! selected as a single `jsonb` column so tables of unknown shape decode
//! uniformly.

use vecbench_domain::{QualifiedTable, SIMILARITY_SCORE};

use super::descriptor::{EqualityFilter, PageRequest, SearchRequest, SortSpec, TextFilter};

/// Alias of the target table in every generated statement.
const TABLE_ALIAS: &str = "t";

/// Name of the single output column carrying the row object.
pub const ROW_COLUMN: &str = "row_data";

#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
    /// Bound as `float8[]` and cast to `vector` in SQL.
    Vector(Vec<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

#[derive(Default)]
struct Params(Vec<SqlParam>);

impl Params {
    fn bind(&mut self, param: SqlParam) -> String {
        self.0.push(param);
        format!("${}", self.0.len())
    }
}

fn column_ref(column: &vecbench_domain::Identifier) -> String {
    format!("{}.{}", TABLE_ALIAS, column.quoted())
}

fn equality(filter: &EqualityFilter, params: &mut Params) -> String {
    let placeholder = params.bind(SqlParam::Text(filter.value.clone()));
    format!("{}::text = {}", column_ref(&filter.column), placeholder)
}

/// Makes `%`, `_` and `\` in a search term match literally under
/// `ESCAPE '\'`.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn substring(filter: &TextFilter, params: &mut Params) -> String {
    let placeholder = params.bind(SqlParam::Text(escape_like(&filter.term)));
    format!(
        "{}::text ILIKE ('%' || {} || '%') ESCAPE '\\'",
        column_ref(&filter.column),
        placeholder
    )
}

fn where_clause(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

fn order_by(sort: Option<&SortSpec>) -> String {
    sort.map(|s| format!(" ORDER BY {} {}", column_ref(&s.column), s.order.as_sql()))
        .unwrap_or_default()
}

fn from_clause(table: &QualifiedTable) -> String {
    format!("FROM {} AS {}", table.quoted(), TABLE_ALIAS)
}

/// `SELECT ... [WHERE tenant] [ORDER BY col dir] LIMIT n OFFSET m`.
pub fn page_query(req: &PageRequest) -> BuiltQuery {
    let mut params = Params::default();
    let mut conditions = Vec::new();
    if let Some(tenant) = &req.tenant {
        conditions.push(equality(tenant, &mut params));
    }
    let limit = params.bind(SqlParam::Int(req.limit));
    let offset = params.bind(SqlParam::Int(req.offset));

    let sql = format!(
        "SELECT to_jsonb({alias}) AS {ROW_COLUMN} {from}{filter}{order} LIMIT {limit} OFFSET {offset}",
        alias = TABLE_ALIAS,
        from = from_clause(&req.table),
        filter = where_clause(&conditions),
        order = order_by(req.sort.as_ref()),
    );
    BuiltQuery {
        sql,
        params: params.0,
    }
}

/// Row count under the same tenant filter a page or search would use.
pub fn count_query(table: &QualifiedTable, tenant: Option<&EqualityFilter>) -> BuiltQuery {
    let mut params = Params::default();
    let conditions: Vec<String> = tenant
        .into_iter()
        .map(|t| equality(t, &mut params))
        .collect();

    BuiltQuery {
        sql: format!(
            "SELECT COUNT(*) {}{}",
            from_clause(table),
            where_clause(&conditions)
        ),
        params: params.0,
    }
}

/// Hybrid text search or vector similarity search.
///
/// With a vector filter the rows carry a `similarity_score` (higher is more
/// similar) and are ordered by ascending raw distance; the caller's sort is
/// ignored. Without one, the caller's sort applies and no score is emitted.
pub fn search_query(req: &SearchRequest) -> BuiltQuery {
    let mut params = Params::default();

    let (select, order) = match &req.vector {
        Some(vector) => {
            let placeholder = params.bind(SqlParam::Vector(vector.query.to_vec()));
            let distance = format!(
                "({} {} {}::float8[]::vector)",
                column_ref(&vector.column),
                vector.metric.operator(),
                placeholder
            );
            let select = format!(
                "to_jsonb({}) || jsonb_build_object('{}', {})",
                TABLE_ALIAS,
                SIMILARITY_SCORE,
                vector.metric.similarity_sql(&distance)
            );
            (select, format!(" ORDER BY {}", distance))
        }
        None => (
            format!("to_jsonb({})", TABLE_ALIAS),
            order_by(req.sort.as_ref()),
        ),
    };

    let mut conditions = Vec::new();
    if let Some(tenant) = &req.tenant {
        conditions.push(equality(tenant, &mut params));
    }
    if let Some(text) = &req.text {
        conditions.push(substring(text, &mut params));
    }
    for filter in &req.filters {
        conditions.push(equality(filter, &mut params));
    }
    let limit = params.bind(SqlParam::Int(req.limit));

    BuiltQuery {
        sql: format!(
            "SELECT {select} AS {ROW_COLUMN} {from}{filter}{order} LIMIT {limit}",
            from = from_clause(&req.table),
            filter = where_clause(&conditions),
        ),
        params: params.0,
    }
}
