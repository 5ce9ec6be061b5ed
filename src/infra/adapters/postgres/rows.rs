use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, Row as _};

use vecbench_app::query::{ROW_COLUMN, SqlParam};
use vecbench_domain::Row;

/// Attaches the positional parameters in order. Vectors are sent as
/// `float8[]`; the SQL casts them to `vector`.
pub fn bind_params<'q>(sql: &'q str, params: &'q [SqlParam]) -> Query<'q, Postgres, PgArguments> {
    params
        .iter()
        .fold(sqlx::query(sql), |query, param| match param {
            SqlParam::Text(value) => query.bind(value.as_str()),
            SqlParam::Int(value) => query.bind(*value),
            SqlParam::Vector(values) => query.bind(values.as_slice()),
        })
}

/// Unwraps the `jsonb` row object produced by the query builder.
pub fn decode_row(row: &PgRow) -> Result<Row, sqlx::Error> {
    let value: Value = row.try_get(ROW_COLUMN)?;
    object_or_error(value)
}

pub fn decode_count(row: &PgRow) -> Result<i64, sqlx::Error> {
    row.try_get(0)
}

fn object_or_error(value: Value) -> Result<Row, sqlx::Error> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(sqlx::Error::Decode(
            format!("expected a JSON object row, got {}", kind_of(&other)).into(),
        )),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
