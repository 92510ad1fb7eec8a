//! Normalized execution results
//!
//! Every execution, scalar or tabular, produces the same shape: success
//! flag, data, optional column list, row count and wall-clock duration.
//! Results are created per call and owned by the caller, never cached.

use chrono::NaiveDate;
use duckdb::types::{TimeUnit, Value};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};

/// Days between 0001-01-01 (CE) and the Unix epoch
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Uniform result of one macro execution
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub success: bool,

    /// A single scalar value, or an array of row arrays for table macros
    pub data: JsonValue,

    /// Column names, present only for table macros
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,

    pub row_count: usize,

    pub execution_time_ms: f64,
}

impl ExecutionResult {
    /// Result for a scalar macro: the single cell of the single row, or
    /// null with row_count 0 when no row came back.
    pub fn scalar(value: JsonValue, execution_time_ms: f64) -> Self {
        let row_count = usize::from(!value.is_null());
        Self {
            success: true,
            data: value,
            columns: None,
            row_count,
            execution_time_ms,
        }
    }

    /// Result for a table macro: all rows plus the column name list
    pub fn table(rows: Vec<Vec<JsonValue>>, columns: Vec<String>, execution_time_ms: f64) -> Self {
        let row_count = rows.len();
        Self {
            success: true,
            data: JsonValue::Array(rows.into_iter().map(JsonValue::Array).collect()),
            columns: Some(columns),
            row_count,
            execution_time_ms,
        }
    }
}

/// Render one driver cell as JSON. Temporal values become readable text;
/// exotic types fall back to their debug rendering rather than failing the
/// whole result.
pub fn cell_to_json(value: Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(b) => json!(b),
        Value::TinyInt(i) => json!(i),
        Value::SmallInt(i) => json!(i),
        Value::Int(i) => json!(i),
        Value::BigInt(i) => json!(i),
        Value::HugeInt(i) => json!(i.to_string()),
        Value::UTinyInt(i) => json!(i),
        Value::USmallInt(i) => json!(i),
        Value::UInt(i) => json!(i),
        Value::UBigInt(i) => json!(i),
        Value::Float(f) => json!(f),
        Value::Double(f) => json!(f),
        Value::Decimal(d) => json!(d.to_string()),
        Value::Text(s) => JsonValue::String(s),
        Value::Blob(bytes) => json!(bytes),
        Value::Date32(days) => date_to_json(days),
        Value::Timestamp(unit, amount) => timestamp_to_json(unit, amount),
        Value::Time64(unit, amount) => timestamp_to_json(unit, amount),
        Value::List(items) => JsonValue::Array(items.into_iter().map(cell_to_json).collect()),
        Value::Enum(tag) => JsonValue::String(tag),
        other => JsonValue::String(format!("{:?}", other)),
    }
}

fn date_to_json(days_since_epoch: i32) -> JsonValue {
    match NaiveDate::from_num_days_from_ce_opt(UNIX_EPOCH_DAYS_FROM_CE + days_since_epoch) {
        Some(date) => JsonValue::String(date.format("%Y-%m-%d").to_string()),
        None => JsonValue::String(format!("days:{}", days_since_epoch)),
    }
}

fn timestamp_to_json(unit: TimeUnit, amount: i64) -> JsonValue {
    let micros = match unit {
        TimeUnit::Second => amount.saturating_mul(1_000_000),
        TimeUnit::Millisecond => amount.saturating_mul(1_000),
        TimeUnit::Microsecond => amount,
        TimeUnit::Nanosecond => amount / 1_000,
    };
    match chrono::DateTime::from_timestamp_micros(micros) {
        Some(ts) => JsonValue::String(ts.naive_utc().to_string()),
        None => JsonValue::String(format!("us:{}", micros)),
    }
}
