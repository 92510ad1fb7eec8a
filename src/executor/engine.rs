//! Macro execution engine
//!
//! Resolves the descriptor, coerces parameters, builds the statement shape
//! for the macro's kind and runs it under the calling thread's cursor.
//! The macro name is embedded only as a validated identifier; every value
//! goes through driver parameter binding.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use duckdb::params_from_iter;
use duckdb::types::Value;
use serde_json::Value as JsonValue;

use crate::catalog::{is_valid_identifier, MacroCatalog, MacroDescriptor, MacroKind};
use crate::coercion::{coerce_parameters, CoercedParameters};
use crate::connection::ConnectionManager;
use crate::errors::{MacroError, MacroResult};
use crate::observability::Logger;

use super::result::{cell_to_json, ExecutionResult};

/// Executes discovered macros against the shared database handle
pub struct MacroExecutor {
    manager: Arc<ConnectionManager>,
    catalog: Arc<MacroCatalog>,
}

impl MacroExecutor {
    pub fn new(manager: Arc<ConnectionManager>, catalog: Arc<MacroCatalog>) -> Self {
        Self { manager, catalog }
    }

    /// Catalog service backing this executor
    pub fn catalog(&self) -> &Arc<MacroCatalog> {
        &self.catalog
    }

    /// Execute a macro with untyped parameters and normalize the result.
    ///
    /// NotFound and ParameterError are fully resolved before any statement
    /// is built, so they never leave partial side effects.
    pub fn execute(
        &self,
        name: &str,
        raw: &HashMap<String, JsonValue>,
    ) -> MacroResult<ExecutionResult> {
        if !is_valid_identifier(name) {
            // Invalid names can never exist in the catalog; reject before
            // the name gets anywhere near statement text.
            return Err(MacroError::NotFound {
                name: name.to_string(),
                available: self.catalog.sample_names(),
            });
        }

        let descriptor = self.catalog.get_by_name(name)?;
        let coerced = coerce_parameters(&descriptor, raw)?;
        let bound = bind_in_declared_order(&descriptor, &coerced)?;

        let statement = build_statement(&descriptor, bound.len());

        let cursor = self.manager.acquire()?;
        let started = Instant::now();
        let outcome = run_statement(&cursor, &statement, &bound, descriptor.kind);
        let execution_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok((rows, columns)) => {
                let result = normalize(&descriptor, rows, columns, execution_time_ms);
                Logger::info(
                    "MACRO_EXECUTED",
                    &[
                        ("macro", name),
                        ("kind", descriptor.kind.as_str()),
                        ("rows", result.row_count.to_string().as_str()),
                    ],
                );
                Ok(result)
            }
            Err(e) => {
                let message = e.to_string();
                Logger::error("MACRO_FAILED", &[("macro", name), ("error", &message)]);
                if message.to_lowercase().contains("does not exist") {
                    Err(MacroError::NotFound {
                        name: name.to_string(),
                        available: self.catalog.sample_names(),
                    })
                } else {
                    Err(MacroError::Execution {
                        name: name.to_string(),
                        message,
                    })
                }
            }
        }
    }
}

/// Assemble the positional argument list by walking declared parameters in
/// order. Trailing omissions are skipped; a gap (an omitted parameter
/// followed by a supplied one) would silently shift positional binding, so
/// it is rejected here.
fn bind_in_declared_order(
    descriptor: &MacroDescriptor,
    coerced: &CoercedParameters,
) -> MacroResult<Vec<Value>> {
    let mut bound = Vec::with_capacity(coerced.len());
    let mut first_omitted: Option<&str> = None;

    for name in &descriptor.parameters {
        match coerced.get(name) {
            Some(value) => {
                if let Some(gap) = first_omitted {
                    return Err(MacroError::parameter(format!(
                        "Parameter '{}' is missing but later parameter '{}' was supplied; \
                         omitted parameters must be trailing",
                        gap, name
                    )));
                }
                bound.push(value.clone());
            }
            None => {
                first_omitted.get_or_insert(name.as_str());
            }
        }
    }

    Ok(bound)
}

/// `SELECT * FROM name(?,...)` for table macros, `SELECT name(?,...)` for
/// scalar ones; `()` form when nothing is bound. The name was validated
/// against the identifier pattern upstream.
fn build_statement(descriptor: &MacroDescriptor, bound_count: usize) -> String {
    let placeholders = vec!["?"; bound_count].join(",");
    match descriptor.kind {
        MacroKind::Table => format!("SELECT * FROM {}({})", descriptor.name, placeholders),
        MacroKind::Scalar => format!("SELECT {}({})", descriptor.name, placeholders),
    }
}

type RawRows = (Vec<Vec<Value>>, Vec<String>);

fn run_statement(
    cursor: &duckdb::Connection,
    statement: &str,
    bound: &[Value],
    kind: MacroKind,
) -> Result<RawRows, duckdb::Error> {
    let mut stmt = cursor.prepare(statement)?;
    let mut rows = stmt.query(params_from_iter(bound.iter()))?;

    let mut columns: Vec<String> = Vec::new();
    let mut data = Vec::new();
    while let Some(row) = rows.next()? {
        let stmt_ref = row.as_ref();
        if columns.is_empty() {
            columns = stmt_ref.column_names().iter().map(|c| c.to_string()).collect();
        }
        let width = stmt_ref.column_count();
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            cells.push(row.get::<_, Value>(i)?);
        }
        data.push(cells);

        // A scalar macro yields one row; no need to drain further
        if kind == MacroKind::Scalar {
            break;
        }
    }

    Ok((data, columns))
}

fn normalize(
    descriptor: &MacroDescriptor,
    rows: Vec<Vec<Value>>,
    columns: Vec<String>,
    execution_time_ms: f64,
) -> ExecutionResult {
    match descriptor.kind {
        MacroKind::Table => {
            let data = rows
                .into_iter()
                .map(|row| row.into_iter().map(cell_to_json).collect())
                .collect();
            ExecutionResult::table(data, columns, execution_time_ms)
        }
        MacroKind::Scalar => {
            let value = rows
                .into_iter()
                .next()
                .and_then(|row| row.into_iter().next())
                .map(cell_to_json)
                .unwrap_or(JsonValue::Null);
            ExecutionResult::scalar(value, execution_time_ms)
        }
    }
}
