//! Execution of pre-validated, read-only ad hoc queries.
//!
//! Callers are expected to validate the SQL text beforehand; this layer
//! additionally refuses any statement SQLite itself does not report as
//! read-only, and never materialises more than `max_rows` rows.

use std::sync::Arc;

use rusqlite::types::ValueRef;
use tracing::debug;

use tirage_core::error::TirageError;
use tirage_core::types::QueryRows;

use crate::db::Database;

/// Runs read-only SELECT statements against the draw history.
#[derive(Clone)]
pub struct ReadOnlyQueries {
    db: Arc<Database>,
}

impl ReadOnlyQueries {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Execute `sql` and return at most `max_rows` rows.
    pub fn run(&self, sql: &str, max_rows: usize) -> Result<QueryRows, TirageError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| TirageError::Query(format!("prepare: {}", e)))?;
            if !stmt.readonly() {
                return Err(TirageError::Query(
                    "statement is not read-only".to_string(),
                ));
            }

            let columns: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(str::to_string)
                .collect();
            let width = columns.len();

            let mut rows = stmt
                .query([])
                .map_err(|e| TirageError::Query(format!("execute: {}", e)))?;

            let mut out = Vec::new();
            while let Some(row) = rows
                .next()
                .map_err(|e| TirageError::Query(format!("step: {}", e)))?
            {
                if out.len() >= max_rows {
                    break;
                }
                let mut values = Vec::with_capacity(width);
                for i in 0..width {
                    let value = row
                        .get_ref(i)
                        .map_err(|e| TirageError::Query(format!("column {}: {}", i, e)))?;
                    values.push(to_json(value));
                }
                out.push(values);
            }

            debug!(rows = out.len(), "Read-only query executed");
            Ok(QueryRows { columns, rows: out })
        })
    }
}

fn to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(t) => serde_json::Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => serde_json::Value::String(format!("<blob {} bytes>", b.len())),
    }
}
