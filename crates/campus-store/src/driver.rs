//! The two execution backends: a one-shot subprocess around the external
//! CLI engine, and the in-process engine behind a long-lived handle.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::StoreError;

/// A query result row: column name → JSON value. Both backends produce the
/// same shape, so repositories never know which one ran.
pub type Row = Map<String, Value>;

/// Where the probe landed. `Missing` is the one condition that selects the
/// embedded engine; every other probe failure is an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Probe {
    External,
    Missing,
}

/// Run `<bin> --version` once to find out whether the external engine is
/// callable.
pub(crate) fn probe(bin: &str) -> Result<Probe, StoreError> {
    match Command::new(bin).arg("--version").output() {
        Ok(out) if out.status.success() => {
            info!(bin, "external sql engine detected");
            Ok(Probe::External)
        }
        Ok(out) => Err(StoreError::Driver(format!(
            "{bin} --version failed ({}): {}",
            out.status,
            String::from_utf8_lossy(&out.stderr).trim()
        ))),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!(bin, "external sql engine not found; using embedded engine");
            Ok(Probe::Missing)
        }
        Err(err) => Err(StoreError::Driver(format!("probing {bin}: {err}"))),
    }
}

/// Failure modes of one external invocation. `Vanished` (the binary
/// disappeared after a successful probe) is the only one that triggers
/// demotion to the embedded engine.
#[derive(Debug)]
pub(crate) enum ExternalError {
    Vanished,
    Failed(String),
}

/// One-shot subprocess driver. Every statement spawns a fresh process and
/// blocks until it exits.
pub(crate) struct ExternalDriver {
    bin: String,
}

impl ExternalDriver {
    pub(crate) fn new(bin: String) -> Self {
        Self { bin }
    }

    pub(crate) fn execute(&self, db: &Path, sql: &str) -> Result<(), ExternalError> {
        self.run(&[db.as_os_str(), OsStr::new(sql)]).map(|_| ())
    }

    /// Request machine-readable output; the caller parses it.
    pub(crate) fn query(&self, db: &Path, sql: &str) -> Result<String, ExternalError> {
        self.run(&[OsStr::new("-json"), db.as_os_str(), OsStr::new(sql)])
    }

    fn run(&self, args: &[&OsStr]) -> Result<String, ExternalError> {
        let output = match Command::new(&self.bin).args(args).output() {
            Ok(output) => output,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ExternalError::Vanished)
            }
            Err(err) => {
                return Err(ExternalError::Failed(format!(
                    "spawning {}: {err}",
                    self.bin
                )))
            }
        };
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let message = [stderr.trim(), stdout.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| format!("{} exited with {}", self.bin, output.status));
        Err(ExternalError::Failed(message))
    }
}

/// Parse the external engine's structured output. Empty output means zero
/// rows; anything else must be a JSON array of records.
pub(crate) fn parse_rows(output: &str) -> Result<Vec<Row>, StoreError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed).map_err(|err| StoreError::MalformedOutput(err.to_string()))
}

/// Open the in-process engine. The handle lives for the rest of the process.
pub(crate) fn open_embedded(path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(path)?;
    info!(path = %path.display(), "embedded sql engine opened");
    Ok(conn)
}

pub(crate) fn embedded_execute(conn: &Connection, sql: &str) -> Result<(), StoreError> {
    conn.execute_batch(sql)?;
    Ok(())
}

pub(crate) fn embedded_query(conn: &Connection, sql: &str) -> Result<Vec<Row>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let mut rows = stmt.query([])?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Row::new();
        for (idx, column) in columns.iter().enumerate() {
            record.insert(column.clone(), json_value(row.get_ref(idx)?, column)?);
        }
        records.push(record);
    }
    Ok(records)
}

fn json_value(value: ValueRef<'_>, column: &str) -> Result<Value, StoreError> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::from(n),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(_) => {
            return Err(StoreError::Database(format!(
                "blob column {column} is not supported"
            )))
        }
    })
}
