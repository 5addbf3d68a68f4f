//! Parameter binding: renders a SQL template plus values into final SQL
//! text. Quoting here is the sole injection defense for the whole layer.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::StoreError;

/// A value rendered into SQL text. Everything the layer binds is one of
/// these; callers serialize richer shapes (JSON documents) to text first.
/// Blobs are not supported.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Bool(bool),
    Text(String),
}

impl SqlValue {
    fn to_literal(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Integer(n) => n.to_string(),
            Self::Real(f) if f.is_finite() => f.to_string(),
            // Non-finite reals have no SQL literal; store their string form.
            Self::Real(f) => quote(&f.to_string()),
            Self::Bool(true) => "1".to_string(),
            Self::Bool(false) => "0".to_string(),
            Self::Text(s) => quote(s),
        }
    }
}

/// Single-quote a string, doubling embedded quotes. A value can never
/// terminate the literal early.
fn quote(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('\'');
    for ch in raw.chars() {
        if ch == '\'' {
            out.push('\'');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        Self::Integer(v.into())
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Statement parameters: positional (`?`) or named (`:name`). The two forms
/// are distinct code paths and never mix within one statement.
#[derive(Clone, Debug)]
pub enum Params {
    Positional(Vec<SqlValue>),
    Named(BTreeMap<String, SqlValue>),
}

impl Params {
    /// A statement without placeholders.
    pub fn none() -> Self {
        Self::Positional(Vec::new())
    }

    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        Self::Positional(values.into_iter().map(Into::into).collect())
    }

    pub fn named<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SqlValue>,
    {
        Self::Named(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Substitute every placeholder with the rendered literal of its value.
/// A `?` beyond the value list and a `:name` absent from the map are both
/// contract violations and fail before any engine sees the statement.
pub fn render(sql: &str, params: &Params) -> Result<String, StoreError> {
    match params {
        Params::Positional(values) => render_positional(sql, values),
        Params::Named(values) => render_named(sql, values),
    }
}

fn render_positional(sql: &str, values: &[SqlValue]) -> Result<String, StoreError> {
    let mut out = String::with_capacity(sql.len());
    let mut next = 0usize;
    for ch in sql.chars() {
        if ch == '?' {
            let value = values.get(next).ok_or_else(|| {
                StoreError::MissingParameter(format!("positional parameter {}", next + 1))
            })?;
            out.push_str(&value.to_literal());
            next += 1;
        } else {
            out.push(ch);
        }
    }
    Ok(out)
}

fn named_placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").expect("static pattern"))
}

fn render_named(sql: &str, values: &BTreeMap<String, SqlValue>) -> Result<String, StoreError> {
    let mut out = String::with_capacity(sql.len());
    let mut last = 0usize;
    for found in named_placeholder().find_iter(sql) {
        let name = &sql[found.start() + 1..found.end()];
        let value = values
            .get(name)
            .ok_or_else(|| StoreError::MissingParameter(format!(":{name}")))?;
        out.push_str(&sql[last..found.start()]);
        out.push_str(&value.to_literal());
        last = found.end();
    }
    out.push_str(&sql[last..]);
    Ok(out)
}
