#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("sql driver error: {0}")]
    Driver(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("missing value for parameter {0}")]
    MissingParameter(String),

    #[error("unparsable driver output: {0}")]
    MalformedOutput(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("credential error: {0}")]
    Credential(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("corrupt row in {table}.{column}: {detail}")]
    CorruptRow {
        table: &'static str,
        column: &'static str,
        detail: String,
    },
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
