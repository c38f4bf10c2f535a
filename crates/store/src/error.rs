use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure (open, schema, query).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A JSON-encoded column could not be written.
    #[error("cannot encode column: {0}")]
    Json(#[from] serde_json::Error),
    /// A write targeted a row that does not exist.
    #[error("no {kind} with id '{id}'")]
    NotFound { kind: &'static str, id: String },
}
