use legisync_store::StoreError;
use thiserror::Error;

use crate::model::{EntityKind, NaturalKey};

#[derive(Debug, Error)]
pub enum ImportError {
    /// Two records claim the same natural key with different content.
    #[error("duplicate {key}: {first} conflicts with {second}")]
    Duplicate {
        key: NaturalKey,
        first: String,
        second: String,
    },
    /// A structurally required reference could not be resolved.
    #[error("{key}: cannot resolve {field} '{reference}'")]
    UnresolvedReference {
        kind: EntityKind,
        key: NaturalKey,
        field: String,
        reference: String,
    },
    /// A required reference matched more than one persisted entity.
    #[error("{key}: {field} '{reference}' matches {matches} {kind} entities")]
    AmbiguousReference {
        kind: EntityKind,
        key: NaturalKey,
        field: String,
        reference: String,
        matches: usize,
    },
    #[error("unknown jurisdiction: {0}")]
    UnknownJurisdiction(String),
    /// A transformer rejected a raw field value.
    #[error("{kind}.{field}: cannot transform '{value}': {message}")]
    Transform {
        kind: EntityKind,
        field: String,
        value: String,
        message: String,
    },
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (unknown transformer, empty jurisdiction, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}
