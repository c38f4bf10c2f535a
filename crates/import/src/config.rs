use std::collections::BTreeMap;
use std::path::PathBuf;

use legisync_store::Store;
use serde::Deserialize;

use crate::context::ImportContext;
use crate::error::ImportError;
use crate::model::{EntityKind, ErrorPolicy};
use crate::transform::{self, Transformers, BUILTIN_NAMES};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// One import run, as read from TOML:
///
/// ```toml
/// jurisdiction = "ocd-jurisdiction/country:us/state:nc/government"
/// database = "legisync.db"
/// on_error = "continue"
///
/// [transformers.bill]
/// identifier = "fix_bill_id"
/// "actions.description" = "collapse_whitespace"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ImportConfig {
    pub jurisdiction: String,
    #[serde(default)]
    pub database: Option<PathBuf>,
    #[serde(default)]
    pub on_error: ErrorPolicy,
    /// Entity kind → field path → built-in transformer name.
    #[serde(default)]
    pub transformers: BTreeMap<String, BTreeMap<String, String>>,
}

impl ImportConfig {
    pub fn from_toml(input: &str) -> Result<Self, ImportError> {
        let config: Self = toml::from_str(input).map_err(|e| ImportError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ImportError> {
        if self.jurisdiction.trim().is_empty() {
            return Err(ImportError::ConfigValidation("jurisdiction must not be empty".into()));
        }
        for (kind, fields) in &self.transformers {
            kind.parse::<EntityKind>().map_err(ImportError::ConfigValidation)?;
            for (field, name) in fields {
                if field.is_empty() {
                    return Err(ImportError::ConfigValidation(format!(
                        "transformers.{kind}: empty field name"
                    )));
                }
                if !BUILTIN_NAMES.contains(&name.as_str()) {
                    return Err(ImportError::ConfigValidation(format!(
                        "transformers.{kind}.{field}: unknown transformer '{name}' (expected one of: {})",
                        BUILTIN_NAMES.join(", ")
                    )));
                }
            }
        }
        Ok(())
    }

    /// The explicit transformer table for a run.
    pub fn transformers(&self) -> Result<Transformers, ImportError> {
        let mut table = Transformers::new();
        for (kind, fields) in &self.transformers {
            let kind = kind.parse::<EntityKind>().map_err(ImportError::ConfigValidation)?;
            for (field, name) in fields {
                let transform = transform::builtin(name).ok_or_else(|| {
                    ImportError::ConfigValidation(format!("unknown transformer '{name}'"))
                })?;
                table.insert(kind, field.as_str(), transform);
            }
        }
        Ok(table)
    }

    /// A fresh context for this config's jurisdiction.
    pub fn context(&self, store: &dyn Store) -> Result<ImportContext, ImportError> {
        Ok(ImportContext::load(store, &self.jurisdiction)?
            .with_transformers(self.transformers()?)
            .with_policy(self.on_error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
jurisdiction = "ocd-jurisdiction/country:us/state:nc/government"
database = "legisync.db"
on_error = "continue"

[transformers.bill]
identifier = "fix_bill_id"
"actions.description" = "collapse_whitespace"
"#;

    #[test]
    fn parses_full_config() {
        let config = ImportConfig::from_toml(CONFIG).unwrap();
        assert_eq!(config.on_error, ErrorPolicy::Continue);
        assert_eq!(config.database, Some(PathBuf::from("legisync.db")));

        let transformers = config.transformers().unwrap();
        assert!(transformers.lookup(EntityKind::Bill, "identifier").is_some());
        assert!(transformers.lookup(EntityKind::Bill, "actions.description").is_some());
        assert!(transformers.lookup(EntityKind::Bill, "title").is_none());
    }

    #[test]
    fn defaults_to_abort_without_transformers() {
        let config = ImportConfig::from_toml(r#"jurisdiction = "ocd-jurisdiction/country:us/state:ak/government""#)
            .unwrap();
        assert_eq!(config.on_error, ErrorPolicy::Abort);
        assert!(config.transformers().unwrap().is_empty());
    }

    #[test]
    fn rejects_unknown_transformer() {
        let err = ImportConfig::from_toml(
            r#"
jurisdiction = "x"
[transformers.bill]
identifier = "shout"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ImportError::ConfigValidation(msg) if msg.contains("shout")));
    }

    #[test]
    fn rejects_unknown_kind_and_empty_jurisdiction() {
        let err = ImportConfig::from_toml(
            r#"
jurisdiction = "x"
[transformers.vote_event]
motion = "trim"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ImportError::ConfigValidation(_)));

        let err = ImportConfig::from_toml(r#"jurisdiction = "  ""#).unwrap_err();
        assert!(matches!(err, ImportError::ConfigValidation(_)));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = ImportConfig::from_toml("jurisdiction = ").unwrap_err();
        assert!(matches!(err, ImportError::ConfigParse(_)));
    }
}
