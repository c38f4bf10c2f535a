//! Per-kind, per-field value normalization applied before comparison.
//!
//! A `Transformers` table is built for each run (usually from
//! `ImportConfig`) and owned by the run's `ImportContext`. Field paths name
//! scalar fields directly (`identifier`) and nested row fields with a dot
//! (`actions.description`).

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::error::ImportError;
use crate::model::EntityKind;

pub type TransformFn = Arc<dyn Fn(&str) -> Result<String, String> + Send + Sync>;

/// Names accepted by `builtin`.
pub const BUILTIN_NAMES: [&str; 4] = ["fix_bill_id", "trim", "collapse_whitespace", "uppercase"];

#[derive(Clone, Default)]
pub struct Transformers {
    table: HashMap<(EntityKind, String), TransformFn>,
}

impl fmt::Debug for Transformers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields: Vec<String> = self.table.keys().map(|(kind, field)| format!("{kind}.{field}")).collect();
        fields.sort();
        f.debug_struct("Transformers").field("fields", &fields).finish()
    }
}

impl Transformers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F>(mut self, kind: EntityKind, field: impl Into<String>, transform: F) -> Self
    where
        F: Fn(&str) -> Result<String, String> + Send + Sync + 'static,
    {
        self.insert(kind, field, Arc::new(transform));
        self
    }

    pub fn insert(&mut self, kind: EntityKind, field: impl Into<String>, transform: TransformFn) {
        self.table.insert((kind, field.into()), transform);
    }

    pub fn lookup(&self, kind: EntityKind, field: &str) -> Option<&TransformFn> {
        self.table.get(&(kind, field.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Replace `value` with its transformed form, if a transformer is set.
    pub fn apply(&self, kind: EntityKind, field: &str, value: &mut String) -> Result<(), ImportError> {
        let Some(transform) = self.lookup(kind, field) else {
            return Ok(());
        };
        let transformed = transform(value.as_str()).map_err(|message| ImportError::Transform {
            kind,
            field: field.to_string(),
            value: value.clone(),
            message,
        })?;
        *value = transformed;
        Ok(())
    }

    pub fn apply_all<'a>(
        &self,
        kind: EntityKind,
        field: &str,
        values: impl IntoIterator<Item = &'a mut String>,
    ) -> Result<(), ImportError> {
        if self.lookup(kind, field).is_none() {
            return Ok(());
        }
        for value in values {
            self.apply(kind, field, value)?;
        }
        Ok(())
    }
}

/// Look up a built-in transformer by name.
pub fn builtin(name: &str) -> Option<TransformFn> {
    let transform: TransformFn = match name {
        "fix_bill_id" => Arc::new(fix_bill_id),
        "trim" => Arc::new(|v: &str| -> Result<String, String> { Ok(v.trim().to_string()) }),
        "collapse_whitespace" => Arc::new(|v: &str| -> Result<String, String> {
            Ok(v.split_whitespace().collect::<Vec<_>>().join(" "))
        }),
        "uppercase" => Arc::new(|v: &str| -> Result<String, String> { Ok(v.to_uppercase()) }),
        _ => return None,
    };
    Some(transform)
}

fn bill_id_pattern() -> Result<&'static Regex, String> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^([A-Z]*)\s*0*([-\d]+)$"))
        .as_ref()
        .map_err(|e| e.to_string())
}

/// Canonical bill identifier: `hb1` → `HB 1`, `S.B. 0012` → `SB 12`.
///
/// Identifiers that are not letters-then-number are only upper-cased.
pub fn fix_bill_id(raw: &str) -> Result<String, String> {
    let pattern = bill_id_pattern()?;
    let cleaned = raw.replace('.', "").to_uppercase();
    Ok(pattern.replace(cleaned.trim(), "$1 $2").trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fix_bill_id_normalizes_prefix_and_number() {
        assert_eq!(fix_bill_id("hb1").unwrap(), "HB 1");
        assert_eq!(fix_bill_id("HB 1").unwrap(), "HB 1");
        assert_eq!(fix_bill_id("S.B. 0012").unwrap(), "SB 12");
        assert_eq!(fix_bill_id("sjr  7").unwrap(), "SJR 7");
        assert_eq!(fix_bill_id("12").unwrap(), "12");
    }

    #[test]
    fn fix_bill_id_leaves_unusual_identifiers_alone() {
        assert_eq!(fix_bill_id("HCR A").unwrap(), "HCR A");
    }

    #[test]
    fn apply_only_touches_configured_fields() {
        let transformers = Transformers::new().with(EntityKind::Bill, "identifier", fix_bill_id);
        let mut identifier = "hb1".to_string();
        let mut title = "  spaced  ".to_string();
        transformers.apply(EntityKind::Bill, "identifier", &mut identifier).unwrap();
        transformers.apply(EntityKind::Bill, "title", &mut title).unwrap();
        transformers.apply(EntityKind::Person, "identifier", &mut title).unwrap();
        assert_eq!(identifier, "HB 1");
        assert_eq!(title, "  spaced  ");
    }

    #[test]
    fn failing_transform_reports_the_raw_value() {
        let transformers =
            Transformers::new().with(EntityKind::Bill, "title", |_: &str| Err("empty title".to_string()));
        let mut title = "x".to_string();
        let err = transformers.apply(EntityKind::Bill, "title", &mut title).unwrap_err();
        match err {
            ImportError::Transform { field, value, message, .. } => {
                assert_eq!(field, "title");
                assert_eq!(value, "x");
                assert_eq!(message, "empty title");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(title, "x");
    }

    #[test]
    fn builtins_are_all_known() {
        for name in BUILTIN_NAMES {
            assert!(builtin(name).is_some(), "{name}");
        }
        assert!(builtin("lowercase").is_none());
        let collapse = builtin("collapse_whitespace").unwrap();
        assert_eq!(collapse(" a \n b  c ").unwrap(), "a b c");
    }
}
