use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Entity kinds
// ---------------------------------------------------------------------------

/// Importable entity kinds, ordered the way a batch imports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Organization,
    Person,
    Membership,
    Bill,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [Self::Organization, Self::Person, Self::Membership, Self::Bill];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Person => "person",
            Self::Membership => "membership",
            Self::Bill => "bill",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown entity kind '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// Natural key
// ---------------------------------------------------------------------------

/// Fields identifying an entity within its jurisdiction, independent of the
/// generated primary id. Displays as `bill(jurisdiction=..., identifier=...)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub kind: EntityKind,
    pub parts: Vec<(&'static str, String)>,
}

impl NaturalKey {
    pub fn new(kind: EntityKind) -> Self {
        Self { kind, parts: Vec::new() }
    }

    pub fn with(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.parts.push((name, value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.parts.iter().find(|(n, _)| *n == name).map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.kind)?;
        for (i, (name, value)) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        write!(f, ")")
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Insert,
    Update,
    Noop,
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => write!(f, "insert"),
            Self::Update => write!(f, "update"),
            Self::Noop => write!(f, "noop"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCounts {
    pub insert: usize,
    pub update: usize,
    pub noop: usize,
}

impl ImportCounts {
    pub fn record(&mut self, status: ImportStatus) {
        match status {
            ImportStatus::Insert => self.insert += 1,
            ImportStatus::Update => self.update += 1,
            ImportStatus::Noop => self.noop += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.insert + self.update + self.noop
    }
}

/// What to do when a single entity fails to import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Stop the run and return the error.
    #[default]
    Abort,
    /// Record the failure in the report and move on.
    Continue,
}

/// A per-entity failure recorded under `ErrorPolicy::Continue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportFailure {
    pub kind: EntityKind,
    pub key: String,
    pub message: String,
}

/// Outcome of one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub counts: BTreeMap<EntityKind, ImportCounts>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ImportFailure>,
}

impl ImportReport {
    /// Counts for one kind; zero when the batch had none.
    pub fn counts(&self, kind: EntityKind) -> ImportCounts {
        self.counts.get(&kind).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_key_display_lists_parts_in_order() {
        let key = NaturalKey::new(EntityKind::Bill)
            .with("jurisdiction", "ocd-jurisdiction/country:us/state:nc")
            .with("legislative_session", "1900")
            .with("identifier", "HB 1");
        assert_eq!(
            key.to_string(),
            "bill(jurisdiction=ocd-jurisdiction/country:us/state:nc, legislative_session=1900, identifier=HB 1)"
        );
        assert_eq!(key.get("identifier"), Some("HB 1"));
    }

    #[test]
    fn entity_kind_parses_its_display_form() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.to_string().parse::<EntityKind>(), Ok(kind));
        }
        assert!("vote_event".parse::<EntityKind>().is_err());
    }

    #[test]
    fn report_serializes_counts_by_kind_name() {
        let mut report = ImportReport::default();
        let mut counts = ImportCounts::default();
        counts.record(ImportStatus::Insert);
        counts.record(ImportStatus::Noop);
        report.counts.insert(EntityKind::Bill, counts);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["counts"]["bill"]["insert"], 1);
        assert_eq!(json["counts"]["bill"]["noop"], 1);
        assert!(json.get("failures").is_none());
        assert_eq!(report.counts(EntityKind::Person).total(), 0);
    }
}
