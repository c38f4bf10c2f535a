use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

const PREFIX: char = '~';

/// Placeholder reference derived from identifying fields.
///
/// Encodes as `~` followed by the fields as JSON with sorted keys, so the
/// same fields always give the same token regardless of the order they were
/// supplied in: `~{"classification":"lower"}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PseudoId {
    fields: BTreeMap<String, String>,
}

impl PseudoId {
    pub fn new<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn encode(&self) -> String {
        // BTreeMap<String, String> always serializes.
        let body = serde_json::to_string(&self.fields).unwrap_or_default();
        format!("{PREFIX}{body}")
    }

    pub fn parse(token: &str) -> Result<Self, serde_json::Error> {
        let body = token.strip_prefix(PREFIX).ok_or_else(|| {
            <serde_json::Error as de::Error>::custom(format!("pseudo id must start with '{PREFIX}': {token}"))
        })?;
        let fields: BTreeMap<String, String> = serde_json::from_str(body)?;
        if fields.is_empty() {
            return Err(de::Error::custom("pseudo id has no fields"));
        }
        Ok(Self { fields })
    }
}

impl fmt::Display for PseudoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for PseudoId {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for PseudoId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for PseudoId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        Self::parse(&token).map_err(de::Error::custom)
    }
}
