use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Persisted primary id, `ocd-<kind>/<uuid>`.
pub type EntityId = String;

/// Free-form passthrough fields, forwarded verbatim to storage.
pub type Extras = Map<String, Value>;

/// A persisted entity: its primary id plus the comparable data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stored<T> {
    pub id: EntityId,
    pub data: T,
}

// ---------------------------------------------------------------------------
// Jurisdiction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jurisdiction {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub legislative_sessions: Vec<LegislativeSession>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegislativeSession {
    pub identifier: String,
    pub name: String,
}

impl Jurisdiction {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: String::new(),
            legislative_sessions: Vec::new(),
        }
    }

    pub fn with_session(mut self, identifier: impl Into<String>, name: impl Into<String>) -> Self {
        self.legislative_sessions.push(LegislativeSession {
            identifier: identifier.into(),
            name: name.into(),
        });
        self
    }

    pub fn session(&self, identifier: &str) -> Option<&LegislativeSession> {
        self.legislative_sessions.iter().find(|s| s.identifier == identifier)
    }
}

// ---------------------------------------------------------------------------
// Organization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationData {
    pub name: String,
    pub classification: String,
    pub parent_id: Option<EntityId>,
    #[serde(default)]
    pub extras: Extras,
}

impl OrganizationData {
    pub fn new(name: impl Into<String>, classification: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classification: classification.into(),
            parent_id: None,
            extras: Extras::new(),
        }
    }
}

/// Filter for organization lookups. `None` fields match anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrganizationQuery<'a> {
    pub name: Option<&'a str>,
    pub classification: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// Person + Membership
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonData {
    pub name: String,
    #[serde(default)]
    pub birth_date: String,
    #[serde(default)]
    pub death_date: String,
    #[serde(default)]
    pub identifiers: Vec<PersonIdentifier>,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub extras: Extras,
}

impl PersonData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            birth_date: String::new(),
            death_date: String::new(),
            identifiers: Vec::new(),
            sources: Vec::new(),
            extras: Extras::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PersonIdentifier {
    pub scheme: String,
    pub identifier: String,
}

/// Person lookups never leave the jurisdiction.
#[derive(Debug, Clone, Copy)]
pub enum PersonQuery<'a> {
    /// People imported under the jurisdiction or holding a membership in one
    /// of its organizations.
    Name(&'a str),
    /// Members of the jurisdiction's organizations holding this identifier.
    Identifier { scheme: &'a str, identifier: &'a str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonCollection {
    Identifiers,
    Sources,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipData {
    pub person_id: EntityId,
    pub organization_id: EntityId,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
}

impl MembershipData {
    pub fn new(person_id: impl Into<EntityId>, organization_id: impl Into<EntityId>) -> Self {
        Self {
            person_id: person_id.into(),
            organization_id: organization_id.into(),
            role: String::new(),
            label: String::new(),
            start_date: String::new(),
            end_date: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Bill
// ---------------------------------------------------------------------------

/// A bill with every owned collection, as compared during import.
///
/// The action summary (`first_action_date` and friends) is not part of this
/// type: it is derived from `actions` and stored separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillData {
    pub identifier: String,
    pub legislative_session: String,
    pub title: String,
    pub classification: Vec<String>,
    pub subject: Vec<String>,
    pub from_organization_id: EntityId,
    pub actions: Vec<Action>,
    pub sponsorships: Vec<Sponsorship>,
    pub other_titles: Vec<OtherTitle>,
    pub other_identifiers: Vec<OtherIdentifier>,
    pub abstracts: Vec<Abstract>,
    pub documents: Vec<Document>,
    pub versions: Vec<Document>,
    pub sources: Vec<Source>,
    pub related_bills: Vec<RelatedBill>,
    pub extras: Extras,
}

impl BillData {
    pub fn new(
        identifier: impl Into<String>,
        legislative_session: impl Into<String>,
        title: impl Into<String>,
        from_organization_id: impl Into<EntityId>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            legislative_session: legislative_session.into(),
            title: title.into(),
            classification: Vec::new(),
            subject: Vec::new(),
            from_organization_id: from_organization_id.into(),
            actions: Vec::new(),
            sponsorships: Vec::new(),
            other_titles: Vec::new(),
            other_identifiers: Vec::new(),
            abstracts: Vec::new(),
            documents: Vec::new(),
            versions: Vec::new(),
            sources: Vec::new(),
            related_bills: Vec::new(),
            extras: Extras::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Action {
    pub description: String,
    pub date: String,
    pub organization_id: EntityId,
    pub classification: Vec<String>,
    pub related_entities: Vec<RelatedEntity>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelatedEntity {
    pub name: String,
    pub entity_type: String,
    pub person_id: Option<EntityId>,
    pub organization_id: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Sponsorship {
    pub name: String,
    pub entity_type: String,
    pub classification: String,
    pub primary: bool,
    pub person_id: Option<EntityId>,
    pub organization_id: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OtherTitle {
    pub title: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OtherIdentifier {
    pub identifier: String,
    #[serde(default)]
    pub scheme: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Abstract {
    #[serde(rename = "abstract")]
    pub text: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub date: String,
}

/// A named document or version group owning its links.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Document {
    pub note: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub classification: String,
    #[serde(default)]
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    #[serde(default)]
    pub media_type: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelatedBill {
    pub identifier: String,
    pub legislative_session: String,
    pub relation_type: String,
    /// Lazily resolved target; `None` until the related bill is imported.
    pub related_bill_id: Option<EntityId>,
}

/// Owned collections of a bill, each replaced wholesale on change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BillCollection {
    Actions,
    Sponsorships,
    OtherTitles,
    OtherIdentifiers,
    Abstracts,
    Documents,
    Versions,
    Sources,
    RelatedBills,
}

impl BillCollection {
    pub const ALL: [BillCollection; 9] = [
        Self::Actions,
        Self::Sponsorships,
        Self::OtherTitles,
        Self::OtherIdentifiers,
        Self::Abstracts,
        Self::Documents,
        Self::Versions,
        Self::Sources,
        Self::RelatedBills,
    ];
}

impl std::fmt::Display for BillCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Actions => write!(f, "actions"),
            Self::Sponsorships => write!(f, "sponsorships"),
            Self::OtherTitles => write!(f, "other_titles"),
            Self::OtherIdentifiers => write!(f, "other_identifiers"),
            Self::Abstracts => write!(f, "abstracts"),
            Self::Documents => write!(f, "documents"),
            Self::Versions => write!(f, "versions"),
            Self::Sources => write!(f, "sources"),
            Self::RelatedBills => write!(f, "related_bills"),
        }
    }
}

/// Fields derived from a bill's actions after every write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSummary {
    pub first_action_date: Option<String>,
    pub latest_action_date: Option<String>,
    pub latest_action_description: Option<String>,
}

/// A related-bill row whose target has not been found yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedRelatedBill {
    pub bill_id: EntityId,
    pub position: usize,
    pub identifier: String,
    pub legislative_session: String,
}
