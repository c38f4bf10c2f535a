//! Scraped input records.
//!
//! A batch is a JSON array of objects tagged with `_type`. Nested references
//! to other entities are pseudo-ids; everything else maps onto the stored
//! model once resolved.

use serde::{Deserialize, Deserializer, Serialize};

use legisync_store::model::{
    Abstract, Document, Extras, Link, OtherIdentifier, OtherTitle, PersonIdentifier, Source,
};

use crate::model::EntityKind;
use crate::pseudo_id::PseudoId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_type", rename_all = "snake_case")]
pub enum Record {
    Organization(OrganizationRecord),
    Person(PersonRecord),
    Membership(MembershipRecord),
    Bill(BillRecord),
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Organization(_) => EntityKind::Organization,
            Self::Person(_) => EntityKind::Person,
            Self::Membership(_) => EntityKind::Membership,
            Self::Bill(_) => EntityKind::Bill,
        }
    }
}

// ---------------------------------------------------------------------------
// Organization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationRecord {
    pub name: String,
    pub classification: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<PseudoId>,
    #[serde(default)]
    pub extras: Extras,
}

impl OrganizationRecord {
    pub fn new(name: impl Into<String>, classification: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classification: classification.into(),
            parent_id: None,
            extras: Extras::new(),
        }
    }

    pub fn with_parent(mut self, parent: PseudoId) -> Self {
        self.parent_id = Some(parent);
        self
    }
}

// ---------------------------------------------------------------------------
// Person + Membership
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
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

impl PersonRecord {
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

    pub fn add_identifier(&mut self, identifier: impl Into<String>, scheme: impl Into<String>) {
        self.identifiers.push(PersonIdentifier {
            scheme: scheme.into(),
            identifier: identifier.into(),
        });
    }

    pub fn add_source(&mut self, url: impl Into<String>) {
        self.sources.push(Source {
            url: url.into(),
            note: String::new(),
        });
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipRecord {
    pub person_id: PseudoId,
    pub organization_id: PseudoId,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
}

impl MembershipRecord {
    pub fn new(person: PseudoId, organization: PseudoId) -> Self {
        Self {
            person_id: person,
            organization_id: organization,
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillRecord {
    pub identifier: String,
    pub legislative_session: String,
    pub title: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub classification: Vec<String>,
    #[serde(default)]
    pub subject: Vec<String>,
    /// Explicit originating organization; wins over `chamber`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_organization: Option<PseudoId>,
    /// Chamber classification hint (`lower`/`upper`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chamber: Option<String>,
    #[serde(default)]
    pub actions: Vec<ActionRecord>,
    #[serde(default)]
    pub sponsorships: Vec<SponsorshipRecord>,
    #[serde(default)]
    pub other_titles: Vec<OtherTitle>,
    #[serde(default)]
    pub other_identifiers: Vec<OtherIdentifier>,
    #[serde(default)]
    pub abstracts: Vec<Abstract>,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub versions: Vec<Document>,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub related_bills: Vec<RelatedBillRecord>,
    #[serde(default)]
    pub extras: Extras,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub description: String,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chamber: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<PseudoId>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub classification: Vec<String>,
    #[serde(default)]
    pub related_entities: Vec<RelatedEntityRecord>,
}

impl ActionRecord {
    pub fn add_related_entity(
        &mut self,
        name: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: Option<PseudoId>,
    ) -> &mut Self {
        self.related_entities.push(RelatedEntityRecord {
            name: name.into(),
            entity_type: entity_type.into(),
            entity_id,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedEntityRecord {
    pub name: String,
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<PseudoId>,
}

/// A sponsor as scraped: a name, plus whatever can identify the entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SponsorshipRecord {
    pub name: String,
    pub classification: String,
    pub entity_type: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<PseudoId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedBillRecord {
    pub identifier: String,
    pub legislative_session: String,
    pub relation_type: String,
}

impl BillRecord {
    pub fn new(
        identifier: impl Into<String>,
        legislative_session: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            legislative_session: legislative_session.into(),
            title: title.into(),
            classification: Vec::new(),
            subject: Vec::new(),
            from_organization: None,
            chamber: None,
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

    pub fn with_chamber(mut self, chamber: impl Into<String>) -> Self {
        self.chamber = Some(chamber.into());
        self
    }

    pub fn with_classification(mut self, classification: impl Into<String>) -> Self {
        self.classification.push(classification.into());
        self
    }

    pub fn with_from_organization(mut self, organization: PseudoId) -> Self {
        self.from_organization = Some(organization);
        self
    }

    /// Append an action; its organization defaults to the bill's.
    pub fn add_action(&mut self, description: impl Into<String>, date: impl Into<String>) -> &mut ActionRecord {
        self.actions.push(ActionRecord {
            description: description.into(),
            date: date.into(),
            chamber: None,
            organization_id: None,
            classification: Vec::new(),
            related_entities: Vec::new(),
        });
        let last = self.actions.len() - 1;
        &mut self.actions[last]
    }

    pub fn add_sponsorship(
        &mut self,
        name: impl Into<String>,
        classification: impl Into<String>,
        entity_type: impl Into<String>,
        primary: bool,
        entity_id: Option<PseudoId>,
    ) {
        self.sponsorships.push(SponsorshipRecord {
            name: name.into(),
            classification: classification.into(),
            entity_type: entity_type.into(),
            primary,
            entity_id,
            scheme: None,
            identifier: None,
        });
    }

    pub fn add_sponsorship_by_identifier(
        &mut self,
        name: impl Into<String>,
        classification: impl Into<String>,
        entity_type: impl Into<String>,
        primary: bool,
        scheme: impl Into<String>,
        identifier: impl Into<String>,
    ) {
        self.sponsorships.push(SponsorshipRecord {
            name: name.into(),
            classification: classification.into(),
            entity_type: entity_type.into(),
            primary,
            entity_id: None,
            scheme: Some(scheme.into()),
            identifier: Some(identifier.into()),
        });
    }

    pub fn add_title(&mut self, title: impl Into<String>, note: impl Into<String>) {
        self.other_titles.push(OtherTitle {
            title: title.into(),
            note: note.into(),
        });
    }

    pub fn add_identifier(&mut self, identifier: impl Into<String>, scheme: impl Into<String>) {
        self.other_identifiers.push(OtherIdentifier {
            identifier: identifier.into(),
            scheme: scheme.into(),
            note: String::new(),
        });
    }

    pub fn add_abstract(&mut self, text: impl Into<String>, note: impl Into<String>, date: impl Into<String>) {
        self.abstracts.push(Abstract {
            text: text.into(),
            note: note.into(),
            date: date.into(),
        });
    }

    /// Add a link to the document named `note`, creating it on first use.
    pub fn add_document_link(
        &mut self,
        note: impl Into<String>,
        url: impl Into<String>,
        media_type: impl Into<String>,
    ) {
        add_link(&mut self.documents, note.into(), url.into(), media_type.into());
    }

    /// Add a link to the version named `note`, creating it on first use.
    pub fn add_version_link(&mut self, note: impl Into<String>, url: impl Into<String>, media_type: impl Into<String>) {
        add_link(&mut self.versions, note.into(), url.into(), media_type.into());
    }

    pub fn add_source(&mut self, url: impl Into<String>) {
        self.sources.push(Source {
            url: url.into(),
            note: String::new(),
        });
    }

    pub fn add_related_bill(
        &mut self,
        identifier: impl Into<String>,
        legislative_session: impl Into<String>,
        relation_type: impl Into<String>,
    ) {
        self.related_bills.push(RelatedBillRecord {
            identifier: identifier.into(),
            legislative_session: legislative_session.into(),
            relation_type: relation_type.into(),
        });
    }

    /// The pseudo-id other records use to point at this bill.
    pub fn pseudo_id(&self) -> PseudoId {
        PseudoId::new([
            ("identifier", self.identifier.as_str()),
            ("legislative_session", self.legislative_session.as_str()),
        ])
    }
}

impl ActionRecord {
    pub fn with_chamber(&mut self, chamber: impl Into<String>) -> &mut Self {
        self.chamber = Some(chamber.into());
        self
    }

    pub fn with_classification(&mut self, classification: impl Into<String>) -> &mut Self {
        self.classification.push(classification.into());
        self
    }
}

fn add_link(documents: &mut Vec<Document>, note: String, url: String, media_type: String) {
    let link = Link {
        url,
        media_type,
        text: String::new(),
    };
    if let Some(document) = documents.iter_mut().find(|d| d.note == note) {
        document.links.push(link);
        return;
    }
    documents.push(Document {
        note,
        date: String::new(),
        classification: String::new(),
        links: vec![link],
    });
}

/// Scrapers emit classification as either a string or a list.
fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}
