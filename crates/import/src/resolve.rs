//! Resolver strategies: one small lookup per kind of reference.
//!
//! Every lookup is scoped to one jurisdiction. None of them fail on a miss;
//! callers decide whether a miss is fatal (`required`) or tolerated
//! (`optional`).

use legisync_store::model::{OrganizationQuery, PersonQuery};
use legisync_store::{EntityId, Store, StoreError};
use tracing::{info, warn};

use crate::error::ImportError;
use crate::model::{EntityKind, NaturalKey};
use crate::pseudo_id::PseudoId;

/// Classification of the organization standing for a whole legislature.
pub const LEGISLATURE: &str = "legislature";

/// Chamber classifications registered as pseudo-ids on import.
pub const CHAMBERS: [&str; 3] = ["lower", "upper", LEGISLATURE];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(EntityId),
    Missing,
    /// More than one candidate matched.
    Ambiguous(usize),
}

impl Resolution {
    pub fn from_matches(mut ids: Vec<EntityId>) -> Self {
        ids.sort();
        ids.dedup();
        match ids.len() {
            0 => Self::Missing,
            1 => Self::Resolved(ids.remove(0)),
            n => Self::Ambiguous(n),
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Resolved(id) => Some(id),
            _ => None,
        }
    }
}

/// Organization for a chamber classification.
///
/// Without a hint the legislature-wide organization is used; a jurisdiction
/// without one resolves only if it has exactly one chamber.
pub fn chamber(store: &dyn Store, jurisdiction_id: &str, chamber: Option<&str>) -> Result<Resolution, StoreError> {
    let by_classification = |classification: &str| -> Result<Vec<EntityId>, StoreError> {
        let query = OrganizationQuery {
            classification: Some(classification),
            ..Default::default()
        };
        Ok(store
            .find_organizations(jurisdiction_id, &query)?
            .into_iter()
            .map(|org| org.id)
            .collect())
    };

    if let Some(chamber) = chamber {
        return Ok(Resolution::from_matches(by_classification(chamber)?));
    }
    let legislature = by_classification(LEGISLATURE)?;
    if !legislature.is_empty() {
        return Ok(Resolution::from_matches(legislature));
    }
    let mut chambers = by_classification("lower")?;
    chambers.extend(by_classification("upper")?);
    Ok(Resolution::from_matches(chambers))
}

/// Organization named by a `{name, classification}` pseudo-id; either field
/// may be missing.
pub fn organization(store: &dyn Store, jurisdiction_id: &str, pseudo: &PseudoId) -> Result<Resolution, StoreError> {
    if pseudo.fields().keys().any(|k| k != "name" && k != "classification") {
        return Ok(Resolution::Missing);
    }
    if pseudo.get("name").is_none() {
        if let Some(classification) = pseudo.get("classification") {
            return chamber(store, jurisdiction_id, Some(classification));
        }
    }
    let query = OrganizationQuery {
        name: pseudo.get("name"),
        classification: pseudo.get("classification"),
    };
    let ids = store
        .find_organizations(jurisdiction_id, &query)?
        .into_iter()
        .map(|org| org.id)
        .collect();
    Ok(Resolution::from_matches(ids))
}

/// Person named by a `{name}` or `{scheme, identifier}` pseudo-id.
pub fn person(store: &dyn Store, jurisdiction_id: &str, pseudo: &PseudoId) -> Result<Resolution, StoreError> {
    if let (Some(scheme), Some(identifier)) = (pseudo.get("scheme"), pseudo.get("identifier")) {
        return person_by_identifier(store, jurisdiction_id, scheme, identifier);
    }
    let Some(name) = pseudo.get("name") else {
        return Ok(Resolution::Missing);
    };
    let mut people = store.find_people(jurisdiction_id, &PersonQuery::Name(name))?;
    if let Some(birth_date) = pseudo.get("birth_date") {
        people.retain(|p| p.data.birth_date == birth_date);
    }
    Ok(Resolution::from_matches(people.into_iter().map(|p| p.id).collect()))
}

/// Person holding `scheme`/`identifier` and a membership in one of the
/// jurisdiction's organizations. Matches elsewhere never count.
pub fn person_by_identifier(
    store: &dyn Store,
    jurisdiction_id: &str,
    scheme: &str,
    identifier: &str,
) -> Result<Resolution, StoreError> {
    let people = store.find_people(jurisdiction_id, &PersonQuery::Identifier { scheme, identifier })?;
    Ok(Resolution::from_matches(people.into_iter().map(|p| p.id).collect()))
}

pub fn bill(
    store: &dyn Store,
    jurisdiction_id: &str,
    legislative_session: &str,
    identifier: &str,
) -> Result<Resolution, StoreError> {
    Ok(match store.find_bill(jurisdiction_id, legislative_session, identifier)? {
        Some(bill) => Resolution::Resolved(bill.id),
        None => Resolution::Missing,
    })
}

/// Store fallback for a pseudo-id the run has not registered.
pub fn pseudo(
    store: &dyn Store,
    jurisdiction_id: &str,
    kind: EntityKind,
    pseudo: &PseudoId,
) -> Result<Resolution, StoreError> {
    match kind {
        EntityKind::Organization => organization(store, jurisdiction_id, pseudo),
        EntityKind::Person => person(store, jurisdiction_id, pseudo),
        EntityKind::Bill => match (pseudo.get("legislative_session"), pseudo.get("identifier")) {
            (Some(session), Some(identifier)) => bill(store, jurisdiction_id, session, identifier),
            _ => Ok(Resolution::Missing),
        },
        EntityKind::Membership => Ok(Resolution::Missing),
    }
}

/// A structurally required reference: anything but one match fails the
/// entity.
pub fn required(
    resolution: Resolution,
    kind: EntityKind,
    key: &NaturalKey,
    field: &str,
    reference: &str,
) -> Result<EntityId, ImportError> {
    match resolution {
        Resolution::Resolved(id) => Ok(id),
        Resolution::Missing => Err(ImportError::UnresolvedReference {
            kind,
            key: key.clone(),
            field: field.to_string(),
            reference: reference.to_string(),
        }),
        Resolution::Ambiguous(matches) => Err(ImportError::AmbiguousReference {
            kind,
            key: key.clone(),
            field: field.to_string(),
            reference: reference.to_string(),
            matches,
        }),
    }
}

/// An optional reference: misses are logged and left unresolved.
pub fn optional(resolution: Resolution, key: &NaturalKey, field: &str, reference: &str) -> Option<EntityId> {
    match resolution {
        Resolution::Resolved(id) => Some(id),
        Resolution::Missing => {
            info!(%key, field, reference, "reference left unresolved");
            None
        }
        Resolution::Ambiguous(matches) => {
            warn!(%key, field, reference, matches, "ambiguous reference left unresolved");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use legisync_store::model::{MembershipData, OrganizationData, PersonData, PersonIdentifier};
    use legisync_store::{Jurisdiction, SqliteStore};

    const JID: &str = "ocd-jurisdiction/country:us/state:nc/government";

    fn store() -> SqliteStore {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_jurisdiction(&Jurisdiction::new(JID, "North Carolina").with_session("1900", "Session of 1900"))
            .unwrap();
        store
    }

    #[test]
    fn chamber_hint_picks_the_classification() {
        let mut store = store();
        let lower = store.insert_organization(JID, &OrganizationData::new("House", "lower")).unwrap();
        store.insert_organization(JID, &OrganizationData::new("Senate", "upper")).unwrap();

        assert_eq!(chamber(&store, JID, Some("lower")).unwrap(), Resolution::Resolved(lower));
        assert_eq!(chamber(&store, JID, None).unwrap(), Resolution::Ambiguous(2));
        assert_eq!(chamber(&store, JID, Some("committee")).unwrap(), Resolution::Missing);
    }

    #[test]
    fn unicameral_jurisdiction_needs_no_hint() {
        let mut store = store();
        let only = store.insert_organization(JID, &OrganizationData::new("Council", "lower")).unwrap();
        assert_eq!(chamber(&store, JID, None).unwrap(), Resolution::Resolved(only));

        let legislature =
            store.insert_organization(JID, &OrganizationData::new("General Assembly", LEGISLATURE)).unwrap();
        assert_eq!(chamber(&store, JID, None).unwrap(), Resolution::Resolved(legislature));
    }

    #[test]
    fn organization_pseudo_with_unknown_field_misses() {
        let mut store = store();
        store.insert_organization(JID, &OrganizationData::new("House", "lower")).unwrap();
        let pseudo = PseudoId::new([("name", "House"), ("founded", "1776")]);
        assert_eq!(organization(&store, JID, &pseudo).unwrap(), Resolution::Missing);
        let pseudo = PseudoId::new([("name", "House")]);
        assert!(organization(&store, JID, &pseudo).unwrap().id().is_some());
    }

    #[test]
    fn identifier_lookup_requires_membership() {
        let mut store = store();
        let house = store.insert_organization(JID, &OrganizationData::new("House", "lower")).unwrap();

        let mut member = PersonData::new("Zadock Snodgrass");
        member.identifiers.push(PersonIdentifier {
            scheme: "TOTALLY_REAL_SCHEME".into(),
            identifier: "TOTALLY_REAL_ID".into(),
        });
        let member_id = store.insert_person(None, &member).unwrap();
        store.insert_membership(&MembershipData::new(&member_id, &house)).unwrap();
        store.insert_person(None, &member).unwrap();

        assert_eq!(
            person_by_identifier(&store, JID, "TOTALLY_REAL_SCHEME", "TOTALLY_REAL_ID").unwrap(),
            Resolution::Resolved(member_id)
        );
    }

    #[test]
    fn repeated_matches_count_once() {
        let ids = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<EntityId>>();
        assert_eq!(Resolution::from_matches(ids(&["a", "b", "a"])), Resolution::Ambiguous(2));
        assert_eq!(
            Resolution::from_matches(ids(&["a", "a", "a"])),
            Resolution::Resolved("a".to_string())
        );
        assert_eq!(Resolution::from_matches(Vec::new()), Resolution::Missing);
    }

    #[test]
    fn required_reports_missing_and_ambiguous() {
        let key = NaturalKey::new(EntityKind::Membership).with("person", "x");
        let err = required(Resolution::Missing, EntityKind::Person, &key, "person_id", "~{}").unwrap_err();
        assert!(matches!(err, ImportError::UnresolvedReference { .. }));
        let err = required(Resolution::Ambiguous(3), EntityKind::Person, &key, "person_id", "~{}").unwrap_err();
        assert!(matches!(err, ImportError::AmbiguousReference { matches: 3, .. }));
        assert_eq!(optional(Resolution::Ambiguous(2), &key, "person_id", "~{}"), None);
    }
}
