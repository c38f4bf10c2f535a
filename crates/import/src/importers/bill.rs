//! Bills and their owned collections.
//!
//! Bills are keyed by (jurisdiction, legislative_session, identifier) no
//! matter which chamber they come from. Each collection is compared as a
//! whole and replaced wholesale when it differs; actions compare in order,
//! everything else as a multiset.

use legisync_store::model::{
    Action, ActionSummary, BillCollection, BillData, Document, Link, RelatedBill, RelatedEntity,
    Sponsorship, UnresolvedRelatedBill,
};
use legisync_store::{EntityId, Store, Stored};
use tracing::info;

use crate::context::ImportContext;
use crate::diff::{ordered_eq, unordered_eq, unordered_eq_by, Changeset};
use crate::engine::{absorb, in_transaction, EntityImporter};
use crate::error::ImportError;
use crate::model::{EntityKind, NaturalKey};
use crate::pseudo_id::PseudoId;
use crate::record::{ActionRecord, BillRecord, RelatedEntityRecord, SponsorshipRecord};
use crate::resolve::{self, Resolution};
use crate::transform::Transformers;

#[derive(Debug, Clone, Copy, Default)]
pub struct BillImporter;

impl EntityImporter for BillImporter {
    const KIND: EntityKind = EntityKind::Bill;

    type Record = BillRecord;
    type Data = BillData;
    type Collection = BillCollection;

    fn transform(&self, transformers: &Transformers, mut record: BillRecord) -> Result<BillRecord, ImportError> {
        let kind = Self::KIND;
        transformers.apply(kind, "identifier", &mut record.identifier)?;
        transformers.apply(kind, "legislative_session", &mut record.legislative_session)?;
        transformers.apply(kind, "title", &mut record.title)?;
        transformers.apply_all(kind, "classification", record.classification.iter_mut())?;
        transformers.apply_all(kind, "subject", record.subject.iter_mut())?;
        transformers.apply_all(kind, "actions.description", record.actions.iter_mut().map(|a| &mut a.description))?;
        transformers.apply_all(kind, "actions.date", record.actions.iter_mut().map(|a| &mut a.date))?;
        transformers.apply_all(kind, "sponsorships.name", record.sponsorships.iter_mut().map(|s| &mut s.name))?;
        transformers.apply_all(kind, "other_titles.title", record.other_titles.iter_mut().map(|t| &mut t.title))?;
        transformers.apply_all(
            kind,
            "other_identifiers.identifier",
            record.other_identifiers.iter_mut().map(|i| &mut i.identifier),
        )?;
        transformers.apply_all(kind, "documents.note", record.documents.iter_mut().map(|d| &mut d.note))?;
        transformers.apply_all(kind, "versions.note", record.versions.iter_mut().map(|d| &mut d.note))?;
        transformers.apply_all(
            kind,
            "related_bills.identifier",
            record.related_bills.iter_mut().map(|r| &mut r.identifier),
        )?;
        Ok(record)
    }

    fn natural_key(&self, jurisdiction_id: &str, record: &BillRecord) -> NaturalKey {
        NaturalKey::new(Self::KIND)
            .with("jurisdiction", jurisdiction_id)
            .with("legislative_session", record.legislative_session.as_str())
            .with("identifier", record.identifier.as_str())
    }

    fn pseudo_ids(&self, record: &BillRecord) -> Vec<PseudoId> {
        vec![record.pseudo_id()]
    }

    fn resolve(&self, cx: &mut ImportContext, store: &dyn Store, record: &BillRecord) -> Result<BillData, ImportError> {
        let key = self.natural_key(cx.jurisdiction_id(), record);
        if cx.jurisdiction().session(&record.legislative_session).is_none() {
            return Err(ImportError::UnresolvedReference {
                kind: Self::KIND,
                key,
                field: "legislative_session".to_string(),
                reference: record.legislative_session.clone(),
            });
        }

        let from_organization_id = resolve_from_organization(cx, store, record, &key)?;
        let mut bill = BillData::new(
            record.identifier.as_str(),
            record.legislative_session.as_str(),
            record.title.as_str(),
            from_organization_id.as_str(),
        );
        bill.classification = record.classification.clone();
        bill.subject = record.subject.clone();
        bill.extras = record.extras.clone();

        for action in &record.actions {
            bill.actions.push(resolve_action(cx, store, action, &from_organization_id, &key)?);
        }
        for sponsorship in &record.sponsorships {
            bill.sponsorships.push(resolve_sponsorship(cx, store, sponsorship, &key)?);
        }
        for related in &record.related_bills {
            // Unimported targets stay unresolved until `post_import`.
            let target = resolve::bill(store, cx.jurisdiction_id(), &related.legislative_session, &related.identifier)?;
            bill.related_bills.push(RelatedBill {
                identifier: related.identifier.clone(),
                legislative_session: related.legislative_session.clone(),
                relation_type: related.relation_type.clone(),
                related_bill_id: target.id().map(str::to_string),
            });
        }

        bill.other_titles = record.other_titles.clone();
        bill.other_identifiers = record.other_identifiers.clone();
        bill.abstracts = record.abstracts.clone();
        bill.documents = record.documents.clone();
        bill.versions = record.versions.clone();
        bill.sources = record.sources.clone();
        Ok(bill)
    }

    fn find_existing(
        &self,
        cx: &ImportContext,
        store: &dyn Store,
        _key: &NaturalKey,
        data: &BillData,
    ) -> Result<Option<Stored<BillData>>, ImportError> {
        Ok(store.find_bill(cx.jurisdiction_id(), &data.legislative_session, &data.identifier)?)
    }

    fn diff(&self, current: &BillData, incoming: &BillData) -> Changeset<BillCollection> {
        let mut changes = Changeset::new();
        changes.field_if(
            current.identifier != incoming.identifier
                || current.legislative_session != incoming.legislative_session
                || current.title != incoming.title
                || current.classification != incoming.classification
                || current.subject != incoming.subject
                || current.from_organization_id != incoming.from_organization_id
                || current.extras != incoming.extras,
        );

        use BillCollection::*;
        changes.collection_if(Actions, !ordered_eq(&current.actions, &incoming.actions));
        changes.collection_if(Sponsorships, !unordered_eq(&current.sponsorships, &incoming.sponsorships));
        changes.collection_if(OtherTitles, !unordered_eq(&current.other_titles, &incoming.other_titles));
        changes.collection_if(
            OtherIdentifiers,
            !unordered_eq(&current.other_identifiers, &incoming.other_identifiers),
        );
        changes.collection_if(Abstracts, !unordered_eq(&current.abstracts, &incoming.abstracts));
        changes.collection_if(Documents, !documents_eq(&current.documents, &incoming.documents));
        changes.collection_if(Versions, !documents_eq(&current.versions, &incoming.versions));
        changes.collection_if(Sources, !unordered_eq(&current.sources, &incoming.sources));
        changes.collection_if(
            RelatedBills,
            !unordered_eq_by(&current.related_bills, &incoming.related_bills, |r| {
                (&r.identifier, &r.legislative_session, &r.relation_type)
            }),
        );
        changes
    }

    fn create(&self, cx: &ImportContext, store: &mut dyn Store, data: &BillData) -> Result<EntityId, ImportError> {
        let id = store.insert_bill(cx.jurisdiction_id(), data)?;
        store.set_action_summary(&id, &summarize_actions(&data.actions))?;
        Ok(id)
    }

    fn update(
        &self,
        store: &mut dyn Store,
        id: &str,
        data: &BillData,
        changes: &Changeset<BillCollection>,
    ) -> Result<(), ImportError> {
        if changes.fields {
            store.update_bill(id, data)?;
        }
        for collection in &changes.collections {
            store.replace_bill_collection(id, *collection, data)?;
        }
        store.set_action_summary(id, &summarize_actions(&data.actions))?;
        Ok(())
    }

    /// Point related-bill rows at bills imported after them.
    fn post_import(&self, cx: &mut ImportContext, store: &mut dyn Store) -> Result<(), ImportError> {
        let mut resolved = 0usize;
        for pending in store.unresolved_related_bills(cx.jurisdiction_id())? {
            match link_related_bill(cx.jurisdiction_id(), store, &pending) {
                Ok(true) => resolved += 1,
                Ok(false) => {}
                Err(err) => {
                    let key = NaturalKey::new(Self::KIND)
                        .with("id", pending.bill_id.as_str())
                        .with("related_bill", pending.identifier.as_str());
                    absorb(cx, Self::KIND, &key, err)?;
                }
            }
        }
        if resolved > 0 {
            info!(jurisdiction = cx.jurisdiction_id(), resolved, "resolved related bills");
        }
        Ok(())
    }
}

/// Resolve one pending related-bill row; `false` while its target is missing.
fn link_related_bill(
    jurisdiction_id: &str,
    store: &mut dyn Store,
    pending: &UnresolvedRelatedBill,
) -> Result<bool, ImportError> {
    let target = resolve::bill(&*store, jurisdiction_id, &pending.legislative_session, &pending.identifier)?;
    let Resolution::Resolved(target) = target else {
        return Ok(false);
    };
    in_transaction(store, |store| {
        store.resolve_related_bill(&pending.bill_id, pending.position, &target)?;
        Ok(true)
    })
}

/// Explicit organization, else the chamber hint, else the legislature.
fn resolve_from_organization(
    cx: &mut ImportContext,
    store: &dyn Store,
    record: &BillRecord,
    key: &NaturalKey,
) -> Result<EntityId, ImportError> {
    if let Some(organization) = &record.from_organization {
        let resolution = cx.resolve(store, EntityKind::Organization, organization)?;
        let reference = organization.encode();
        return resolve::required(resolution, EntityKind::Organization, key, "from_organization", &reference);
    }
    let chamber = record.chamber.as_deref();
    let resolution = match chamber {
        Some(chamber) => {
            let pseudo = PseudoId::new([("classification", chamber)]);
            cx.resolve(store, EntityKind::Organization, &pseudo)?
        }
        None => resolve::chamber(store, cx.jurisdiction_id(), None)?,
    };
    resolve::required(
        resolution,
        EntityKind::Organization,
        key,
        "from_organization",
        chamber.unwrap_or(resolve::LEGISLATURE),
    )
}

fn resolve_action(
    cx: &mut ImportContext,
    store: &dyn Store,
    action: &ActionRecord,
    bill_organization: &str,
    key: &NaturalKey,
) -> Result<Action, ImportError> {
    let organization = match (&action.organization_id, &action.chamber) {
        (Some(pseudo), _) => Some((cx.resolve(store, EntityKind::Organization, pseudo)?, pseudo.encode())),
        (None, Some(chamber)) => {
            let pseudo = PseudoId::new([("classification", chamber.as_str())]);
            Some((cx.resolve(store, EntityKind::Organization, &pseudo)?, chamber.clone()))
        }
        (None, None) => None,
    };
    let organization_id = match organization {
        Some((resolution, reference)) => {
            resolve::required(resolution, EntityKind::Organization, key, "actions.organization", &reference)?
        }
        None => bill_organization.to_string(),
    };

    let mut related_entities = Vec::with_capacity(action.related_entities.len());
    for entity in &action.related_entities {
        related_entities.push(resolve_related_entity(cx, store, entity, key)?);
    }
    Ok(Action {
        description: action.description.clone(),
        date: action.date.clone(),
        organization_id,
        classification: action.classification.clone(),
        related_entities,
    })
}

fn resolve_related_entity(
    cx: &mut ImportContext,
    store: &dyn Store,
    entity: &RelatedEntityRecord,
    key: &NaturalKey,
) -> Result<RelatedEntity, ImportError> {
    let kind = entity_kind(&entity.entity_type);
    let id = match &entity.entity_id {
        Some(pseudo) => {
            let resolution = cx.resolve(store, kind, pseudo)?;
            resolve::optional(resolution, key, "actions.related_entities", &pseudo.encode())
        }
        None => None,
    };
    let (person_id, organization_id) = split_by_kind(kind, id);
    Ok(RelatedEntity {
        name: entity.name.clone(),
        entity_type: entity.entity_type.clone(),
        person_id,
        organization_id,
    })
}

/// Sponsor lookup, first hit wins: explicit pseudo-id, then
/// scheme+identifier among the jurisdiction's members, else name only.
fn resolve_sponsorship(
    cx: &mut ImportContext,
    store: &dyn Store,
    sponsorship: &SponsorshipRecord,
    key: &NaturalKey,
) -> Result<Sponsorship, ImportError> {
    let kind = entity_kind(&sponsorship.entity_type);
    let lookup = if let Some(pseudo) = &sponsorship.entity_id {
        Some((cx.resolve(store, kind, pseudo)?, pseudo.encode()))
    } else if let (Some(scheme), Some(identifier), EntityKind::Person) =
        (&sponsorship.scheme, &sponsorship.identifier, kind)
    {
        let resolution = resolve::person_by_identifier(store, cx.jurisdiction_id(), scheme, identifier)?;
        Some((resolution, format!("{scheme}:{identifier}")))
    } else {
        None
    };
    let id = lookup.and_then(|(resolution, reference)| resolve::optional(resolution, key, "sponsorships", &reference));
    let (person_id, organization_id) = split_by_kind(kind, id);
    Ok(Sponsorship {
        name: sponsorship.name.clone(),
        entity_type: sponsorship.entity_type.clone(),
        classification: sponsorship.classification.clone(),
        primary: sponsorship.primary,
        person_id,
        organization_id,
    })
}

fn entity_kind(entity_type: &str) -> EntityKind {
    if entity_type == "organization" {
        EntityKind::Organization
    } else {
        EntityKind::Person
    }
}

fn split_by_kind(kind: EntityKind, id: Option<EntityId>) -> (Option<EntityId>, Option<EntityId>) {
    match kind {
        EntityKind::Organization => (None, id),
        _ => (id, None),
    }
}

/// Documents match when the same (note, date, classification) groups hold
/// the same links, in any order.
fn documents_eq(a: &[Document], b: &[Document]) -> bool {
    unordered_eq_by(a, b, |d| {
        let mut links: Vec<&Link> = d.links.iter().collect();
        links.sort();
        (&d.note, &d.date, &d.classification, links)
    })
}

/// Derived action fields: earliest and latest action by date, ties broken by
/// position in the list.
pub fn summarize_actions(actions: &[Action]) -> ActionSummary {
    let mut ordered: Vec<&Action> = actions.iter().collect();
    // stable: equal dates keep input order
    ordered.sort_by(|a, b| a.date.cmp(&b.date));
    let first = ordered.first();
    let latest = ordered.last();
    ActionSummary {
        first_action_date: first.map(|a| a.date.clone()),
        latest_action_date: latest.map(|a| a.date.clone()),
        latest_action_description: latest.map(|a| a.description.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(description: &str, date: &str) -> Action {
        Action {
            description: description.into(),
            date: date.into(),
            organization_id: "ocd-organization/house".into(),
            classification: Vec::new(),
            related_entities: Vec::new(),
        }
    }

    #[test]
    fn summary_uses_chronological_bounds() {
        let actions = vec![
            action("sent to committee", "1900-04-04"),
            action("introduced in house", "1900-04-01"),
        ];
        let summary = summarize_actions(&actions);
        assert_eq!(summary.first_action_date.as_deref(), Some("1900-04-01"));
        assert_eq!(summary.latest_action_date.as_deref(), Some("1900-04-04"));
        assert_eq!(summary.latest_action_description.as_deref(), Some("sent to committee"));
    }

    #[test]
    fn summary_ties_fall_back_to_input_order() {
        let actions = vec![action("first", "1900-04-01"), action("second", "1900-04-01")];
        let summary = summarize_actions(&actions);
        assert_eq!(summary.latest_action_description.as_deref(), Some("second"));
        assert_eq!(summarize_actions(&[]), ActionSummary::default());
    }

    #[test]
    fn document_links_compare_as_sets() {
        let link = |url: &str| Link {
            url: url.into(),
            media_type: "text/html".into(),
            text: String::new(),
        };
        let doc = |links: Vec<Link>| Document {
            note: "Fiscal Note".into(),
            date: String::new(),
            classification: String::new(),
            links,
        };
        let a = vec![doc(vec![link("http://a"), link("http://b")])];
        let b = vec![doc(vec![link("http://b"), link("http://a")])];
        let c = vec![doc(vec![link("http://a")])];
        assert!(documents_eq(&a, &b));
        assert!(!documents_eq(&a, &c));
    }

    #[test]
    fn action_order_is_a_change() {
        let mut current = BillData::new("HB 1", "1900", "Axe & Tack Tax Act", "ocd-organization/house");
        current.actions = vec![action("a", "1900-04-01"), action("b", "1900-04-02")];
        let mut incoming = current.clone();
        incoming.actions.reverse();
        let changes = BillImporter.diff(&current, &incoming);
        assert_eq!(changes.collections, vec![BillCollection::Actions]);
        assert!(!changes.fields);
    }

    #[test]
    fn related_bill_target_is_not_compared() {
        let mut current = BillData::new("HB 1", "1900", "Axe & Tack Tax Act", "ocd-organization/house");
        current.related_bills.push(RelatedBill {
            identifier: "HB 99".into(),
            legislative_session: "1899".into(),
            relation_type: "prior-session".into(),
            related_bill_id: Some("ocd-bill/99".into()),
        });
        let mut incoming = current.clone();
        incoming.related_bills[0].related_bill_id = None;
        assert!(BillImporter.diff(&current, &incoming).is_empty());
    }
}
