use std::convert::Infallible;

use legisync_store::model::MembershipData;
use legisync_store::{EntityId, Store, Stored};

use crate::context::ImportContext;
use crate::diff::Changeset;
use crate::engine::EntityImporter;
use crate::error::ImportError;
use crate::model::{EntityKind, NaturalKey};
use crate::pseudo_id::PseudoId;
use crate::record::MembershipRecord;
use crate::resolve;
use crate::transform::Transformers;

/// Person-to-organization links. Both ends are required.
#[derive(Debug, Clone, Copy, Default)]
pub struct MembershipImporter;

impl EntityImporter for MembershipImporter {
    const KIND: EntityKind = EntityKind::Membership;

    type Record = MembershipRecord;
    type Data = MembershipData;
    type Collection = Infallible;

    fn transform(
        &self,
        transformers: &Transformers,
        mut record: MembershipRecord,
    ) -> Result<MembershipRecord, ImportError> {
        transformers.apply(Self::KIND, "role", &mut record.role)?;
        transformers.apply(Self::KIND, "label", &mut record.label)?;
        transformers.apply(Self::KIND, "start_date", &mut record.start_date)?;
        transformers.apply(Self::KIND, "end_date", &mut record.end_date)?;
        Ok(record)
    }

    fn natural_key(&self, jurisdiction_id: &str, record: &MembershipRecord) -> NaturalKey {
        NaturalKey::new(Self::KIND)
            .with("jurisdiction", jurisdiction_id)
            .with("person", record.person_id.encode())
            .with("organization", record.organization_id.encode())
            .with("role", record.role.as_str())
            .with("label", record.label.as_str())
    }

    fn pseudo_ids(&self, _record: &MembershipRecord) -> Vec<PseudoId> {
        Vec::new()
    }

    fn resolve(
        &self,
        cx: &mut ImportContext,
        store: &dyn Store,
        record: &MembershipRecord,
    ) -> Result<MembershipData, ImportError> {
        let key = self.natural_key(cx.jurisdiction_id(), record);
        let person = cx.resolve(store, EntityKind::Person, &record.person_id)?;
        let person_id = resolve::required(person, EntityKind::Person, &key, "person_id", &record.person_id.encode())?;
        let organization = cx.resolve(store, EntityKind::Organization, &record.organization_id)?;
        let organization_id = resolve::required(
            organization,
            EntityKind::Organization,
            &key,
            "organization_id",
            &record.organization_id.encode(),
        )?;
        Ok(MembershipData {
            person_id,
            organization_id,
            role: record.role.clone(),
            label: record.label.clone(),
            start_date: record.start_date.clone(),
            end_date: record.end_date.clone(),
        })
    }

    fn find_existing(
        &self,
        _cx: &ImportContext,
        store: &dyn Store,
        _key: &NaturalKey,
        data: &MembershipData,
    ) -> Result<Option<Stored<MembershipData>>, ImportError> {
        Ok(store
            .find_memberships(&data.person_id, &data.organization_id)?
            .into_iter()
            .find(|m| m.data.role == data.role && m.data.label == data.label))
    }

    fn diff(&self, current: &MembershipData, incoming: &MembershipData) -> Changeset<Infallible> {
        let mut changes = Changeset::new();
        changes.field_if(current.start_date != incoming.start_date || current.end_date != incoming.end_date);
        changes
    }

    fn create(
        &self,
        _cx: &ImportContext,
        store: &mut dyn Store,
        data: &MembershipData,
    ) -> Result<EntityId, ImportError> {
        Ok(store.insert_membership(data)?)
    }

    fn update(
        &self,
        store: &mut dyn Store,
        id: &str,
        data: &MembershipData,
        _changes: &Changeset<Infallible>,
    ) -> Result<(), ImportError> {
        Ok(store.update_membership(id, data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::import_item;
    use crate::model::ImportStatus;
    use legisync_store::model::{OrganizationData, PersonData};
    use legisync_store::{Jurisdiction, SqliteStore};

    const JID: &str = "ocd-jurisdiction/country:us/state:nc/government";

    #[test]
    fn membership_links_resolved_ends() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let jurisdiction = Jurisdiction::new(JID, "North Carolina");
        store.insert_jurisdiction(&jurisdiction).unwrap();
        let house = store.insert_organization(JID, &OrganizationData::new("House", "lower")).unwrap();
        let smith = store.insert_person(Some(JID), &PersonData::new("Adam Smith")).unwrap();

        let mut record = MembershipRecord::new(
            PseudoId::new([("name", "Adam Smith")]),
            PseudoId::new([("classification", "lower")]),
        );
        record.role = "member".into();

        let mut cx = ImportContext::new(jurisdiction.clone());
        let (id, status) = import_item(&MembershipImporter, &mut cx, &mut store, record.clone()).unwrap();
        assert_eq!(status, ImportStatus::Insert);
        let stored = store.find_memberships(&smith, &house).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, id);

        record.end_date = "1901-01-01".into();
        let mut cx = ImportContext::new(jurisdiction);
        let (_, status) = import_item(&MembershipImporter, &mut cx, &mut store, record).unwrap();
        assert_eq!(status, ImportStatus::Update);
        assert_eq!(store.find_memberships(&smith, &house).unwrap()[0].data.end_date, "1901-01-01");
    }

    #[test]
    fn unknown_person_fails_the_membership() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let jurisdiction = Jurisdiction::new(JID, "North Carolina");
        store.insert_jurisdiction(&jurisdiction).unwrap();
        store.insert_organization(JID, &OrganizationData::new("House", "lower")).unwrap();

        let record = MembershipRecord::new(
            PseudoId::new([("name", "Nobody")]),
            PseudoId::new([("classification", "lower")]),
        );
        let mut cx = ImportContext::new(jurisdiction);
        let err = import_item(&MembershipImporter, &mut cx, &mut store, record).unwrap_err();
        match err {
            ImportError::UnresolvedReference { field, .. } => assert_eq!(field, "person_id"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
