use std::convert::Infallible;

use legisync_store::model::{OrganizationData, OrganizationQuery};
use legisync_store::{EntityId, Store, Stored};

use crate::context::ImportContext;
use crate::diff::Changeset;
use crate::engine::EntityImporter;
use crate::error::ImportError;
use crate::model::{EntityKind, NaturalKey};
use crate::pseudo_id::PseudoId;
use crate::record::OrganizationRecord;
use crate::resolve::{self, CHAMBERS};
use crate::transform::Transformers;

/// Chambers, committees and parties, keyed by (name, classification).
#[derive(Debug, Clone, Copy, Default)]
pub struct OrganizationImporter;

impl EntityImporter for OrganizationImporter {
    const KIND: EntityKind = EntityKind::Organization;

    type Record = OrganizationRecord;
    type Data = OrganizationData;
    type Collection = Infallible;

    fn transform(
        &self,
        transformers: &Transformers,
        mut record: OrganizationRecord,
    ) -> Result<OrganizationRecord, ImportError> {
        transformers.apply(Self::KIND, "name", &mut record.name)?;
        transformers.apply(Self::KIND, "classification", &mut record.classification)?;
        Ok(record)
    }

    fn natural_key(&self, jurisdiction_id: &str, record: &OrganizationRecord) -> NaturalKey {
        NaturalKey::new(Self::KIND)
            .with("jurisdiction", jurisdiction_id)
            .with("name", record.name.as_str())
            .with("classification", record.classification.as_str())
    }

    fn pseudo_ids(&self, record: &OrganizationRecord) -> Vec<PseudoId> {
        let mut ids = vec![
            PseudoId::new([("name", record.name.as_str())]),
            PseudoId::new([
                ("name", record.name.as_str()),
                ("classification", record.classification.as_str()),
            ]),
        ];
        if CHAMBERS.contains(&record.classification.as_str()) {
            ids.push(PseudoId::new([("classification", record.classification.as_str())]));
        }
        ids
    }

    fn resolve(
        &self,
        cx: &mut ImportContext,
        store: &dyn Store,
        record: &OrganizationRecord,
    ) -> Result<OrganizationData, ImportError> {
        let parent_id = match &record.parent_id {
            Some(parent) => {
                let key = self.natural_key(cx.jurisdiction_id(), record);
                let resolution = cx.resolve(store, Self::KIND, parent)?;
                Some(resolve::required(resolution, Self::KIND, &key, "parent_id", &parent.encode())?)
            }
            None => None,
        };
        Ok(OrganizationData {
            name: record.name.clone(),
            classification: record.classification.clone(),
            parent_id,
            extras: record.extras.clone(),
        })
    }

    fn find_existing(
        &self,
        cx: &ImportContext,
        store: &dyn Store,
        key: &NaturalKey,
        data: &OrganizationData,
    ) -> Result<Option<Stored<OrganizationData>>, ImportError> {
        let query = OrganizationQuery {
            name: Some(&data.name),
            classification: Some(&data.classification),
        };
        let mut matches = store.find_organizations(cx.jurisdiction_id(), &query)?;
        match matches.len() {
            0 | 1 => Ok(matches.pop()),
            _ => Err(ImportError::Duplicate {
                key: key.clone(),
                first: matches[0].id.clone(),
                second: matches[1].id.clone(),
            }),
        }
    }

    fn diff(&self, current: &OrganizationData, incoming: &OrganizationData) -> Changeset<Infallible> {
        let mut changes = Changeset::new();
        changes.field_if(current != incoming);
        changes
    }

    fn create(
        &self,
        cx: &ImportContext,
        store: &mut dyn Store,
        data: &OrganizationData,
    ) -> Result<EntityId, ImportError> {
        Ok(store.insert_organization(cx.jurisdiction_id(), data)?)
    }

    fn update(
        &self,
        store: &mut dyn Store,
        id: &str,
        data: &OrganizationData,
        _changes: &Changeset<Infallible>,
    ) -> Result<(), ImportError> {
        Ok(store.update_organization(id, data)?)
    }
}
