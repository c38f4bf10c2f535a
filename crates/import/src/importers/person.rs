use legisync_store::model::{PersonCollection, PersonData, PersonQuery};
use legisync_store::{EntityId, Store, Stored};

use crate::context::ImportContext;
use crate::diff::{unordered_eq, Changeset};
use crate::engine::EntityImporter;
use crate::error::ImportError;
use crate::model::{EntityKind, NaturalKey};
use crate::pseudo_id::PseudoId;
use crate::record::PersonRecord;
use crate::transform::Transformers;

#[derive(Debug, Clone, Copy, Default)]
pub struct PersonImporter;

impl EntityImporter for PersonImporter {
    const KIND: EntityKind = EntityKind::Person;

    type Record = PersonRecord;
    type Data = PersonData;
    type Collection = PersonCollection;

    fn transform(&self, transformers: &Transformers, mut record: PersonRecord) -> Result<PersonRecord, ImportError> {
        transformers.apply(Self::KIND, "name", &mut record.name)?;
        transformers.apply(Self::KIND, "birth_date", &mut record.birth_date)?;
        transformers.apply(Self::KIND, "death_date", &mut record.death_date)?;
        transformers.apply_all(
            Self::KIND,
            "identifiers.identifier",
            record.identifiers.iter_mut().map(|i| &mut i.identifier),
        )?;
        Ok(record)
    }

    fn natural_key(&self, jurisdiction_id: &str, record: &PersonRecord) -> NaturalKey {
        NaturalKey::new(Self::KIND)
            .with("jurisdiction", jurisdiction_id)
            .with("name", record.name.as_str())
            .with("birth_date", record.birth_date.as_str())
    }

    fn pseudo_ids(&self, record: &PersonRecord) -> Vec<PseudoId> {
        vec![PseudoId::new([("name", record.name.as_str())])]
    }

    fn resolve(
        &self,
        _cx: &mut ImportContext,
        _store: &dyn Store,
        record: &PersonRecord,
    ) -> Result<PersonData, ImportError> {
        Ok(PersonData {
            name: record.name.clone(),
            birth_date: record.birth_date.clone(),
            death_date: record.death_date.clone(),
            identifiers: record.identifiers.clone(),
            sources: record.sources.clone(),
            extras: record.extras.clone(),
        })
    }

    /// Same-named people in the jurisdiction. A birth date on the record
    /// keeps only people born that day, or with no birth date on file when
    /// nobody matches exactly.
    fn find_existing(
        &self,
        cx: &ImportContext,
        store: &dyn Store,
        key: &NaturalKey,
        data: &PersonData,
    ) -> Result<Option<Stored<PersonData>>, ImportError> {
        let mut matches = store.find_people(cx.jurisdiction_id(), &PersonQuery::Name(&data.name))?;
        if !data.birth_date.is_empty() {
            if matches.iter().any(|p| p.data.birth_date == data.birth_date) {
                matches.retain(|p| p.data.birth_date == data.birth_date);
            } else {
                matches.retain(|p| p.data.birth_date.is_empty());
            }
        }
        match matches.len() {
            0 | 1 => Ok(matches.pop()),
            _ => Err(ImportError::Duplicate {
                key: key.clone(),
                first: matches[0].id.clone(),
                second: matches[1].id.clone(),
            }),
        }
    }

    fn diff(&self, current: &PersonData, incoming: &PersonData) -> Changeset<PersonCollection> {
        let mut changes = Changeset::new();
        changes.field_if(
            current.name != incoming.name
                || current.birth_date != incoming.birth_date
                || current.death_date != incoming.death_date
                || current.extras != incoming.extras,
        );
        changes.collection_if(
            PersonCollection::Identifiers,
            !unordered_eq(&current.identifiers, &incoming.identifiers),
        );
        changes.collection_if(PersonCollection::Sources, !unordered_eq(&current.sources, &incoming.sources));
        changes
    }

    fn create(&self, cx: &ImportContext, store: &mut dyn Store, data: &PersonData) -> Result<EntityId, ImportError> {
        Ok(store.insert_person(Some(cx.jurisdiction_id()), data)?)
    }

    fn update(
        &self,
        store: &mut dyn Store,
        id: &str,
        data: &PersonData,
        changes: &Changeset<PersonCollection>,
    ) -> Result<(), ImportError> {
        if changes.fields {
            store.update_person(id, data)?;
        }
        for collection in &changes.collections {
            store.replace_person_collection(id, *collection, data)?;
        }
        Ok(())
    }
}
