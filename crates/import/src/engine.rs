//! The generic diff/merge engine.
//!
//! An `EntityImporter` describes one entity kind: how to key it, how to turn
//! a record into storable data, how to compare it and how to write it. The
//! free functions here drive any importer through the same
//! insert/update/noop decision.

use std::collections::{HashMap, HashSet};
use std::fmt;

use legisync_store::{EntityId, Store, Stored};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::context::ImportContext;
use crate::diff::{fingerprint, Changeset};
use crate::error::ImportError;
use crate::model::{EntityKind, ErrorPolicy, ImportCounts, ImportFailure, ImportStatus, NaturalKey};
use crate::pseudo_id::PseudoId;
use crate::transform::Transformers;

pub trait EntityImporter {
    const KIND: EntityKind;

    type Record: Serialize;
    /// Resolved, comparable form; what the store persists.
    type Data;
    /// Owned collections replaced wholesale on change.
    type Collection: Copy + fmt::Debug;

    fn transform(&self, transformers: &Transformers, record: Self::Record) -> Result<Self::Record, ImportError>;

    fn natural_key(&self, jurisdiction_id: &str, record: &Self::Record) -> NaturalKey;

    /// Pseudo-ids later records may use to reference this entity.
    fn pseudo_ids(&self, record: &Self::Record) -> Vec<PseudoId>;

    fn resolve(
        &self,
        cx: &mut ImportContext,
        store: &dyn Store,
        record: &Self::Record,
    ) -> Result<Self::Data, ImportError>;

    /// The persisted entity sharing the natural key, if any.
    fn find_existing(
        &self,
        cx: &ImportContext,
        store: &dyn Store,
        key: &NaturalKey,
        data: &Self::Data,
    ) -> Result<Option<Stored<Self::Data>>, ImportError>;

    fn diff(&self, current: &Self::Data, incoming: &Self::Data) -> Changeset<Self::Collection>;

    fn create(&self, cx: &ImportContext, store: &mut dyn Store, data: &Self::Data) -> Result<EntityId, ImportError>;

    fn update(
        &self,
        store: &mut dyn Store,
        id: &str,
        data: &Self::Data,
        changes: &Changeset<Self::Collection>,
    ) -> Result<(), ImportError>;

    /// Runs once after every record of the kind has been imported.
    fn post_import(&self, _cx: &mut ImportContext, _store: &mut dyn Store) -> Result<(), ImportError> {
        Ok(())
    }
}

/// A transformed record with its key and canonical encoding.
struct Prepared<R> {
    record: R,
    key: NaturalKey,
    encoded: String,
    fingerprint: String,
}

fn prepare<I: EntityImporter>(
    importer: &I,
    cx: &ImportContext,
    record: I::Record,
) -> Result<Prepared<I::Record>, (NaturalKey, ImportError)> {
    let raw_key = importer.natural_key(cx.jurisdiction_id(), &record);
    let record = importer.transform(cx.transformers(), record).map_err(|e| (raw_key.clone(), e))?;
    let key = importer.natural_key(cx.jurisdiction_id(), &record);
    let encoded = serde_json::to_string(&record).map_err(|e| (key.clone(), ImportError::from(e)))?;
    Ok(Prepared {
        fingerprint: fingerprint(&encoded),
        record,
        key,
        encoded,
    })
}

/// Import one record: insert it, update the matching entity, or leave it
/// untouched when nothing differs.
pub fn import_item<I: EntityImporter>(
    importer: &I,
    cx: &mut ImportContext,
    store: &mut dyn Store,
    record: I::Record,
) -> Result<(EntityId, ImportStatus), ImportError> {
    let item = prepare(importer, cx, record).map_err(|(_, e)| e)?;
    import_prepared(importer, cx, store, &item)
}

fn import_prepared<I: EntityImporter>(
    importer: &I,
    cx: &mut ImportContext,
    store: &mut dyn Store,
    item: &Prepared<I::Record>,
) -> Result<(EntityId, ImportStatus), ImportError> {
    let data = importer.resolve(cx, &*store, &item.record)?;
    let existing = importer.find_existing(cx, &*store, &item.key, &data)?;

    let (id, status) = match existing {
        None => {
            let id = in_transaction(store, |store| importer.create(cx, store, &data))?;
            (id, ImportStatus::Insert)
        }
        Some(current) => {
            cx.claim(I::KIND, &current.id, &item.key, &item.fingerprint, &item.encoded)?;
            let changes = importer.diff(&current.data, &data);
            if changes.is_empty() {
                (current.id, ImportStatus::Noop)
            } else {
                debug!(key = %item.key, ?changes, "entity changed");
                in_transaction(store, |store| importer.update(store, &current.id, &data, &changes))?;
                (current.id, ImportStatus::Update)
            }
        }
    };

    cx.claim(I::KIND, &id, &item.key, &item.fingerprint, &item.encoded)?;
    for pseudo in importer.pseudo_ids(&item.record) {
        cx.register(I::KIND, pseudo, id.clone());
    }
    debug!(key = %item.key, %id, %status, "imported");
    Ok((id, status))
}

/// Run `write` as one unit: committed together or rolled back.
pub(crate) fn in_transaction<T>(
    store: &mut dyn Store,
    write: impl FnOnce(&mut dyn Store) -> Result<T, ImportError>,
) -> Result<T, ImportError> {
    store.begin()?;
    match write(&mut *store) {
        Ok(value) => {
            store.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = store.rollback() {
                warn!(%rollback, "rollback failed");
            }
            Err(err)
        }
    }
}

/// Import every record of one kind and return its counts.
///
/// Records sharing a natural key are checked first: identical copies collapse
/// into one import, differing ones fail as duplicates before anything is
/// written. Per-entity failures follow the context's `ErrorPolicy`.
pub fn import_data<I: EntityImporter>(
    importer: &I,
    cx: &mut ImportContext,
    store: &mut dyn Store,
    records: Vec<I::Record>,
) -> Result<ImportCounts, ImportError> {
    let mut counts = ImportCounts::default();
    let items = prepare_all(importer, cx, records)?;

    for item in &items {
        match import_prepared(importer, cx, store, item) {
            Ok((_, status)) => counts.record(status),
            Err(err) => absorb(cx, I::KIND, &item.key, err)?,
        }
    }
    importer.post_import(cx, store)?;

    info!(
        kind = %I::KIND,
        insert = counts.insert,
        update = counts.update,
        noop = counts.noop,
        "import finished"
    );
    Ok(counts)
}

fn prepare_all<I: EntityImporter>(
    importer: &I,
    cx: &mut ImportContext,
    records: Vec<I::Record>,
) -> Result<Vec<Prepared<I::Record>>, ImportError> {
    let mut prepared: Vec<Option<Prepared<I::Record>>> = Vec::with_capacity(records.len());
    let mut by_key: HashMap<NaturalKey, usize> = HashMap::new();
    let mut conflicted: HashSet<NaturalKey> = HashSet::new();

    for record in records {
        let item = match prepare(importer, cx, record) {
            Ok(item) => item,
            Err((key, err)) => {
                absorb(cx, I::KIND, &key, err)?;
                continue;
            }
        };
        if conflicted.contains(&item.key) {
            continue;
        }
        let Some(&index) = by_key.get(&item.key) else {
            by_key.insert(item.key.clone(), prepared.len());
            prepared.push(Some(item));
            continue;
        };
        let Some(first) = prepared[index].take() else {
            continue;
        };
        if first.fingerprint == item.fingerprint {
            debug!(key = %item.key, "collapsing identical record");
            prepared[index] = Some(first);
            continue;
        }
        conflicted.insert(item.key.clone());
        let err = ImportError::Duplicate {
            key: item.key.clone(),
            first: first.encoded,
            second: item.encoded,
        };
        absorb(cx, I::KIND, &item.key, err)?;
    }
    Ok(prepared.into_iter().flatten().collect())
}

/// Apply the error policy to a per-entity failure.
pub(crate) fn absorb(
    cx: &mut ImportContext,
    kind: EntityKind,
    key: &NaturalKey,
    err: ImportError,
) -> Result<(), ImportError> {
    match cx.policy() {
        ErrorPolicy::Abort => Err(err),
        ErrorPolicy::Continue => {
            warn!(%key, error = %err, "skipping entity");
            cx.record_failure(ImportFailure {
                kind,
                key: key.to_string(),
                message: err.to_string(),
            });
            Ok(())
        }
    }
}
