use std::collections::HashMap;

use legisync_store::{EntityId, Jurisdiction, Store};

use crate::error::ImportError;
use crate::model::{EntityKind, ErrorPolicy, ImportFailure, NaturalKey};
use crate::pseudo_id::PseudoId;
use crate::resolve::{self, Resolution};
use crate::transform::Transformers;

/// The record that first claimed a persisted entity during this run.
#[derive(Debug, Clone)]
struct Claim {
    fingerprint: String,
    record: String,
}

/// State of one batch run against one jurisdiction.
///
/// Holds the pseudo-id registrations made so far, the persisted entities
/// already claimed by an incoming record, and the run's transformers and
/// error policy. Build a fresh context per run; nothing here outlives it.
#[derive(Debug)]
pub struct ImportContext {
    jurisdiction: Jurisdiction,
    transformers: Transformers,
    policy: ErrorPolicy,
    resolved: HashMap<(EntityKind, PseudoId), Vec<EntityId>>,
    claimed: HashMap<(EntityKind, EntityId), Claim>,
    failures: Vec<ImportFailure>,
}

impl ImportContext {
    pub fn new(jurisdiction: Jurisdiction) -> Self {
        Self {
            jurisdiction,
            transformers: Transformers::default(),
            policy: ErrorPolicy::default(),
            resolved: HashMap::new(),
            claimed: HashMap::new(),
            failures: Vec::new(),
        }
    }

    /// Context for a jurisdiction already present in `store`.
    pub fn load(store: &dyn Store, jurisdiction_id: &str) -> Result<Self, ImportError> {
        let jurisdiction = store
            .jurisdiction(jurisdiction_id)?
            .ok_or_else(|| ImportError::UnknownJurisdiction(jurisdiction_id.to_string()))?;
        Ok(Self::new(jurisdiction))
    }

    pub fn with_transformers(mut self, transformers: Transformers) -> Self {
        self.transformers = transformers;
        self
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn jurisdiction(&self) -> &Jurisdiction {
        &self.jurisdiction
    }

    pub fn jurisdiction_id(&self) -> &str {
        &self.jurisdiction.id
    }

    pub fn transformers(&self) -> &Transformers {
        &self.transformers
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// Record that `pseudo` now stands for `id`. Registering a second,
    /// different id makes the pseudo-id ambiguous.
    pub fn register(&mut self, kind: EntityKind, pseudo: PseudoId, id: EntityId) {
        let ids = self.resolved.entry((kind, pseudo)).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    /// Registered ids only, without touching the store.
    pub fn registered(&self, kind: EntityKind, pseudo: &PseudoId) -> Resolution {
        match self.resolved.get(&(kind, pseudo.clone())) {
            Some(ids) => Resolution::from_matches(ids.clone()),
            None => Resolution::Missing,
        }
    }

    /// Resolve a pseudo-id: registrations from this run first, then a
    /// natural-key lookup against the store. Store hits are cached.
    pub fn resolve(
        &mut self,
        store: &dyn Store,
        kind: EntityKind,
        pseudo: &PseudoId,
    ) -> Result<Resolution, ImportError> {
        let registered = self.registered(kind, pseudo);
        if registered != Resolution::Missing {
            return Ok(registered);
        }
        let resolution = resolve::pseudo(store, self.jurisdiction_id(), kind, pseudo)?;
        if let Resolution::Resolved(id) = &resolution {
            self.register(kind, pseudo.clone(), id.clone());
        }
        Ok(resolution)
    }

    /// Mark `id` as matched by the record with `fingerprint`. A different
    /// record matching the same entity later in the run is a duplicate.
    pub(crate) fn claim(
        &mut self,
        kind: EntityKind,
        id: &str,
        key: &NaturalKey,
        fingerprint: &str,
        record: &str,
    ) -> Result<(), ImportError> {
        let slot = (kind, id.to_string());
        if let Some(previous) = self.claimed.get(&slot) {
            if previous.fingerprint != fingerprint {
                return Err(ImportError::Duplicate {
                    key: key.clone(),
                    first: previous.record.clone(),
                    second: record.to_string(),
                });
            }
            return Ok(());
        }
        self.claimed.insert(
            slot,
            Claim {
                fingerprint: fingerprint.to_string(),
                record: record.to_string(),
            },
        );
        Ok(())
    }

    pub(crate) fn record_failure(&mut self, failure: ImportFailure) {
        self.failures.push(failure);
    }

    /// Failures recorded under `ErrorPolicy::Continue`.
    pub fn failures(&self) -> &[ImportFailure] {
        &self.failures
    }

    pub fn take_failures(&mut self) -> Vec<ImportFailure> {
        std::mem::take(&mut self.failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use legisync_store::model::OrganizationData;
    use legisync_store::SqliteStore;

    const JID: &str = "ocd-jurisdiction/country:us/state:nc/government";

    #[test]
    fn registrations_win_over_the_store() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let jurisdiction = Jurisdiction::new(JID, "North Carolina");
        store.insert_jurisdiction(&jurisdiction).unwrap();
        let persisted = store.insert_organization(JID, &OrganizationData::new("House", "lower")).unwrap();

        let mut cx = ImportContext::load(&store, JID).unwrap();
        let pseudo = PseudoId::new([("classification", "lower")]);
        assert_eq!(
            cx.resolve(&store, EntityKind::Organization, &pseudo).unwrap(),
            Resolution::Resolved(persisted.clone())
        );

        let mut fresh = ImportContext::new(jurisdiction);
        fresh.register(EntityKind::Organization, pseudo.clone(), "ocd-organization/other".into());
        assert_eq!(
            fresh.resolve(&store, EntityKind::Organization, &pseudo).unwrap(),
            Resolution::Resolved("ocd-organization/other".into())
        );
    }

    #[test]
    fn double_registration_is_ambiguous() {
        let mut cx = ImportContext::new(Jurisdiction::new(JID, "North Carolina"));
        let pseudo = PseudoId::new([("name", "Adam Smith")]);
        cx.register(EntityKind::Person, pseudo.clone(), "ocd-person/1".into());
        cx.register(EntityKind::Person, pseudo.clone(), "ocd-person/1".into());
        assert_eq!(cx.registered(EntityKind::Person, &pseudo), Resolution::Resolved("ocd-person/1".into()));
        cx.register(EntityKind::Person, pseudo.clone(), "ocd-person/2".into());
        assert_eq!(cx.registered(EntityKind::Person, &pseudo), Resolution::Ambiguous(2));
        assert_eq!(cx.registered(EntityKind::Bill, &pseudo), Resolution::Missing);
    }

    #[test]
    fn claims_reject_a_second_different_record() {
        let mut cx = ImportContext::new(Jurisdiction::new(JID, "North Carolina"));
        let key = NaturalKey::new(EntityKind::Bill).with("identifier", "HB 1");
        cx.claim(EntityKind::Bill, "ocd-bill/1", &key, "sha256:aa", "{a}").unwrap();
        cx.claim(EntityKind::Bill, "ocd-bill/1", &key, "sha256:aa", "{a}").unwrap();
        let err = cx.claim(EntityKind::Bill, "ocd-bill/1", &key, "sha256:bb", "{b}").unwrap_err();
        match err {
            ImportError::Duplicate { first, second, .. } => {
                assert_eq!(first, "{a}");
                assert_eq!(second, "{b}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_jurisdiction_is_an_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = ImportContext::load(&store, JID).unwrap_err();
        assert!(matches!(err, ImportError::UnknownJurisdiction(_)));
    }
}
