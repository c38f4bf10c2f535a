use std::path::PathBuf;

use legisync_import::{parse_records, run_batch, EntityKind, ErrorPolicy, ImportConfig, ImportCounts, ImportReport};
use legisync_store::model::{OrganizationQuery, PersonQuery};
use legisync_store::{Jurisdiction, SqliteStore, Store};

const NC: &str = "ocd-jurisdiction/country:us/state:nc/government";

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn read_fixture(name: &str) -> String {
    std::fs::read_to_string(fixtures_dir().join(name)).unwrap()
}

fn seed(store: &mut SqliteStore) {
    let nc = Jurisdiction::new(NC, "North Carolina").with_session("2023", "2023-2024 Session");
    store.insert_jurisdiction(&nc).unwrap();
}

fn run(store: &mut SqliteStore, fixture: &str) -> ImportReport {
    let config = ImportConfig::from_toml(&read_fixture("import.toml")).unwrap();
    let mut cx = config.context(&*store).unwrap();
    let records = parse_records(&read_fixture(fixture)).unwrap();
    run_batch(store, &mut cx, records).unwrap()
}

fn inserted(n: usize) -> ImportCounts {
    ImportCounts { insert: n, update: 0, noop: 0 }
}

fn unchanged(n: usize) -> ImportCounts {
    ImportCounts { insert: 0, update: 0, noop: n }
}

#[test]
fn batch_imports_every_kind_in_dependency_order() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    seed(&mut store);

    let report = run(&mut store, "nc-batch.json");
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(report.counts(EntityKind::Organization), inserted(4));
    assert_eq!(report.counts(EntityKind::Person), inserted(1));
    assert_eq!(report.counts(EntityKind::Membership), inserted(1));
    assert_eq!(report.counts(EntityKind::Bill), inserted(2));

    let legislature = store
        .find_organizations(NC, &OrganizationQuery { classification: Some("legislature"), ..Default::default() })
        .unwrap();
    let house = store
        .find_organizations(NC, &OrganizationQuery { name: Some("House"), ..Default::default() })
        .unwrap();
    assert_eq!(house[0].data.parent_id.as_deref(), Some(legislature[0].id.as_str()));
    let finance = store
        .find_organizations(NC, &OrganizationQuery { name: Some("Finance Committee"), ..Default::default() })
        .unwrap();
    assert_eq!(finance[0].data.parent_id.as_deref(), Some(house[0].id.as_str()));

    let doe = store.find_people(NC, &PersonQuery::Name("Jane Doe")).unwrap();
    assert_eq!(doe.len(), 1);

    // identifier normalized by the configured transformer
    let hb2 = store.find_bill(NC, "2023", "HB 2").unwrap().unwrap();
    assert_eq!(hb2.data.from_organization_id, house[0].id);
    assert_eq!(hb2.data.actions[1].description, "Ref To Com On Finance");
    assert_eq!(hb2.data.actions[1].related_entities[0].organization_id.as_deref(), Some(finance[0].id.as_str()));
    assert_eq!(hb2.data.actions[0].classification, vec!["filing"]);

    let doe_sponsor = hb2.data.sponsorships.iter().find(|s| s.name == "Doe").unwrap();
    assert_eq!(doe_sponsor.person_id.as_deref(), Some(doe[0].id.as_str()));
    let roe_sponsor = hb2.data.sponsorships.iter().find(|s| s.name == "Roe").unwrap();
    assert_eq!(roe_sponsor.person_id, None);

    // the companion arrived later in the same batch
    let sb49 = store.find_bill(NC, "2023", "SB 49").unwrap().unwrap();
    assert_eq!(hb2.data.related_bills[0].related_bill_id.as_deref(), Some(sb49.id.as_str()));

    let summary = store.action_summary(&hb2.id).unwrap().unwrap();
    assert_eq!(summary.first_action_date.as_deref(), Some("2023-02-01"));
    assert_eq!(summary.latest_action_date.as_deref(), Some("2023-02-02"));
    assert_eq!(summary.latest_action_description.as_deref(), Some("Passed 1st Reading"));
}

#[test]
fn rerunning_a_batch_changes_nothing() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    seed(&mut store);

    run(&mut store, "nc-batch.json");
    let report = run(&mut store, "nc-batch.json");

    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(report.counts(EntityKind::Organization), unchanged(4));
    assert_eq!(report.counts(EntityKind::Person), unchanged(1));
    assert_eq!(report.counts(EntityKind::Membership), unchanged(1));
    assert_eq!(report.counts(EntityKind::Bill), unchanged(2));
    assert_eq!(store.count_bills(NC).unwrap(), 2);
}

#[test]
fn continue_policy_collects_failures() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    seed(&mut store);

    let report = run(&mut store, "nc-broken.json");

    assert_eq!(report.counts(EntityKind::Organization), inserted(1));
    assert_eq!(report.counts(EntityKind::Membership), ImportCounts::default());
    assert_eq!(report.counts(EntityKind::Bill), inserted(1));

    let failed: Vec<(EntityKind, &str)> = report.failures.iter().map(|f| (f.kind, f.key.as_str())).collect();
    assert_eq!(failed.len(), 3, "{failed:?}");
    assert_eq!(failed[0].0, EntityKind::Organization);
    assert!(failed[0].1.contains("Rules Committee"));
    assert_eq!(failed[1].0, EntityKind::Membership);
    assert_eq!(failed[2].0, EntityKind::Bill);
    assert!(report.failures[2].message.contains("1999"));

    assert_eq!(store.count_bills(NC).unwrap(), 1);
    assert!(store.find_bill(NC, "2023", "HB 3").unwrap().is_some());
}

#[test]
fn abort_policy_stops_at_first_failure() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    seed(&mut store);

    let mut cx = ImportConfig::from_toml(&read_fixture("import.toml"))
        .unwrap()
        .context(&store)
        .unwrap()
        .with_policy(ErrorPolicy::Abort);
    let records = parse_records(&read_fixture("nc-broken.json")).unwrap();
    let err = run_batch(&mut store, &mut cx, records).unwrap_err();
    assert!(err.to_string().contains("Rules Committee"), "{err}");

    // the house went in before the committee failed; no bill was reached
    let house = store
        .find_organizations(NC, &OrganizationQuery { name: Some("House"), ..Default::default() })
        .unwrap();
    assert_eq!(house.len(), 1);
    assert_eq!(store.count_bills(NC).unwrap(), 0);
}

#[test]
fn unknown_jurisdiction_is_rejected_before_import() {
    let store = SqliteStore::open_in_memory().unwrap();
    let config = ImportConfig::from_toml(&read_fixture("import.toml")).unwrap();
    let err = config.context(&store).unwrap_err();
    assert!(err.to_string().contains(NC), "{err}");
}

#[test]
fn file_backed_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legisync.db");

    {
        let mut store = SqliteStore::open(&path).unwrap();
        seed(&mut store);
        let report = run(&mut store, "nc-batch.json");
        assert_eq!(report.counts(EntityKind::Bill), inserted(2));
    }

    let mut store = SqliteStore::open(&path).unwrap();
    let report = run(&mut store, "nc-batch.json");
    assert_eq!(report.counts(EntityKind::Bill), unchanged(2));
    assert_eq!(report.counts(EntityKind::Organization), unchanged(4));
}
