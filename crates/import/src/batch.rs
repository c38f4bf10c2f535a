use legisync_store::Store;
use tracing::info;

use crate::context::ImportContext;
use crate::engine::{import_data, EntityImporter};
use crate::error::ImportError;
use crate::importers::{BillImporter, MembershipImporter, OrganizationImporter, PersonImporter};
use crate::model::ImportReport;
use crate::record::Record;

/// Read a batch: a JSON array of `_type`-tagged records.
pub fn parse_records(json: &str) -> Result<Vec<Record>, ImportError> {
    Ok(serde_json::from_str(json)?)
}

/// Import a whole batch for the context's jurisdiction.
///
/// Records are grouped by kind and imported organizations first, bills last,
/// so pseudo-ids are registered before anything dereferences them. Input
/// order is kept within a kind.
pub fn run_batch(
    store: &mut dyn Store,
    cx: &mut ImportContext,
    records: Vec<Record>,
) -> Result<ImportReport, ImportError> {
    let total = records.len();
    let mut organizations = Vec::new();
    let mut people = Vec::new();
    let mut memberships = Vec::new();
    let mut bills = Vec::new();
    for record in records {
        match record {
            Record::Organization(r) => organizations.push(r),
            Record::Person(r) => people.push(r),
            Record::Membership(r) => memberships.push(r),
            Record::Bill(r) => bills.push(r),
        }
    }
    info!(jurisdiction = cx.jurisdiction_id(), records = total, policy = ?cx.policy(), "starting import batch");

    let mut report = ImportReport::default();
    run_kind(&mut report, &OrganizationImporter, cx, store, organizations)?;
    run_kind(&mut report, &PersonImporter, cx, store, people)?;
    run_kind(&mut report, &MembershipImporter, cx, store, memberships)?;
    run_kind(&mut report, &BillImporter, cx, store, bills)?;
    report.failures = cx.take_failures();

    info!(
        jurisdiction = cx.jurisdiction_id(),
        failures = report.failures.len(),
        "import batch finished"
    );
    Ok(report)
}

fn run_kind<I: EntityImporter>(
    report: &mut ImportReport,
    importer: &I,
    cx: &mut ImportContext,
    store: &mut dyn Store,
    records: Vec<I::Record>,
) -> Result<(), ImportError> {
    let counts = import_data(importer, cx, store, records)?;
    report.counts.insert(I::KIND, counts);
    Ok(())
}
