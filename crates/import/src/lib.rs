//! `legisync-import`: reconcile scraped legislative records with a store.
//!
//! A run imports one jurisdiction's batch: organizations, people,
//! memberships, then bills. Each record is keyed, resolved, diffed against
//! what is already stored and written only when something changed.
//!
//! ```no_run
//! use legisync_import::{parse_records, run_batch, ImportConfig};
//! use legisync_store::SqliteStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ImportConfig::from_toml(&std::fs::read_to_string("import.toml")?)?;
//! let mut store = SqliteStore::open(std::path::Path::new("legisync.db"))?;
//! let mut cx = config.context(&store)?;
//! let records = parse_records(&std::fs::read_to_string("batch.json")?)?;
//! let report = run_batch(&mut store, &mut cx, records)?;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod context;
pub mod diff;
pub mod engine;
pub mod error;
pub mod importers;
pub mod model;
pub mod pseudo_id;
pub mod record;
pub mod resolve;
pub mod transform;

pub use batch::{parse_records, run_batch};
pub use config::ImportConfig;
pub use context::ImportContext;
pub use engine::{import_data, import_item, EntityImporter};
pub use error::ImportError;
pub use importers::{BillImporter, MembershipImporter, OrganizationImporter, PersonImporter};
pub use model::{EntityKind, ErrorPolicy, ImportCounts, ImportFailure, ImportReport, ImportStatus, NaturalKey};
pub use pseudo_id::PseudoId;
pub use record::{BillRecord, MembershipRecord, OrganizationRecord, PersonRecord, Record};
pub use transform::Transformers;
