//! `legisync-store`: persisted legislative entities.
//!
//! The `Store` trait is the persistence contract the importers write
//! through; `SqliteStore` is the bundled implementation.

pub mod error;
pub mod model;
pub mod sqlite;
pub mod store;

pub use error::StoreError;
pub use model::{BillCollection, BillData, EntityId, Jurisdiction, Stored};
pub use sqlite::SqliteStore;
pub use store::Store;
