//! One `EntityImporter` per entity kind.

pub mod bill;
pub mod membership;
pub mod organization;
pub mod person;

pub use bill::BillImporter;
pub use membership::MembershipImporter;
pub use organization::OrganizationImporter;
pub use person::PersonImporter;
