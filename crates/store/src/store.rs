use crate::error::StoreError;
use crate::model::{
    ActionSummary, BillCollection, BillData, EntityId, Jurisdiction, MembershipData,
    OrganizationData, OrganizationQuery, PersonCollection, PersonData, PersonQuery, Stored,
    UnresolvedRelatedBill,
};

/// Persistence collaborator used by the importers.
///
/// Every lookup is scoped to one jurisdiction. Writes between `begin` and
/// `commit` land together or not at all; the importer brackets each entity
/// in one such unit.
pub trait Store {
    fn begin(&mut self) -> Result<(), StoreError>;
    fn commit(&mut self) -> Result<(), StoreError>;
    fn rollback(&mut self) -> Result<(), StoreError>;

    // -- jurisdictions -------------------------------------------------------

    fn insert_jurisdiction(&mut self, jurisdiction: &Jurisdiction) -> Result<(), StoreError>;
    fn jurisdiction(&self, id: &str) -> Result<Option<Jurisdiction>, StoreError>;

    // -- organizations -------------------------------------------------------

    fn find_organizations(
        &self,
        jurisdiction_id: &str,
        query: &OrganizationQuery<'_>,
    ) -> Result<Vec<Stored<OrganizationData>>, StoreError>;
    fn organization(&self, id: &str) -> Result<Option<Stored<OrganizationData>>, StoreError>;
    fn insert_organization(
        &mut self,
        jurisdiction_id: &str,
        data: &OrganizationData,
    ) -> Result<EntityId, StoreError>;
    fn update_organization(&mut self, id: &str, data: &OrganizationData) -> Result<(), StoreError>;

    // -- people --------------------------------------------------------------

    fn find_people(
        &self,
        jurisdiction_id: &str,
        query: &PersonQuery<'_>,
    ) -> Result<Vec<Stored<PersonData>>, StoreError>;
    fn person(&self, id: &str) -> Result<Option<Stored<PersonData>>, StoreError>;
    /// `jurisdiction_id` records which jurisdiction imported the person;
    /// `None` leaves the person reachable only through memberships.
    fn insert_person(
        &mut self,
        jurisdiction_id: Option<&str>,
        data: &PersonData,
    ) -> Result<EntityId, StoreError>;
    fn update_person(&mut self, id: &str, data: &PersonData) -> Result<(), StoreError>;
    fn replace_person_collection(
        &mut self,
        id: &str,
        collection: PersonCollection,
        data: &PersonData,
    ) -> Result<(), StoreError>;

    // -- memberships ---------------------------------------------------------

    fn find_memberships(
        &self,
        person_id: &str,
        organization_id: &str,
    ) -> Result<Vec<Stored<MembershipData>>, StoreError>;
    fn insert_membership(&mut self, data: &MembershipData) -> Result<EntityId, StoreError>;
    fn update_membership(&mut self, id: &str, data: &MembershipData) -> Result<(), StoreError>;

    // -- bills ---------------------------------------------------------------

    fn find_bill(
        &self,
        jurisdiction_id: &str,
        legislative_session: &str,
        identifier: &str,
    ) -> Result<Option<Stored<BillData>>, StoreError>;
    fn bill(&self, id: &str) -> Result<Option<Stored<BillData>>, StoreError>;
    /// Inserts the bill row and every owned collection.
    fn insert_bill(&mut self, jurisdiction_id: &str, data: &BillData) -> Result<EntityId, StoreError>;
    /// Overwrites scalar fields only.
    fn update_bill(&mut self, id: &str, data: &BillData) -> Result<(), StoreError>;
    /// Deletes the collection's rows and recreates them from `data`.
    fn replace_bill_collection(
        &mut self,
        id: &str,
        collection: BillCollection,
        data: &BillData,
    ) -> Result<(), StoreError>;
    /// RFC 3339 stamp of the bill's last write, including collection rows.
    fn bill_updated_at(&self, id: &str) -> Result<Option<String>, StoreError>;
    fn set_action_summary(&mut self, id: &str, summary: &ActionSummary) -> Result<(), StoreError>;
    fn action_summary(&self, id: &str) -> Result<Option<ActionSummary>, StoreError>;
    fn unresolved_related_bills(
        &self,
        jurisdiction_id: &str,
    ) -> Result<Vec<UnresolvedRelatedBill>, StoreError>;
    /// Points one related-bill row at its target and touches the owning bill.
    fn resolve_related_bill(
        &mut self,
        bill_id: &str,
        position: usize,
        related_bill_id: &str,
    ) -> Result<(), StoreError>;
    fn count_bills(&self, jurisdiction_id: &str) -> Result<usize, StoreError>;
}
