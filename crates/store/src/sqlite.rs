// SQLite-backed store

use std::path::Path;

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{
    Abstract, Action, ActionSummary, BillCollection, BillData, Document, EntityId, Jurisdiction,
    LegislativeSession, Link, MembershipData, OrganizationData, OrganizationQuery, OtherIdentifier,
    OtherTitle, PersonCollection, PersonData, PersonIdentifier, PersonQuery, RelatedBill, Source,
    Sponsorship, Stored, UnresolvedRelatedBill,
};
use crate::store::Store;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS jurisdictions (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    url TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS legislative_sessions (
    jurisdiction_id TEXT NOT NULL,
    identifier TEXT NOT NULL,
    name TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (jurisdiction_id, identifier)
);

CREATE TABLE IF NOT EXISTS organizations (
    id TEXT PRIMARY KEY,
    jurisdiction_id TEXT NOT NULL,
    name TEXT NOT NULL,
    classification TEXT NOT NULL,
    parent_id TEXT,
    extras TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS people (
    id TEXT PRIMARY KEY,
    jurisdiction_id TEXT,               -- NULL = reachable through memberships only
    name TEXT NOT NULL,
    birth_date TEXT NOT NULL DEFAULT '',
    death_date TEXT NOT NULL DEFAULT '',
    extras TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS person_identifiers (
    person_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    scheme TEXT NOT NULL,
    identifier TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS person_sources (
    person_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    url TEXT NOT NULL,
    note TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS memberships (
    id TEXT PRIMARY KEY,
    person_id TEXT NOT NULL,
    organization_id TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT '',
    label TEXT NOT NULL DEFAULT '',
    start_date TEXT NOT NULL DEFAULT '',
    end_date TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS bills (
    id TEXT PRIMARY KEY,
    jurisdiction_id TEXT NOT NULL,
    legislative_session TEXT NOT NULL,
    identifier TEXT NOT NULL,
    title TEXT NOT NULL,
    classification TEXT NOT NULL,       -- JSON array
    subject TEXT NOT NULL,              -- JSON array
    from_organization_id TEXT NOT NULL,
    first_action_date TEXT,
    latest_action_date TEXT,
    latest_action_description TEXT,
    extras TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (jurisdiction_id, legislative_session, identifier)
);

CREATE TABLE IF NOT EXISTS bill_actions (
    bill_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    description TEXT NOT NULL,
    date TEXT NOT NULL,
    organization_id TEXT NOT NULL,
    classification TEXT NOT NULL,       -- JSON array
    related_entities TEXT NOT NULL      -- JSON array
);

CREATE TABLE IF NOT EXISTS bill_sponsorships (
    bill_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    name TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    classification TEXT NOT NULL,
    is_primary INTEGER NOT NULL,
    person_id TEXT,
    organization_id TEXT
);

CREATE TABLE IF NOT EXISTS bill_other_titles (
    bill_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    title TEXT NOT NULL,
    note TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS bill_other_identifiers (
    bill_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    identifier TEXT NOT NULL,
    scheme TEXT NOT NULL,
    note TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS bill_abstracts (
    bill_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    abstract TEXT NOT NULL,
    note TEXT NOT NULL,
    date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS bill_documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    bill_id TEXT NOT NULL,
    kind TEXT NOT NULL,                 -- 'document' | 'version'
    position INTEGER NOT NULL,
    note TEXT NOT NULL,
    date TEXT NOT NULL,
    classification TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS bill_document_links (
    document_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    url TEXT NOT NULL,
    media_type TEXT NOT NULL,
    text TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS bill_sources (
    bill_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    url TEXT NOT NULL,
    note TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS bill_related_bills (
    bill_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    identifier TEXT NOT NULL,
    legislative_session TEXT NOT NULL,
    relation_type TEXT NOT NULL,
    related_bill_id TEXT
);

CREATE INDEX IF NOT EXISTS idx_actions_bill ON bill_actions (bill_id);
CREATE INDEX IF NOT EXISTS idx_sponsorships_bill ON bill_sponsorships (bill_id);
CREATE INDEX IF NOT EXISTS idx_documents_bill ON bill_documents (bill_id, kind);
CREATE INDEX IF NOT EXISTS idx_links_document ON bill_document_links (document_id);
CREATE INDEX IF NOT EXISTS idx_person_identifiers ON person_identifiers (scheme, identifier);
CREATE INDEX IF NOT EXISTS idx_memberships_person ON memberships (person_id);
"#;

// Document kinds in bill_documents
const KIND_DOCUMENT: &str = "document";
const KIND_VERSION: &str = "version";

/// Restricts people to the jurisdiction through their memberships (?1 = jurisdiction).
const MEMBER_OF_JURISDICTION: &str = "EXISTS (
    SELECT 1 FROM memberships m JOIN organizations o ON o.id = m.organization_id
    WHERE m.person_id = p.id AND o.jurisdiction_id = ?1)";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a store file.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    fn new_id(kind: &str) -> EntityId {
        format!("ocd-{kind}/{}", Uuid::new_v4())
    }

    fn now() -> String {
        chrono::Utc::now().to_rfc3339()
    }

    fn ensure_updated(changed: usize, kind: &'static str, id: &str) -> Result<(), StoreError> {
        if changed == 0 {
            return Err(StoreError::NotFound { kind, id: id.to_string() });
        }
        Ok(())
    }

    fn touch_bill(&self, id: &str) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE bills SET updated_at = ?2 WHERE id = ?1",
            params![id, Self::now()],
        )?;
        Self::ensure_updated(changed, "bill", id)
    }

    // -- people helpers ------------------------------------------------------

    fn load_person_collections(&self, person: &mut Stored<PersonData>) -> Result<(), StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT scheme, identifier FROM person_identifiers WHERE person_id = ?1 ORDER BY position",
        )?;
        person.data.identifiers = stmt
            .query_map(params![person.id], |row| {
                Ok(PersonIdentifier { scheme: row.get(0)?, identifier: row.get(1)? })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self
            .conn
            .prepare("SELECT url, note FROM person_sources WHERE person_id = ?1 ORDER BY position")?;
        person.data.sources = stmt
            .query_map(params![person.id], |row| Ok(Source { url: row.get(0)?, note: row.get(1)? }))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(())
    }

    fn write_person_collection(
        &self,
        id: &str,
        collection: PersonCollection,
        data: &PersonData,
    ) -> Result<(), StoreError> {
        match collection {
            PersonCollection::Identifiers => {
                let mut stmt = self.conn.prepare(
                    "INSERT INTO person_identifiers (person_id, position, scheme, identifier)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for (i, ident) in data.identifiers.iter().enumerate() {
                    stmt.execute(params![id, i as i64, ident.scheme, ident.identifier])?;
                }
            }
            PersonCollection::Sources => {
                let mut stmt = self.conn.prepare(
                    "INSERT INTO person_sources (person_id, position, url, note) VALUES (?1, ?2, ?3, ?4)",
                )?;
                for (i, source) in data.sources.iter().enumerate() {
                    stmt.execute(params![id, i as i64, source.url, source.note])?;
                }
            }
        }
        Ok(())
    }

    fn query_people<P: rusqlite::Params>(
        &self,
        sql: &str,
        args: P,
    ) -> Result<Vec<Stored<PersonData>>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut people = stmt
            .query_map(args, |row| {
                Ok(Stored {
                    id: row.get(0)?,
                    data: PersonData {
                        name: row.get(1)?,
                        birth_date: row.get(2)?,
                        death_date: row.get(3)?,
                        identifiers: Vec::new(),
                        sources: Vec::new(),
                        extras: json_column(row, 4)?,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for person in &mut people {
            self.load_person_collections(person)?;
        }
        Ok(people)
    }

    // -- bill helpers --------------------------------------------------------

    fn delete_bill_collection(&self, id: &str, collection: BillCollection) -> Result<(), StoreError> {
        let sql = match collection {
            BillCollection::Actions => "DELETE FROM bill_actions WHERE bill_id = ?1",
            BillCollection::Sponsorships => "DELETE FROM bill_sponsorships WHERE bill_id = ?1",
            BillCollection::OtherTitles => "DELETE FROM bill_other_titles WHERE bill_id = ?1",
            BillCollection::OtherIdentifiers => "DELETE FROM bill_other_identifiers WHERE bill_id = ?1",
            BillCollection::Abstracts => "DELETE FROM bill_abstracts WHERE bill_id = ?1",
            BillCollection::Sources => "DELETE FROM bill_sources WHERE bill_id = ?1",
            BillCollection::RelatedBills => "DELETE FROM bill_related_bills WHERE bill_id = ?1",
            BillCollection::Documents | BillCollection::Versions => {
                let kind = document_kind(collection);
                self.conn.execute(
                    "DELETE FROM bill_document_links WHERE document_id IN
                        (SELECT id FROM bill_documents WHERE bill_id = ?1 AND kind = ?2)",
                    params![id, kind],
                )?;
                self.conn.execute(
                    "DELETE FROM bill_documents WHERE bill_id = ?1 AND kind = ?2",
                    params![id, kind],
                )?;
                return Ok(());
            }
        };
        self.conn.execute(sql, params![id])?;
        Ok(())
    }

    fn write_bill_collection(
        &self,
        id: &str,
        collection: BillCollection,
        data: &BillData,
    ) -> Result<(), StoreError> {
        match collection {
            BillCollection::Actions => {
                let mut stmt = self.conn.prepare(
                    "INSERT INTO bill_actions
                        (bill_id, position, description, date, organization_id, classification, related_entities)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )?;
                for (i, action) in data.actions.iter().enumerate() {
                    stmt.execute(params![
                        id,
                        i as i64,
                        action.description,
                        action.date,
                        action.organization_id,
                        serde_json::to_string(&action.classification)?,
                        serde_json::to_string(&action.related_entities)?,
                    ])?;
                }
            }
            BillCollection::Sponsorships => {
                let mut stmt = self.conn.prepare(
                    "INSERT INTO bill_sponsorships
                        (bill_id, position, name, entity_type, classification, is_primary, person_id, organization_id)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )?;
                for (i, s) in data.sponsorships.iter().enumerate() {
                    stmt.execute(params![
                        id,
                        i as i64,
                        s.name,
                        s.entity_type,
                        s.classification,
                        s.primary,
                        s.person_id,
                        s.organization_id,
                    ])?;
                }
            }
            BillCollection::OtherTitles => {
                let mut stmt = self.conn.prepare(
                    "INSERT INTO bill_other_titles (bill_id, position, title, note) VALUES (?1, ?2, ?3, ?4)",
                )?;
                for (i, t) in data.other_titles.iter().enumerate() {
                    stmt.execute(params![id, i as i64, t.title, t.note])?;
                }
            }
            BillCollection::OtherIdentifiers => {
                let mut stmt = self.conn.prepare(
                    "INSERT INTO bill_other_identifiers (bill_id, position, identifier, scheme, note)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for (i, o) in data.other_identifiers.iter().enumerate() {
                    stmt.execute(params![id, i as i64, o.identifier, o.scheme, o.note])?;
                }
            }
            BillCollection::Abstracts => {
                let mut stmt = self.conn.prepare(
                    "INSERT INTO bill_abstracts (bill_id, position, abstract, note, date)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for (i, a) in data.abstracts.iter().enumerate() {
                    stmt.execute(params![id, i as i64, a.text, a.note, a.date])?;
                }
            }
            BillCollection::Documents => self.write_documents(id, KIND_DOCUMENT, &data.documents)?,
            BillCollection::Versions => self.write_documents(id, KIND_VERSION, &data.versions)?,
            BillCollection::Sources => {
                let mut stmt = self.conn.prepare(
                    "INSERT INTO bill_sources (bill_id, position, url, note) VALUES (?1, ?2, ?3, ?4)",
                )?;
                for (i, s) in data.sources.iter().enumerate() {
                    stmt.execute(params![id, i as i64, s.url, s.note])?;
                }
            }
            BillCollection::RelatedBills => {
                let mut stmt = self.conn.prepare(
                    "INSERT INTO bill_related_bills
                        (bill_id, position, identifier, legislative_session, relation_type, related_bill_id)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for (i, r) in data.related_bills.iter().enumerate() {
                    stmt.execute(params![
                        id,
                        i as i64,
                        r.identifier,
                        r.legislative_session,
                        r.relation_type,
                        r.related_bill_id,
                    ])?;
                }
            }
        }
        Ok(())
    }

    fn write_documents(&self, id: &str, kind: &str, documents: &[Document]) -> Result<(), StoreError> {
        for (i, doc) in documents.iter().enumerate() {
            self.conn.execute(
                "INSERT INTO bill_documents (bill_id, kind, position, note, date, classification)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, kind, i as i64, doc.note, doc.date, doc.classification],
            )?;
            let document_id = self.conn.last_insert_rowid();
            let mut stmt = self.conn.prepare(
                "INSERT INTO bill_document_links (document_id, position, url, media_type, text)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (j, link) in doc.links.iter().enumerate() {
                stmt.execute(params![document_id, j as i64, link.url, link.media_type, link.text])?;
            }
        }
        Ok(())
    }

    fn load_documents(&self, id: &str, kind: &str) -> Result<Vec<Document>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, note, date, classification FROM bill_documents
             WHERE bill_id = ?1 AND kind = ?2 ORDER BY position",
        )?;
        let headers = stmt
            .query_map(params![id, kind], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    Document {
                        note: row.get(1)?,
                        date: row.get(2)?,
                        classification: row.get(3)?,
                        links: Vec::new(),
                    },
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut links_stmt = self.conn.prepare(
            "SELECT url, media_type, text FROM bill_document_links WHERE document_id = ?1 ORDER BY position",
        )?;
        let mut documents = Vec::with_capacity(headers.len());
        for (document_id, mut doc) in headers {
            doc.links = links_stmt
                .query_map(params![document_id], |row| {
                    Ok(Link { url: row.get(0)?, media_type: row.get(1)?, text: row.get(2)? })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            documents.push(doc);
        }
        Ok(documents)
    }

    fn load_bill_collections(&self, id: &str, bill: &mut BillData) -> Result<(), StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT description, date, organization_id, classification, related_entities
             FROM bill_actions WHERE bill_id = ?1 ORDER BY position",
        )?;
        bill.actions = stmt
            .query_map(params![id], |row| {
                Ok(Action {
                    description: row.get(0)?,
                    date: row.get(1)?,
                    organization_id: row.get(2)?,
                    classification: json_column(row, 3)?,
                    related_entities: json_column(row, 4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT name, entity_type, classification, is_primary, person_id, organization_id
             FROM bill_sponsorships WHERE bill_id = ?1 ORDER BY position",
        )?;
        bill.sponsorships = stmt
            .query_map(params![id], |row| {
                Ok(Sponsorship {
                    name: row.get(0)?,
                    entity_type: row.get(1)?,
                    classification: row.get(2)?,
                    primary: row.get(3)?,
                    person_id: row.get(4)?,
                    organization_id: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self
            .conn
            .prepare("SELECT title, note FROM bill_other_titles WHERE bill_id = ?1 ORDER BY position")?;
        bill.other_titles = stmt
            .query_map(params![id], |row| Ok(OtherTitle { title: row.get(0)?, note: row.get(1)? }))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT identifier, scheme, note FROM bill_other_identifiers WHERE bill_id = ?1 ORDER BY position",
        )?;
        bill.other_identifiers = stmt
            .query_map(params![id], |row| {
                Ok(OtherIdentifier { identifier: row.get(0)?, scheme: row.get(1)?, note: row.get(2)? })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT abstract, note, date FROM bill_abstracts WHERE bill_id = ?1 ORDER BY position",
        )?;
        bill.abstracts = stmt
            .query_map(params![id], |row| {
                Ok(Abstract { text: row.get(0)?, note: row.get(1)?, date: row.get(2)? })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        bill.documents = self.load_documents(id, KIND_DOCUMENT)?;
        bill.versions = self.load_documents(id, KIND_VERSION)?;

        let mut stmt = self
            .conn
            .prepare("SELECT url, note FROM bill_sources WHERE bill_id = ?1 ORDER BY position")?;
        bill.sources = stmt
            .query_map(params![id], |row| Ok(Source { url: row.get(0)?, note: row.get(1)? }))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT identifier, legislative_session, relation_type, related_bill_id
             FROM bill_related_bills WHERE bill_id = ?1 ORDER BY position",
        )?;
        bill.related_bills = stmt
            .query_map(params![id], |row| {
                Ok(RelatedBill {
                    identifier: row.get(0)?,
                    legislative_session: row.get(1)?,
                    relation_type: row.get(2)?,
                    related_bill_id: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(())
    }
}

impl Store for SqliteStore {
    fn begin(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn insert_jurisdiction(&mut self, jurisdiction: &Jurisdiction) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO jurisdictions (id, name, url) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, url = excluded.url",
            params![jurisdiction.id, jurisdiction.name, jurisdiction.url],
        )?;
        let mut stmt = self.conn.prepare(
            "INSERT INTO legislative_sessions (jurisdiction_id, identifier, name, position)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(jurisdiction_id, identifier) DO UPDATE SET name = excluded.name",
        )?;
        for (i, session) in jurisdiction.legislative_sessions.iter().enumerate() {
            stmt.execute(params![jurisdiction.id, session.identifier, session.name, i as i64])?;
        }
        Ok(())
    }

    fn jurisdiction(&self, id: &str) -> Result<Option<Jurisdiction>, StoreError> {
        let jurisdiction = self
            .conn
            .query_row(
                "SELECT id, name, url FROM jurisdictions WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Jurisdiction {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        url: row.get(2)?,
                        legislative_sessions: Vec::new(),
                    })
                },
            )
            .optional()?;
        let Some(mut jurisdiction) = jurisdiction else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT identifier, name FROM legislative_sessions WHERE jurisdiction_id = ?1 ORDER BY position",
        )?;
        jurisdiction.legislative_sessions = stmt
            .query_map(params![id], |row| {
                Ok(LegislativeSession { identifier: row.get(0)?, name: row.get(1)? })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(jurisdiction))
    }

    fn find_organizations(
        &self,
        jurisdiction_id: &str,
        query: &OrganizationQuery<'_>,
    ) -> Result<Vec<Stored<OrganizationData>>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, classification, parent_id, extras FROM organizations
             WHERE jurisdiction_id = ?1
               AND (?2 IS NULL OR name = ?2)
               AND (?3 IS NULL OR classification = ?3)
             ORDER BY rowid",
        )?;
        let orgs = stmt
            .query_map(params![jurisdiction_id, query.name, query.classification], organization_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(orgs)
    }

    fn organization(&self, id: &str) -> Result<Option<Stored<OrganizationData>>, StoreError> {
        let org = self
            .conn
            .query_row(
                "SELECT id, name, classification, parent_id, extras FROM organizations WHERE id = ?1",
                params![id],
                organization_from_row,
            )
            .optional()?;
        Ok(org)
    }

    fn insert_organization(
        &mut self,
        jurisdiction_id: &str,
        data: &OrganizationData,
    ) -> Result<EntityId, StoreError> {
        let id = Self::new_id("organization");
        self.conn.execute(
            "INSERT INTO organizations (id, jurisdiction_id, name, classification, parent_id, extras)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                jurisdiction_id,
                data.name,
                data.classification,
                data.parent_id,
                serde_json::to_string(&data.extras)?,
            ],
        )?;
        Ok(id)
    }

    fn update_organization(&mut self, id: &str, data: &OrganizationData) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE organizations SET name = ?2, classification = ?3, parent_id = ?4, extras = ?5
             WHERE id = ?1",
            params![
                id,
                data.name,
                data.classification,
                data.parent_id,
                serde_json::to_string(&data.extras)?,
            ],
        )?;
        Self::ensure_updated(changed, "organization", id)
    }

    fn find_people(
        &self,
        jurisdiction_id: &str,
        query: &PersonQuery<'_>,
    ) -> Result<Vec<Stored<PersonData>>, StoreError> {
        match *query {
            PersonQuery::Name(name) => {
                let sql = format!(
                    "SELECT p.id, p.name, p.birth_date, p.death_date, p.extras FROM people p
                     WHERE p.name = ?2 AND (p.jurisdiction_id = ?1 OR {MEMBER_OF_JURISDICTION})
                     ORDER BY p.rowid"
                );
                self.query_people(&sql, params![jurisdiction_id, name])
            }
            PersonQuery::Identifier { scheme, identifier } => {
                let sql = format!(
                    "SELECT p.id, p.name, p.birth_date, p.death_date, p.extras FROM people p
                     WHERE EXISTS (
                         SELECT 1 FROM person_identifiers i
                         WHERE i.person_id = p.id AND i.scheme = ?2 AND i.identifier = ?3)
                       AND {MEMBER_OF_JURISDICTION}
                     ORDER BY p.rowid"
                );
                self.query_people(&sql, params![jurisdiction_id, scheme, identifier])
            }
        }
    }

    fn person(&self, id: &str) -> Result<Option<Stored<PersonData>>, StoreError> {
        let mut people = self.query_people(
            "SELECT id, name, birth_date, death_date, extras FROM people WHERE id = ?1",
            params![id],
        )?;
        Ok(people.pop())
    }

    fn insert_person(
        &mut self,
        jurisdiction_id: Option<&str>,
        data: &PersonData,
    ) -> Result<EntityId, StoreError> {
        let id = Self::new_id("person");
        self.conn.execute(
            "INSERT INTO people (id, jurisdiction_id, name, birth_date, death_date, extras)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                jurisdiction_id,
                data.name,
                data.birth_date,
                data.death_date,
                serde_json::to_string(&data.extras)?,
            ],
        )?;
        self.write_person_collection(&id, PersonCollection::Identifiers, data)?;
        self.write_person_collection(&id, PersonCollection::Sources, data)?;
        Ok(id)
    }

    fn update_person(&mut self, id: &str, data: &PersonData) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE people SET name = ?2, birth_date = ?3, death_date = ?4, extras = ?5 WHERE id = ?1",
            params![
                id,
                data.name,
                data.birth_date,
                data.death_date,
                serde_json::to_string(&data.extras)?,
            ],
        )?;
        Self::ensure_updated(changed, "person", id)
    }

    fn replace_person_collection(
        &mut self,
        id: &str,
        collection: PersonCollection,
        data: &PersonData,
    ) -> Result<(), StoreError> {
        let sql = match collection {
            PersonCollection::Identifiers => "DELETE FROM person_identifiers WHERE person_id = ?1",
            PersonCollection::Sources => "DELETE FROM person_sources WHERE person_id = ?1",
        };
        self.conn.execute(sql, params![id])?;
        self.write_person_collection(id, collection, data)
    }

    fn find_memberships(
        &self,
        person_id: &str,
        organization_id: &str,
    ) -> Result<Vec<Stored<MembershipData>>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, person_id, organization_id, role, label, start_date, end_date
             FROM memberships WHERE person_id = ?1 AND organization_id = ?2 ORDER BY rowid",
        )?;
        let memberships = stmt
            .query_map(params![person_id, organization_id], |row| {
                Ok(Stored {
                    id: row.get(0)?,
                    data: MembershipData {
                        person_id: row.get(1)?,
                        organization_id: row.get(2)?,
                        role: row.get(3)?,
                        label: row.get(4)?,
                        start_date: row.get(5)?,
                        end_date: row.get(6)?,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(memberships)
    }

    fn insert_membership(&mut self, data: &MembershipData) -> Result<EntityId, StoreError> {
        let id = Self::new_id("membership");
        self.conn.execute(
            "INSERT INTO memberships (id, person_id, organization_id, role, label, start_date, end_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                data.person_id,
                data.organization_id,
                data.role,
                data.label,
                data.start_date,
                data.end_date,
            ],
        )?;
        Ok(id)
    }

    fn update_membership(&mut self, id: &str, data: &MembershipData) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE memberships SET person_id = ?2, organization_id = ?3, role = ?4, label = ?5,
                start_date = ?6, end_date = ?7
             WHERE id = ?1",
            params![
                id,
                data.person_id,
                data.organization_id,
                data.role,
                data.label,
                data.start_date,
                data.end_date,
            ],
        )?;
        Self::ensure_updated(changed, "membership", id)
    }

    fn find_bill(
        &self,
        jurisdiction_id: &str,
        legislative_session: &str,
        identifier: &str,
    ) -> Result<Option<Stored<BillData>>, StoreError> {
        let id: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM bills
                 WHERE jurisdiction_id = ?1 AND legislative_session = ?2 AND identifier = ?3",
                params![jurisdiction_id, legislative_session, identifier],
                |row| row.get(0),
            )
            .optional()?;
        match id {
            Some(id) => self.bill(&id),
            None => Ok(None),
        }
    }

    fn bill(&self, id: &str) -> Result<Option<Stored<BillData>>, StoreError> {
        let bill = self
            .conn
            .query_row(
                "SELECT identifier, legislative_session, title, classification, subject,
                        from_organization_id, extras
                 FROM bills WHERE id = ?1",
                params![id],
                |row| {
                    let mut bill = BillData::new(
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(5)?,
                    );
                    bill.classification = json_column(row, 3)?;
                    bill.subject = json_column(row, 4)?;
                    bill.extras = json_column(row, 6)?;
                    Ok(bill)
                },
            )
            .optional()?;
        let Some(mut bill) = bill else {
            return Ok(None);
        };
        self.load_bill_collections(id, &mut bill)?;
        Ok(Some(Stored { id: id.to_string(), data: bill }))
    }

    fn insert_bill(&mut self, jurisdiction_id: &str, data: &BillData) -> Result<EntityId, StoreError> {
        let id = Self::new_id("bill");
        let now = Self::now();
        self.conn.execute(
            "INSERT INTO bills
                (id, jurisdiction_id, legislative_session, identifier, title, classification, subject,
                 from_organization_id, extras, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            params![
                id,
                jurisdiction_id,
                data.legislative_session,
                data.identifier,
                data.title,
                serde_json::to_string(&data.classification)?,
                serde_json::to_string(&data.subject)?,
                data.from_organization_id,
                serde_json::to_string(&data.extras)?,
                now,
            ],
        )?;
        for collection in BillCollection::ALL {
            self.write_bill_collection(&id, collection, data)?;
        }
        Ok(id)
    }

    fn update_bill(&mut self, id: &str, data: &BillData) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE bills SET legislative_session = ?2, identifier = ?3, title = ?4, classification = ?5,
                subject = ?6, from_organization_id = ?7, extras = ?8, updated_at = ?9
             WHERE id = ?1",
            params![
                id,
                data.legislative_session,
                data.identifier,
                data.title,
                serde_json::to_string(&data.classification)?,
                serde_json::to_string(&data.subject)?,
                data.from_organization_id,
                serde_json::to_string(&data.extras)?,
                Self::now(),
            ],
        )?;
        Self::ensure_updated(changed, "bill", id)
    }

    fn replace_bill_collection(
        &mut self,
        id: &str,
        collection: BillCollection,
        data: &BillData,
    ) -> Result<(), StoreError> {
        self.touch_bill(id)?;
        self.delete_bill_collection(id, collection)?;
        self.write_bill_collection(id, collection, data)
    }

    fn set_action_summary(&mut self, id: &str, summary: &ActionSummary) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE bills SET first_action_date = ?2, latest_action_date = ?3, latest_action_description = ?4
             WHERE id = ?1",
            params![
                id,
                summary.first_action_date,
                summary.latest_action_date,
                summary.latest_action_description,
            ],
        )?;
        Self::ensure_updated(changed, "bill", id)
    }

    fn bill_updated_at(&self, id: &str) -> Result<Option<String>, StoreError> {
        let stamp = self
            .conn
            .query_row("SELECT updated_at FROM bills WHERE id = ?1", params![id], |row| row.get(0))
            .optional()?;
        Ok(stamp)
    }

    fn action_summary(&self, id: &str) -> Result<Option<ActionSummary>, StoreError> {
        let summary = self
            .conn
            .query_row(
                "SELECT first_action_date, latest_action_date, latest_action_description
                 FROM bills WHERE id = ?1",
                params![id],
                |row| {
                    Ok(ActionSummary {
                        first_action_date: row.get(0)?,
                        latest_action_date: row.get(1)?,
                        latest_action_description: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(summary)
    }

    fn unresolved_related_bills(
        &self,
        jurisdiction_id: &str,
    ) -> Result<Vec<UnresolvedRelatedBill>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT r.bill_id, r.position, r.identifier, r.legislative_session
             FROM bill_related_bills r JOIN bills b ON b.id = r.bill_id
             WHERE b.jurisdiction_id = ?1 AND r.related_bill_id IS NULL
             ORDER BY b.rowid, r.position",
        )?;
        let rows = stmt
            .query_map(params![jurisdiction_id], |row| {
                Ok(UnresolvedRelatedBill {
                    bill_id: row.get(0)?,
                    position: row.get::<_, i64>(1)? as usize,
                    identifier: row.get(2)?,
                    legislative_session: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn resolve_related_bill(
        &mut self,
        bill_id: &str,
        position: usize,
        related_bill_id: &str,
    ) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE bill_related_bills SET related_bill_id = ?3 WHERE bill_id = ?1 AND position = ?2",
            params![bill_id, position as i64, related_bill_id],
        )?;
        Self::ensure_updated(changed, "related bill", bill_id)?;
        self.touch_bill(bill_id)
    }

    fn count_bills(&self, jurisdiction_id: &str) -> Result<usize, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM bills WHERE jurisdiction_id = ?1",
            params![jurisdiction_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn document_kind(collection: BillCollection) -> &'static str {
    if collection == BillCollection::Versions {
        KIND_VERSION
    } else {
        KIND_DOCUMENT
    }
}

fn organization_from_row(row: &Row<'_>) -> rusqlite::Result<Stored<OrganizationData>> {
    Ok(Stored {
        id: row.get(0)?,
        data: OrganizationData {
            name: row.get(1)?,
            classification: row.get(2)?,
            parent_id: row.get(3)?,
            extras: json_column(row, 4)?,
        },
    })
}

/// Decode a JSON-encoded TEXT column.
fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RelatedEntity;
    use tempfile::NamedTempFile;

    fn store_with_chamber() -> (SqliteStore, EntityId) {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_jurisdiction(&Jurisdiction::new("jid", "Test").with_session("1900", "1900"))
            .unwrap();
        let org = store
            .insert_organization("jid", &OrganizationData::new("House", "lower"))
            .unwrap();
        (store, org)
    }

    fn sample_bill(org: &str) -> BillData {
        let mut bill = BillData::new("HB 1", "1900", "Axe & Tack Tax Act", org);
        bill.classification = vec!["bill".into()];
        bill.subject = vec!["taxes".into(), "axes".into()];
        bill.actions.push(Action {
            description: "introduced in house".into(),
            date: "1900-04-01".into(),
            organization_id: org.into(),
            classification: vec!["introduction".into()],
            related_entities: vec![RelatedEntity {
                name: "House".into(),
                entity_type: "organization".into(),
                person_id: None,
                organization_id: Some(org.into()),
            }],
        });
        bill.documents.push(Document {
            note: "Fiscal Note".into(),
            date: String::new(),
            classification: String::new(),
            links: vec![
                Link {
                    url: "http://example.com/fn.pdf".into(),
                    media_type: "application/pdf".into(),
                    text: String::new(),
                },
                Link {
                    url: "http://example.com/fn.html".into(),
                    media_type: "text/html".into(),
                    text: String::new(),
                },
            ],
        });
        bill.versions.push(Document {
            note: "Introduced".into(),
            date: String::new(),
            classification: String::new(),
            links: vec![Link {
                url: "http://example.com/v/1".into(),
                media_type: "text/html".into(),
                text: String::new(),
            }],
        });
        bill.related_bills.push(RelatedBill {
            identifier: "HB 99".into(),
            legislative_session: "1899".into(),
            relation_type: "prior-session".into(),
            related_bill_id: None,
        });
        bill
    }

    #[test]
    fn jurisdiction_roundtrip_keeps_session_order() {
        let (store, _) = store_with_chamber();
        let j = store.jurisdiction("jid").unwrap().unwrap();
        assert_eq!(j.name, "Test");
        assert_eq!(j.session("1900").map(|s| s.name.as_str()), Some("1900"));
        assert!(store.jurisdiction("nope").unwrap().is_none());
    }

    #[test]
    fn bill_reads_back_every_collection() {
        let (mut store, org) = store_with_chamber();
        let bill = sample_bill(&org);
        let id = store.insert_bill("jid", &bill).unwrap();

        let loaded = store.find_bill("jid", "1900", "HB 1").unwrap().unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.data, bill);
        assert_eq!(store.count_bills("jid").unwrap(), 1);
    }

    #[test]
    fn replacing_a_collection_drops_old_rows() {
        let (mut store, org) = store_with_chamber();
        let mut bill = sample_bill(&org);
        let id = store.insert_bill("jid", &bill).unwrap();

        bill.documents[0].links.truncate(1);
        bill.versions.clear();
        store.replace_bill_collection(&id, BillCollection::Documents, &bill).unwrap();
        store.replace_bill_collection(&id, BillCollection::Versions, &bill).unwrap();

        let loaded = store.bill(&id).unwrap().unwrap();
        assert_eq!(loaded.data.documents.len(), 1);
        assert_eq!(loaded.data.documents[0].links.len(), 1);
        assert!(loaded.data.versions.is_empty());

        let orphans: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM bill_document_links", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphans, 1);
    }

    #[test]
    fn rollback_discards_writes() {
        let (mut store, org) = store_with_chamber();
        store.begin().unwrap();
        store.insert_bill("jid", &sample_bill(&org)).unwrap();
        store.rollback().unwrap();
        assert_eq!(store.count_bills("jid").unwrap(), 0);
    }

    #[test]
    fn people_lookup_stays_in_jurisdiction() {
        let (mut store, org) = store_with_chamber();
        let mut data = PersonData::new("Zadock Snodgrass");
        data.identifiers.push(PersonIdentifier { scheme: "S".into(), identifier: "ID".into() });

        let member = store.insert_person(None, &data).unwrap();
        store.insert_membership(&MembershipData::new(member.clone(), org)).unwrap();
        // Same identifier, no membership anywhere in jid.
        store.insert_person(None, &data).unwrap();

        let found = store
            .find_people("jid", &PersonQuery::Identifier { scheme: "S", identifier: "ID" })
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, member);
        assert_eq!(found[0].data.identifiers, data.identifiers);

        let by_name = store.find_people("jid", &PersonQuery::Name("Zadock Snodgrass")).unwrap();
        assert_eq!(by_name.len(), 1);
        assert!(store.find_people("other", &PersonQuery::Name("Zadock Snodgrass")).unwrap().is_empty());
    }

    #[test]
    fn related_bills_resolve_in_place() {
        let (mut store, org) = store_with_chamber();
        let id = store.insert_bill("jid", &sample_bill(&org)).unwrap();

        let pending = store.unresolved_related_bills("jid").unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].identifier, "HB 99");

        let other = store.insert_bill("jid", &BillData::new("HB 99", "1899", "Old", org.as_str())).unwrap();
        let before = store.bill_updated_at(&id).unwrap().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.resolve_related_bill(&id, pending[0].position, &other).unwrap();
        assert!(store.unresolved_related_bills("jid").unwrap().is_empty());
        assert_ne!(store.bill_updated_at(&id).unwrap().unwrap(), before);
        let loaded = store.bill(&id).unwrap().unwrap();
        assert_eq!(loaded.data.related_bills[0].related_bill_id.as_deref(), Some(other.as_str()));
    }

    #[test]
    fn file_store_persists_between_opens() {
        let file = NamedTempFile::with_suffix(".db").unwrap();
        let org;
        {
            let mut store = SqliteStore::open(file.path()).unwrap();
            store.insert_jurisdiction(&Jurisdiction::new("jid", "Test")).unwrap();
            org = store.insert_organization("jid", &OrganizationData::new("House", "lower")).unwrap();
            let bill = store.insert_bill("jid", &BillData::new("HB 1", "1900", "T", org.as_str())).unwrap();
            store.set_action_summary(&bill, &ActionSummary::default()).unwrap();
        }
        let store = SqliteStore::open(file.path()).unwrap();
        assert_eq!(store.count_bills("jid").unwrap(), 1);
        let orgs = store
            .find_organizations("jid", &OrganizationQuery { classification: Some("lower"), ..Default::default() })
            .unwrap();
        assert_eq!(orgs.len(), 1);
        assert_eq!(orgs[0].id, org);
    }
}
