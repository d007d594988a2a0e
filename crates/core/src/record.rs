//! Contract shared by every tenant-scoped table (contacts, quotes, tasks, ...).

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{DomainResult, OrganizationId, RecordId};

/// An embedded relation pulled into list reads for display
/// (e.g. the company name next to a contact).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    /// Related table name, also the key under which the embedded object appears.
    pub table: &'static str,
    /// Column on the owning row pointing at the related row's `id`.
    pub foreign_key: &'static str,
    /// Columns of the related row to embed.
    pub columns: &'static [&'static str],
}

/// Ordering applied to list reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ordering {
    pub column: &'static str,
    pub ascending: bool,
}

impl Ordering {
    pub const fn asc(column: &'static str) -> Self {
        Self { column, ascending: true }
    }

    pub const fn desc(column: &'static str) -> Self {
        Self { column, ascending: false }
    }
}

/// User-facing notification texts for mutations on a record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordMessages {
    pub created: (&'static str, &'static str),
    pub updated: (&'static str, &'static str),
    pub deleted: (&'static str, &'static str),
}

/// Input validation performed before a write is sent to the remote store.
pub trait Validate {
    fn validate(&self) -> DomainResult<()>;
}

/// A row of a tenant-scoped table.
///
/// Rows always carry the owning organization; the remote store's row-level
/// security is the primary isolation mechanism and `organization_id` lets the
/// client re-check it.
pub trait Record: Serialize + DeserializeOwned + Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Insert payload.
    type Create: Serialize + Validate + Send + Sync;
    /// Partial update payload (absent fields are left untouched).
    type Patch: Serialize + Validate + Send + Sync;

    /// Remote table name; also used as the query-cache key.
    const TABLE: &'static str;
    const RELATIONS: &'static [Relation] = &[];
    const ORDER: Ordering = Ordering::desc("created_at");
    const DELETABLE: bool = false;
    /// Whether rows carry their own `organization_id` (child tables such as
    /// quote lines inherit it from their parent instead).
    const TENANT_SCOPED: bool = true;
    const MESSAGES: RecordMessages;

    fn id(&self) -> RecordId;

    fn organization_id(&self) -> Option<OrganizationId>;
}
