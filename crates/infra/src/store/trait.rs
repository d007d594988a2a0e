use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crm_auth::AccessToken;
use crm_core::UserId;

use super::query::{Filter, Select};

/// Who a remote call is made for.
///
/// User calls carry the user's access token and are subject to row-level
/// security. Service calls use the service-role key and bypass it; they are
/// reserved for server-side flows such as billing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    User { token: AccessToken, user: UserId },
    Service,
}

impl Caller {
    pub fn user(token: AccessToken, user: UserId) -> Self {
        Caller::User { token, user }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Caller::User { user, .. } => Some(*user),
            Caller::Service => None,
        }
    }
}

/// Remote store operation error.
///
/// These are **infrastructure errors** (transport, authorization, conflicts) as
/// opposed to domain errors (validation).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Token missing, expired or rejected.
    #[error("unauthorized")]
    Unauthorized,

    /// Row-level security refused the write.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Unique or conflict-key violation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A single-row read matched more than one row.
    #[error("query returned more than one row")]
    MultipleRows,

    /// Any other non-success answer from the store.
    #[error("remote store rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("remote store unreachable: {0}")]
    Transport(String),

    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// Generic table access on the remote store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Rows visible to `caller`, filtered, ordered and with relations embedded.
    async fn select(&self, caller: &Caller, query: &Select) -> Result<Vec<JsonValue>, StoreError>;

    /// Insert one row and return it as stored.
    async fn insert(&self, caller: &Caller, table: &str, row: JsonValue) -> Result<JsonValue, StoreError>;

    /// Patch every visible row matching `filters`; returns the updated rows
    /// (empty when nothing matched or row-level security hid the rows).
    async fn update(
        &self,
        caller: &Caller,
        table: &str,
        filters: &[Filter],
        patch: JsonValue,
    ) -> Result<Vec<JsonValue>, StoreError>;

    /// Delete every visible row matching `filters`; returns how many were removed.
    async fn delete(&self, caller: &Caller, table: &str, filters: &[Filter]) -> Result<usize, StoreError>;

    /// Insert or merge on `on_conflict`.
    async fn upsert(
        &self,
        caller: &Caller,
        table: &str,
        row: JsonValue,
        on_conflict: &str,
    ) -> Result<JsonValue, StoreError>;

    /// Zero or one row; more than one is an error.
    async fn maybe_single(&self, caller: &Caller, query: &Select) -> Result<Option<JsonValue>, StoreError> {
        let mut rows = self.select(caller, query).await?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            _ => Err(StoreError::MultipleRows),
        }
    }
}
