//! Data access for tenant tables: list / create / update / delete over the
//! remote store, with the query cache and user notifications.
//!
//! No optimistic updates and no retries: a mutation is sent once, the
//! entity's cache key is invalidated on success, last write wins.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crm_auth::AccessToken;
use crm_core::{DomainError, OrganizationId, Record, RecordId, UserId, Validate};

use crate::cache::QueryCache;
use crate::notify::{Notification, NotificationQueue};
use crate::store::{Caller, Filter, RemoteStore, Select, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0} rows cannot be deleted")]
    NotDeletable(&'static str),

    #[error("row not found")]
    NotFound,

    #[error("an identical request is already in progress")]
    AlreadySubmitting,

    #[error("request cancelled")]
    Cancelled,

    #[error("unexpected row shape: {0}")]
    Decode(String),
}

impl DataError {
    /// Description shown in the error notification.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            DataError::Invalid(DomainError::Validation(msg)) => msg.clone(),
            DataError::Store(StoreError::Forbidden(msg) | StoreError::Conflict(msg)) => msg.clone(),
            DataError::Store(StoreError::Rejected { message, .. }) if !message.is_empty() => message.clone(),
            _ => fallback.to_string(),
        }
    }
}

fn decode(e: serde_json::Error) -> DataError {
    DataError::Decode(e.to_string())
}

/// Mutations currently in flight, keyed by user, table, action and payload.
#[derive(Debug, Default)]
pub struct Submissions {
    in_flight: Mutex<HashSet<String>>,
}

/// Held while a mutation runs; releases its key on drop.
#[derive(Debug)]
pub struct SubmissionTicket {
    owner: Arc<Submissions>,
    key: String,
}

impl Submissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when an identical submission is already running.
    pub fn begin(self: &Arc<Self>, key: String) -> Option<SubmissionTicket> {
        let mut in_flight = self.in_flight.lock().ok()?;
        if !in_flight.insert(key.clone()) {
            return None;
        }
        Some(SubmissionTicket {
            owner: Arc::clone(self),
            key,
        })
    }
}

impl Drop for SubmissionTicket {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.owner.in_flight.lock() {
            in_flight.remove(&self.key);
        }
    }
}

/// Process-wide collaborators shared by every request.
#[derive(Clone)]
pub struct DataServices {
    pub store: Arc<dyn RemoteStore>,
    pub cache: Arc<dyn QueryCache>,
    pub notifications: Arc<NotificationQueue>,
    pub submissions: Arc<Submissions>,
}

impl DataServices {
    pub fn new(store: Arc<dyn RemoteStore>, cache: Arc<dyn QueryCache>) -> Self {
        Self {
            store,
            cache,
            notifications: Arc::new(NotificationQueue::new()),
            submissions: Arc::new(Submissions::new()),
        }
    }
}

/// Data access on behalf of one signed-in user of one organization.
#[derive(Clone)]
pub struct DataContext {
    services: DataServices,
    caller: Caller,
    user: UserId,
    organization: OrganizationId,
    cancel: CancellationToken,
}

impl DataContext {
    pub fn new(services: DataServices, token: AccessToken, user: UserId, organization: OrganizationId) -> Self {
        Self {
            services,
            caller: Caller::user(token, user),
            user,
            organization,
            cancel: CancellationToken::new(),
        }
    }

    /// Reads stop (and never populate the cache) once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn organization(&self) -> OrganizationId {
        self.organization
    }

    pub fn user(&self) -> UserId {
        self.user
    }

    pub fn notifications(&self) -> &NotificationQueue {
        &self.services.notifications
    }

    pub fn repository<R: Record>(&self) -> Repository<R> {
        Repository {
            ctx: self.clone(),
            _record: PhantomData,
        }
    }
}

pub struct Repository<R> {
    ctx: DataContext,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Repository<R> {
    /// Every visible row, with display relations, in the table's list order.
    pub async fn list(&self) -> Result<Vec<R>, DataError> {
        let ctx = &self.ctx;
        if let Some(cached) = ctx.services.cache.get(ctx.organization, R::TABLE) {
            match serde_json::from_value::<Vec<R>>(cached) {
                Ok(rows) => return Ok(rows),
                Err(e) => tracing::warn!(table = R::TABLE, error = %e, "discarding unreadable cache entry"),
            }
        }

        // Captured before the fetch: a mutation landing meanwhile bumps it.
        let generation = ctx.services.cache.generation(ctx.organization, R::TABLE);
        let query = Select::from(R::TABLE).embed(R::RELATIONS).order(R::ORDER);
        let rows = self.fetch(&query).await?;
        if ctx.cancel.is_cancelled() {
            return Err(DataError::Cancelled);
        }
        if let Ok(value) = serde_json::to_value(&rows) {
            ctx.services
                .cache
                .put_if_generation(ctx.organization, R::TABLE, generation, value);
        }
        Ok(rows)
    }

    /// Rows where `column = value` (e.g. the lines of one quote). Not cached.
    pub async fn list_where(&self, column: &str, value: impl ToString) -> Result<Vec<R>, DataError> {
        let query = Select::from(R::TABLE)
            .embed(R::RELATIONS)
            .eq(column, value)
            .order(R::ORDER);
        self.fetch(&query).await
    }

    pub async fn get(&self, id: RecordId) -> Result<Option<R>, DataError> {
        let query = Select::from(R::TABLE).embed(R::RELATIONS).eq("id", id);
        Ok(self.fetch(&query).await?.into_iter().next())
    }

    pub async fn create(&self, input: &R::Create) -> Result<R, DataError> {
        let result = self.try_create(input).await;
        self.report(&result, R::MESSAGES.created, "Une erreur est survenue lors de la création.");
        result
    }

    pub async fn update(&self, id: RecordId, patch: &R::Patch) -> Result<R, DataError> {
        let result = self.try_update(id, patch).await;
        self.report(&result, R::MESSAGES.updated, "Une erreur est survenue lors de la modification.");
        result
    }

    pub async fn delete(&self, id: RecordId) -> Result<(), DataError> {
        let result = self.try_delete(id).await;
        self.report(&result, R::MESSAGES.deleted, "Une erreur est survenue lors de la suppression.");
        result
    }

    async fn fetch(&self, query: &Select) -> Result<Vec<R>, DataError> {
        let ctx = &self.ctx;
        let raw = tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(DataError::Cancelled),
            rows = ctx.services.store.select(&ctx.caller, query) => rows?,
        };

        let mut rows = Vec::with_capacity(raw.len());
        for value in raw {
            let row: R = serde_json::from_value(value).map_err(decode)?;
            if self.belongs(&row) {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Client-side re-check of row-level security.
    fn belongs(&self, row: &R) -> bool {
        if !R::TENANT_SCOPED {
            return true;
        }
        match row.organization_id() {
            Some(organization) if organization == self.ctx.organization => true,
            other => {
                tracing::warn!(
                    table = R::TABLE,
                    row_id = %row.id(),
                    row_organization = ?other,
                    organization_id = %self.ctx.organization,
                    "dropping row outside the session's organization"
                );
                false
            }
        }
    }

    async fn try_create(&self, input: &R::Create) -> Result<R, DataError> {
        input.validate()?;
        let mut row = serde_json::to_value(input).map_err(decode)?;
        if R::TENANT_SCOPED {
            if let Some(obj) = row.as_object_mut() {
                obj.insert(
                    "organization_id".to_string(),
                    JsonValue::String(self.ctx.organization.to_string()),
                );
            }
        }
        let _ticket = self.begin("create", &row.to_string())?;

        let ctx = &self.ctx;
        let stored = ctx.services.store.insert(&ctx.caller, R::TABLE, row).await?;
        let created: R = serde_json::from_value(stored).map_err(decode)?;
        ctx.services.cache.invalidate(ctx.organization, R::TABLE);
        tracing::info!(table = R::TABLE, row_id = %created.id(), "row created");
        Ok(created)
    }

    async fn try_update(&self, id: RecordId, patch: &R::Patch) -> Result<R, DataError> {
        patch.validate()?;
        let body = serde_json::to_value(patch).map_err(decode)?;
        let _ticket = self.begin("update", &format!("{id}:{body}"))?;

        let ctx = &self.ctx;
        let mut rows = ctx
            .services
            .store
            .update(&ctx.caller, R::TABLE, &[Filter::eq("id", id)], body)
            .await?;
        let row = rows.pop().ok_or(DataError::NotFound)?;
        let updated: R = serde_json::from_value(row).map_err(decode)?;
        ctx.services.cache.invalidate(ctx.organization, R::TABLE);
        tracing::info!(table = R::TABLE, row_id = %id, "row updated");
        Ok(updated)
    }

    async fn try_delete(&self, id: RecordId) -> Result<(), DataError> {
        if !R::DELETABLE {
            return Err(DataError::NotDeletable(R::TABLE));
        }
        let _ticket = self.begin("delete", &id.to_string())?;

        let ctx = &self.ctx;
        let removed = ctx
            .services
            .store
            .delete(&ctx.caller, R::TABLE, &[Filter::eq("id", id)])
            .await?;
        if removed == 0 {
            return Err(DataError::NotFound);
        }
        ctx.services.cache.invalidate(ctx.organization, R::TABLE);
        tracing::info!(table = R::TABLE, row_id = %id, "row deleted");
        Ok(())
    }

    fn begin(&self, action: &str, payload: &str) -> Result<SubmissionTicket, DataError> {
        let key = format!("{}:{}:{action}:{payload}", self.ctx.user, R::TABLE);
        self.ctx
            .services
            .submissions
            .begin(key)
            .ok_or(DataError::AlreadySubmitting)
    }

    fn report<T>(&self, result: &Result<T, DataError>, success: (&str, &str), fallback: &str) {
        let notification = match result {
            Ok(_) => Notification::success(success.0, success.1),
            Err(DataError::AlreadySubmitting | DataError::Cancelled) => return,
            Err(e) => {
                tracing::error!(table = R::TABLE, error = %e, "mutation failed");
                Notification::error(e.user_message(fallback))
            }
        };
        self.ctx.services.notifications.push(self.ctx.user, notification);
    }
}
