use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use super::query::{Filter, Select};
use super::r#trait::{Caller, RemoteStore, StoreError};

const RLS_VIOLATION: &str = "new row violates row-level security policy";

/// Row visibility rule of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Policy {
    /// `id = auth.uid()`.
    Profiles,
    /// `user_id = auth.uid()`.
    Members,
    /// Organizations the caller is a member of.
    Organizations,
    /// Visible through a parent row (`fk` points at `parent.id`).
    Child { fk: &'static str, parent: &'static str },
    /// `organization_id = get_user_organization_id()`.
    Tenant,
}

fn policy(table: &str) -> Policy {
    match table {
        "profiles" => Policy::Profiles,
        "organization_members" => Policy::Members,
        "organizations" => Policy::Organizations,
        "devis_items" => Policy::Child {
            fk: "devis_id",
            parent: "devis",
        },
        _ => Policy::Tenant,
    }
}

/// Resolved caller: service, or a user with their organization (if any).
#[derive(Debug, Clone)]
enum Access {
    Service,
    User { user: String, organization: Option<String> },
}

type Tables = HashMap<String, Vec<JsonValue>>;

/// In-memory remote store emulating the hosted database's row-level security.
///
/// Intended for tests/dev. Tenant tables are filtered by the caller's
/// organization (looked up in `organization_members`), inserts without an
/// `organization_id` get the caller's, and writes into another organization
/// are refused. [`Caller::Service`] bypasses every policy.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row as-is, bypassing policies (fixtures, provisioning).
    pub fn seed(&self, table: &str, row: JsonValue) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        tables.entry(table.to_string()).or_default().push(row);
        Ok(())
    }

    /// Raw contents of a table, ignoring policies.
    pub fn rows(&self, table: &str) -> Vec<JsonValue> {
        self.tables
            .read()
            .ok()
            .and_then(|t| t.get(table).cloned())
            .unwrap_or_default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Transport("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Transport("lock poisoned".to_string()))
    }
}

fn text(row: &JsonValue, column: &str) -> Option<String> {
    match row.get(column)? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Null => None,
        other => Some(other.to_string()),
    }
}

fn access(tables: &Tables, caller: &Caller) -> Access {
    match caller {
        Caller::Service => Access::Service,
        Caller::User { user, .. } => {
            let user = user.to_string();
            let organization = tables
                .get("organization_members")
                .and_then(|rows| rows.iter().find(|r| text(r, "user_id").as_deref() == Some(user.as_str())))
                .and_then(|r| text(r, "organization_id"));
            Access::User { user, organization }
        }
    }
}

fn visible(tables: &Tables, access: &Access, table: &str, row: &JsonValue) -> bool {
    let Access::User { user, organization } = access else {
        return true;
    };
    match policy(table) {
        Policy::Profiles => text(row, "id").as_deref() == Some(user.as_str()),
        Policy::Members => text(row, "user_id").as_deref() == Some(user.as_str()),
        Policy::Organizations => organization.is_some() && text(row, "id") == *organization,
        Policy::Child { fk, parent } => {
            let Some(parent_id) = text(row, fk) else { return false };
            tables
                .get(parent)
                .and_then(|rows| rows.iter().find(|p| text(p, "id").as_deref() == Some(parent_id.as_str())))
                .is_some_and(|p| visible(tables, access, parent, p))
        }
        Policy::Tenant => organization.is_some() && text(row, "organization_id") == *organization,
    }
}

/// Apply insert defaults and the `WITH CHECK` side of the policies.
fn check_insert(tables: &Tables, access: &Access, table: &str, row: &mut Map<String, JsonValue>) -> Result<(), StoreError> {
    let now = JsonValue::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true));
    row.entry("id").or_insert_with(|| JsonValue::String(Uuid::new_v4().to_string()));
    match policy(table) {
        Policy::Members => {
            row.entry("joined_at").or_insert(now);
        }
        _ => {
            row.entry("created_at").or_insert_with(|| now.clone());
            row.entry("updated_at").or_insert(now);
        }
    }

    let Access::User { user, organization } = access else {
        return Ok(());
    };
    match policy(table) {
        Policy::Tenant => {
            let Some(organization) = organization else {
                return Err(StoreError::Forbidden(RLS_VIOLATION.to_string()));
            };
            match row.get("organization_id") {
                None | Some(JsonValue::Null) => {
                    row.insert("organization_id".to_string(), JsonValue::String(organization.clone()));
                }
                Some(JsonValue::String(o)) if o == organization => {}
                Some(_) => return Err(StoreError::Forbidden(RLS_VIOLATION.to_string())),
            }
            Ok(())
        }
        Policy::Child { .. } => {
            let candidate = JsonValue::Object(row.clone());
            if visible(tables, access, table, &candidate) {
                Ok(())
            } else {
                Err(StoreError::Forbidden(RLS_VIOLATION.to_string()))
            }
        }
        Policy::Profiles => {
            if text(&JsonValue::Object(row.clone()), "id").as_deref() == Some(user.as_str()) {
                Ok(())
            } else {
                Err(StoreError::Forbidden(RLS_VIOLATION.to_string()))
            }
        }
        Policy::Members | Policy::Organizations => Err(StoreError::Forbidden(RLS_VIOLATION.to_string())),
    }
}

fn embed(tables: &Tables, access: &Access, query: &Select, row: &mut JsonValue) {
    for relation in &query.embeds {
        let related = text(row, relation.foreign_key).and_then(|id| {
            tables
                .get(relation.table)?
                .iter()
                .find(|r| text(r, "id").as_deref() == Some(id.as_str()) && visible(tables, access, relation.table, r))
        });
        let value = match related {
            Some(r) if relation.columns == ["*"] => r.clone(),
            Some(r) => {
                let projected: Map<String, JsonValue> = relation
                    .columns
                    .iter()
                    .map(|c| (c.to_string(), r.get(*c).cloned().unwrap_or(JsonValue::Null)))
                    .collect();
                JsonValue::Object(projected)
            }
            None => JsonValue::Null,
        };
        if let Some(obj) = row.as_object_mut() {
            obj.insert(relation.table.to_string(), value);
        }
    }
}

/// Postgres-like ordering: nulls sort last ascending, first descending.
fn compare(a: Option<&JsonValue>, b: Option<&JsonValue>) -> CmpOrdering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => CmpOrdering::Equal,
        (None, Some(_)) => CmpOrdering::Greater,
        (Some(_), None) => CmpOrdering::Less,
        (Some(JsonValue::Number(x)), Some(JsonValue::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(CmpOrdering::Equal),
        (Some(JsonValue::String(x)), Some(JsonValue::String(y))) => x.to_lowercase().cmp(&y.to_lowercase()),
        (Some(JsonValue::Bool(x)), Some(JsonValue::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

fn matches_all(filters: &[Filter], row: &JsonValue) -> bool {
    filters.iter().all(|f| f.matches(row))
}

fn object(row: JsonValue) -> Result<Map<String, JsonValue>, StoreError> {
    match row {
        JsonValue::Object(map) => Ok(map),
        other => Err(StoreError::Rejected {
            status: 400,
            message: format!("expected a JSON object, got {other}"),
        }),
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn select(&self, caller: &Caller, query: &Select) -> Result<Vec<JsonValue>, StoreError> {
        let tables = self.read()?;
        let access = access(&tables, caller);
        let mut rows: Vec<JsonValue> = tables
            .get(&query.table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| visible(&tables, &access, &query.table, r) && matches_all(&query.filters, r))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = query.order {
            rows.sort_by(|a, b| {
                let ord = compare(a.get(order.column), b.get(order.column));
                if order.ascending { ord } else { ord.reverse() }
            });
        }
        for row in &mut rows {
            embed(&tables, &access, query, row);
        }
        Ok(rows)
    }

    async fn insert(&self, caller: &Caller, table: &str, row: JsonValue) -> Result<JsonValue, StoreError> {
        let mut row = object(row)?;
        let mut tables = self.write()?;
        let access = access(&tables, caller);
        check_insert(&tables, &access, table, &mut row)?;

        let row = JsonValue::Object(row);
        tables.entry(table.to_string()).or_default().push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        caller: &Caller,
        table: &str,
        filters: &[Filter],
        patch: JsonValue,
    ) -> Result<Vec<JsonValue>, StoreError> {
        let mut patch = object(patch)?;
        patch.remove("id");
        patch.insert(
            "updated_at".to_string(),
            JsonValue::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
        );

        let mut tables = self.write()?;
        let access = access(&tables, caller);
        if let (Access::User { organization, .. }, Some(target)) = (&access, patch.get("organization_id")) {
            if policy(table) == Policy::Tenant && target.as_str() != organization.as_deref() {
                return Err(StoreError::Forbidden(RLS_VIOLATION.to_string()));
            }
        }

        let targets: Vec<usize> = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .enumerate()
                    .filter(|(_, r)| visible(&tables, &access, table, r) && matches_all(filters, r))
                    .map(|(i, _)| i)
                    .collect()
            })
            .unwrap_or_default();

        let mut updated = Vec::with_capacity(targets.len());
        if let Some(rows) = tables.get_mut(table) {
            for i in targets {
                if let Some(obj) = rows[i].as_object_mut() {
                    for (k, v) in &patch {
                        obj.insert(k.clone(), v.clone());
                    }
                }
                updated.push(rows[i].clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, caller: &Caller, table: &str, filters: &[Filter]) -> Result<usize, StoreError> {
        let mut tables = self.write()?;
        let access = access(&tables, caller);
        let doomed: Vec<bool> = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .map(|r| visible(&tables, &access, table, r) && matches_all(filters, r))
                    .collect()
            })
            .unwrap_or_default();

        let removed = doomed.iter().filter(|d| **d).count();
        if let Some(rows) = tables.get_mut(table) {
            let mut flags = doomed.into_iter();
            rows.retain(|_| !flags.next().unwrap_or(false));
        }
        Ok(removed)
    }

    async fn upsert(
        &self,
        caller: &Caller,
        table: &str,
        row: JsonValue,
        on_conflict: &str,
    ) -> Result<JsonValue, StoreError> {
        let key = text(&row, on_conflict).ok_or_else(|| StoreError::Rejected {
            status: 400,
            message: format!("missing conflict column {on_conflict}"),
        })?;
        let existing = {
            let tables = self.read()?;
            tables
                .get(table)
                .is_some_and(|rows| rows.iter().any(|r| text(r, on_conflict).as_deref() == Some(key.as_str())))
        };
        if !existing {
            return self.insert(caller, table, row).await;
        }
        let mut updated = self
            .update(caller, table, &[Filter::eq(on_conflict, &key)], row)
            .await?;
        updated
            .pop()
            .ok_or_else(|| StoreError::Forbidden(RLS_VIOLATION.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_auth::AccessToken;
    use crm_core::{Ordering, Relation, UserId};
    use serde_json::json;

    struct Fixture {
        store: InMemoryStore,
        alice: Caller,
        bob: Caller,
        stranger: Caller,
        org_a: String,
        org_b: String,
    }

    fn fixture() -> Fixture {
        let store = InMemoryStore::new();
        let (alice, bob, stranger) = (UserId::new(), UserId::new(), UserId::new());
        let (org_a, org_b) = (Uuid::new_v4().to_string(), Uuid::new_v4().to_string());
        for (user, org) in [(alice, &org_a), (bob, &org_b)] {
            store
                .seed(
                    "organization_members",
                    json!({ "id": Uuid::new_v4(), "user_id": user, "organization_id": org, "role": "owner" }),
                )
                .unwrap();
        }
        let caller = |u| Caller::user(AccessToken::new("t"), u);
        Fixture {
            store,
            alice: caller(alice),
            bob: caller(bob),
            stranger: caller(stranger),
            org_a,
            org_b,
        }
    }

    #[tokio::test]
    async fn insert_defaults_to_the_callers_organization() {
        let f = fixture();
        let row = f.store.insert(&f.alice, "contacts", json!({ "nom": "Martin" })).await.unwrap();
        assert_eq!(row["organization_id"], json!(f.org_a));
        assert!(row["id"].is_string());
        assert!(row["created_at"].is_string());
    }

    #[tokio::test]
    async fn tenants_never_see_each_others_rows() {
        let f = fixture();
        f.store.insert(&f.alice, "contacts", json!({ "nom": "A" })).await.unwrap();
        f.store.insert(&f.bob, "contacts", json!({ "nom": "B" })).await.unwrap();

        let query = Select::from("contacts");
        let seen: Vec<_> = f.store.select(&f.alice, &query).await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["nom"], "A");
        assert!(f.store.select(&f.stranger, &query).await.unwrap().is_empty());
        assert_eq!(f.store.select(&Caller::Service, &query).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn writes_into_another_organization_are_refused() {
        let f = fixture();
        let err = f
            .store
            .insert(&f.alice, "contacts", json!({ "nom": "X", "organization_id": f.org_b }))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));

        let err = f.store.insert(&f.stranger, "contacts", json!({ "nom": "X" })).await.unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));
    }

    #[tokio::test]
    async fn updates_and_deletes_only_touch_visible_rows() {
        let f = fixture();
        let row = f.store.insert(&f.bob, "entreprises", json!({ "raison_sociale": "Bob SA" })).await.unwrap();
        let by_id = [Filter::eq("id", row["id"].as_str().unwrap())];

        let updated = f
            .store
            .update(&f.alice, "entreprises", &by_id, json!({ "raison_sociale": "pwned" }))
            .await
            .unwrap();
        assert!(updated.is_empty());
        assert_eq!(f.store.delete(&f.alice, "entreprises", &by_id).await.unwrap(), 0);

        let updated = f
            .store
            .update(&f.bob, "entreprises", &by_id, json!({ "ville": "Lyon" }))
            .await
            .unwrap();
        assert_eq!(updated[0]["ville"], "Lyon");
        assert_eq!(f.store.delete(&f.bob, "entreprises", &by_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn select_orders_and_embeds() {
        let f = fixture();
        let acme = f.store.insert(&f.alice, "entreprises", json!({ "raison_sociale": "Acme" })).await.unwrap();
        f.store
            .insert(&f.alice, "contacts", json!({ "nom": "b", "entreprise_id": acme["id"] }))
            .await
            .unwrap();
        f.store.insert(&f.alice, "contacts", json!({ "nom": "A" })).await.unwrap();

        let query = Select::from("contacts").order(Ordering::asc("nom")).embed(&[Relation {
            table: "entreprises",
            foreign_key: "entreprise_id",
            columns: &["raison_sociale"],
        }]);
        let rows = f.store.select(&f.alice, &query).await.unwrap();
        assert_eq!(rows[0]["nom"], "A");
        assert_eq!(rows[0]["entreprises"], JsonValue::Null);
        assert_eq!(rows[1]["entreprises"], json!({ "raison_sociale": "Acme" }));
    }

    #[tokio::test]
    async fn quote_lines_follow_their_quote() {
        let f = fixture();
        let devis = f.store.insert(&f.alice, "devis", json!({ "numero_devis": "D-1" })).await.unwrap();
        f.store
            .insert(&f.alice, "devis_items", json!({ "devis_id": devis["id"], "quantite": 1 }))
            .await
            .unwrap();

        let err = f
            .store
            .insert(&f.bob, "devis_items", json!({ "devis_id": devis["id"], "quantite": 1 }))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));
        assert_eq!(f.store.select(&f.alice, &Select::from("devis_items")).await.unwrap().len(), 1);
        assert!(f.store.select(&f.bob, &Select::from("devis_items")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_merges_on_the_conflict_column() {
        let f = fixture();
        let first = json!({ "organization_id": f.org_a, "status": "pending", "plan_id": "pro" });
        f.store.upsert(&Caller::Service, "subscriptions", first, "organization_id").await.unwrap();
        let second = json!({ "organization_id": f.org_a, "plan_id": "enterprise" });
        let row = f
            .store
            .upsert(&Caller::Service, "subscriptions", second, "organization_id")
            .await
            .unwrap();

        assert_eq!(row["plan_id"], "enterprise");
        assert_eq!(row["status"], "pending");
        assert_eq!(f.store.rows("subscriptions").len(), 1);
    }

    #[tokio::test]
    async fn maybe_single_reports_duplicates() {
        let f = fixture();
        f.store.insert(&f.alice, "taches", json!({ "nom": "x", "reference": "T" })).await.unwrap();
        f.store.insert(&f.alice, "taches", json!({ "nom": "x", "reference": "T" })).await.unwrap();
        let query = Select::from("taches").eq("reference", "T");
        assert_eq!(f.store.maybe_single(&f.alice, &query).await, Err(StoreError::MultipleRows));
        let none = Select::from("taches").eq("reference", "nope");
        assert_eq!(f.store.maybe_single(&f.alice, &none).await, Ok(None));
    }
}
