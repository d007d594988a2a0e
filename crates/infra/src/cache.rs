//! Query cache for list reads, keyed by `(organization, entity)`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use serde_json::Value as JsonValue;

use crm_core::OrganizationId;

/// Organization-isolated cache of list results.
///
/// Invalidating a key forces the next read to refetch; entries also go stale
/// after the cache's time-to-live. Every invalidation bumps the key's
/// generation, and a read only stores its rows if the generation it started
/// under is still current, so a fetch that overlapped a mutation never
/// repopulates the key with pre-mutation rows.
pub trait QueryCache: Send + Sync {
    /// Fresh entry for `key`, if any.
    fn get(&self, organization: OrganizationId, key: &str) -> Option<JsonValue>;
    /// Current generation of `key`; capture it before fetching.
    fn generation(&self, organization: OrganizationId, key: &str) -> u64;
    /// Store `value` unless `key` was invalidated since `generation` was read.
    /// Returns whether the value was stored.
    fn put_if_generation(&self, organization: OrganizationId, key: &str, generation: u64, value: JsonValue) -> bool;
    fn invalidate(&self, organization: OrganizationId, key: &str);
    /// Drop every entry of an organization.
    fn clear_organization(&self, organization: OrganizationId);
}

impl<S> QueryCache for Arc<S>
where
    S: QueryCache + ?Sized,
{
    fn get(&self, organization: OrganizationId, key: &str) -> Option<JsonValue> {
        (**self).get(organization, key)
    }

    fn generation(&self, organization: OrganizationId, key: &str) -> u64 {
        (**self).generation(organization, key)
    }

    fn put_if_generation(&self, organization: OrganizationId, key: &str, generation: u64, value: JsonValue) -> bool {
        (**self).put_if_generation(organization, key, generation, value)
    }

    fn invalidate(&self, organization: OrganizationId, key: &str) {
        (**self).invalidate(organization, key)
    }

    fn clear_organization(&self, organization: OrganizationId) {
        (**self).clear_organization(organization)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: JsonValue,
    stored_at: Instant,
}

#[derive(Debug, Default)]
struct Slots {
    entries: HashMap<(OrganizationId, String), Entry>,
    /// Bumped by `invalidate`.
    keys: HashMap<(OrganizationId, String), u64>,
    /// Bumped by `clear_organization`; covers keys never seen before.
    organizations: HashMap<OrganizationId, u64>,
}

impl Slots {
    // Both counters only grow, so their sum changes whenever either moves.
    fn generation(&self, organization: OrganizationId, key: &str) -> u64 {
        let per_key = self.keys.get(&(organization, key.to_string())).copied().unwrap_or(0);
        let per_org = self.organizations.get(&organization).copied().unwrap_or(0);
        per_key + per_org
    }
}

/// In-process cache shared by every request of the server.
#[derive(Debug)]
pub struct InMemoryQueryCache {
    ttl: Duration,
    inner: RwLock<Slots>,
}

impl InMemoryQueryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: RwLock::new(Slots::default()),
        }
    }
}

impl Default for InMemoryQueryCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl QueryCache for InMemoryQueryCache {
    fn get(&self, organization: OrganizationId, key: &str) -> Option<JsonValue> {
        let slots = self.inner.read().ok()?;
        let entry = slots.entries.get(&(organization, key.to_string()))?;
        (entry.stored_at.elapsed() < self.ttl).then(|| entry.value.clone())
    }

    fn generation(&self, organization: OrganizationId, key: &str) -> u64 {
        self.inner
            .read()
            .map(|slots| slots.generation(organization, key))
            .unwrap_or(u64::MAX)
    }

    fn put_if_generation(&self, organization: OrganizationId, key: &str, generation: u64, value: JsonValue) -> bool {
        let Ok(mut slots) = self.inner.write() else { return false };
        if slots.generation(organization, key) != generation {
            tracing::debug!(organization_id = %organization, key, "discarding list read that overlapped an invalidation");
            return false;
        }
        slots.entries.insert(
            (organization, key.to_string()),
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
        true
    }

    fn invalidate(&self, organization: OrganizationId, key: &str) {
        if let Ok(mut slots) = self.inner.write() {
            let slot = (organization, key.to_string());
            slots.entries.remove(&slot);
            *slots.keys.entry(slot).or_insert(0) += 1;
        }
    }

    fn clear_organization(&self, organization: OrganizationId) {
        if let Ok(mut slots) = self.inner.write() {
            slots.entries.retain(|(o, _k), _v| *o != organization);
            *slots.organizations.entry(organization).or_insert(0) += 1;
        }
    }
}
