//! Read side of the instance snapshot, for whatever presents it to users.

use crate::store::{read_typed, KvStore};
use crate::utils::InstanceEvents;
use ampcord_protocol::management::instance::SanitizedInstance;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const SNAPSHOT_KEY: &str = "amp:instances";
pub const INSTANCE_KEY_PATTERN: &str = "amp:instance:*";
/// Expiry on every key the poller writes, in case the poller dies.
pub const SNAPSHOT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

pub fn instance_key(id: Uuid) -> String {
    format!("amp:instance:{}", id)
}

#[derive(Clone)]
pub struct InstanceCache {
    store: Arc<dyn KvStore>,
    events: Arc<InstanceEvents>,
}

impl InstanceCache {
    pub fn new(store: Arc<dyn KvStore>, events: Arc<InstanceEvents>) -> Self {
        Self { store, events }
    }

    /// Latest snapshot; empty when nothing was stored yet or the store is down.
    pub async fn all(&self) -> Vec<SanitizedInstance> {
        read_typed(self.store.as_ref(), SNAPSHOT_KEY)
            .await
            .unwrap_or_default()
    }

    /// Snapshot without instances marked hidden.
    pub async fn public(&self) -> Vec<SanitizedInstance> {
        let mut instances = self.all().await;
        instances.retain(|instance| !instance.hidden);
        instances
    }

    pub async fn get(&self, id: Uuid) -> Option<SanitizedInstance> {
        if let Some(instance) = read_typed(self.store.as_ref(), &instance_key(id)).await {
            return Some(instance);
        }
        self.all()
            .await
            .into_iter()
            .find(|instance| instance.instance_id == id)
    }

    /// Visible instances whose friendly name matches `query`, prefix matches first.
    pub async fn search(&self, query: &str, limit: usize) -> Vec<SanitizedInstance> {
        let query = query.trim().to_lowercase();
        let (mut prefix, mut inner): (Vec<_>, Vec<_>) = self
            .public()
            .await
            .into_iter()
            .filter(|instance| instance.friendly_name.to_lowercase().contains(&query))
            .partition(|instance| instance.friendly_name.to_lowercase().starts_with(&query));
        prefix.sort_by_key(|instance| instance.friendly_name.to_lowercase());
        inner.sort_by_key(|instance| instance.friendly_name.to_lowercase());
        prefix.into_iter().chain(inner).take(limit).collect()
    }

    pub fn on_create<F>(&self, callback: F) -> u64
    where
        F: Fn(SanitizedInstance) + Send + Sync + 'static,
    {
        self.events.created.add_sync_listener(callback)
    }

    pub fn on_delete<F>(&self, callback: F) -> u64
    where
        F: Fn(SanitizedInstance) + Send + Sync + 'static,
    {
        self.events.deleted.add_sync_listener(callback)
    }
}
