//! Periodic reconciliation of the panel listing against the stored snapshot.
//!
//! Each cycle reads the previous snapshot, fetches and normalizes the current
//! listing, announces created and deleted instances, then writes the new
//! snapshot. An empty listing never replaces a stored one.

use crate::cache::{instance_key, INSTANCE_KEY_PATTERN, SNAPSHOT_KEY, SNAPSHOT_TTL};
use crate::normalize::Normalizer;
use crate::store::{read_typed, write_typed, KvStore};
use crate::upstream::timed;
use crate::utils::{InstanceEvents, TaskPool};
use ampcord_protocol::management::instance::{RawInstance, SanitizedInstance};
use anyhow::Context;
use futures::FutureExt;
use log::{debug, error, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

/// Membership change between two snapshots, by instance id.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SnapshotDiff {
    pub created: Vec<SanitizedInstance>,
    pub deleted: Vec<SanitizedInstance>,
    pub unchanged: usize,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty()
    }
}

pub fn diff(previous: &[SanitizedInstance], current: &[SanitizedInstance]) -> SnapshotDiff {
    let before: HashMap<Uuid, &SanitizedInstance> =
        previous.iter().map(|i| (i.instance_id, i)).collect();
    let after: HashSet<Uuid> = current.iter().map(|i| i.instance_id).collect();

    let mut diff = SnapshotDiff::default();
    let mut seen = HashSet::new();
    for instance in current {
        if !seen.insert(instance.instance_id) {
            continue;
        }
        if before.contains_key(&instance.instance_id) {
            diff.unchanged += 1;
        } else {
            diff.created.push(instance.clone());
        }
    }
    let mut gone = HashSet::new();
    for instance in previous {
        if !after.contains(&instance.instance_id) && gone.insert(instance.instance_id) {
            diff.deleted.push(instance.clone());
        }
    }
    diff
}

/// Drops repeated instance ids from a listing, keeping the first record.
fn distinct(raws: Vec<RawInstance>) -> Vec<RawInstance> {
    let mut seen = HashSet::with_capacity(raws.len());
    raws.into_iter()
        .filter(|raw| {
            let first = seen.insert(raw.instance_id);
            if !first {
                warn!(
                    "panel listed instance {} more than once, ignoring \"{}\"",
                    raw.instance_id, raw.friendly_name
                );
            }
            first
        })
        .collect()
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub listed: usize,
    pub stored: usize,
    pub created: usize,
    pub deleted: usize,
    /// Set when the listing came back empty and nothing was written.
    pub skipped: bool,
}

pub struct ReconciliationPoller {
    normalizer: Arc<Normalizer>,
    store: Arc<dyn KvStore>,
    events: Arc<InstanceEvents>,
    pool: TaskPool,
    interval: Duration,
}

impl ReconciliationPoller {
    pub fn new(
        normalizer: Arc<Normalizer>,
        store: Arc<dyn KvStore>,
        events: Arc<InstanceEvents>,
        concurrency: usize,
        interval: Duration,
    ) -> Self {
        Self {
            normalizer,
            store,
            events,
            pool: TaskPool::new(concurrency),
            interval,
        }
    }

    async fn list_instances(&self) -> anyhow::Result<Vec<RawInstance>> {
        let sessions = self.normalizer.sessions();
        let session = sessions
            .global_session()
            .await
            .context("panel login failed")?;
        timed(sessions.request_timeout(), session.list_instances())
            .await
            .context("listing instances failed")
    }

    async fn fetch_current(&self) -> anyhow::Result<(usize, Vec<SanitizedInstance>)> {
        let raws = distinct(self.list_instances().await?);
        let listed = raws.len();
        let normalizer = self.normalizer.clone();
        let results = self
            .pool
            .run(raws, move |raw: RawInstance| {
                let normalizer = normalizer.clone();
                async move { Ok(normalizer.normalize(&raw).await) }.boxed()
            })
            .await;
        Ok((listed, results.into_iter().flatten().flatten().collect()))
    }

    pub async fn run_cycle(&self) -> anyhow::Result<CycleReport> {
        let previous: Vec<SanitizedInstance> = read_typed(self.store.as_ref(), SNAPSHOT_KEY)
            .await
            .unwrap_or_default();

        let (listed, current) = self.fetch_current().await?;
        if current.is_empty() {
            warn!(
                "panel returned no usable instances ({} listed), keeping the previous snapshot",
                listed
            );
            return Ok(CycleReport {
                listed,
                skipped: true,
                ..Default::default()
            });
        }

        let changes = diff(&previous, &current);
        for instance in &changes.created {
            info!("instance created: {} ({})", instance.friendly_name, instance.instance_id);
            self.events.created.invoke(instance.clone());
        }
        for instance in &changes.deleted {
            info!("instance deleted: {} ({})", instance.friendly_name, instance.instance_id);
            self.events.deleted.invoke(instance.clone());
        }

        self.persist(&current).await?;
        for instance in &changes.deleted {
            self.normalizer.forget(instance).await;
        }
        self.normalizer.sessions().release_parked().await;

        Ok(CycleReport {
            listed,
            stored: current.len(),
            created: changes.created.len(),
            deleted: changes.deleted.len(),
            skipped: false,
        })
    }

    async fn persist(&self, current: &[SanitizedInstance]) -> anyhow::Result<()> {
        let store = self.store.as_ref();
        write_typed(store, SNAPSHOT_KEY, current, Some(SNAPSHOT_TTL))
            .await
            .context("writing snapshot failed")?;

        let mut keep = HashSet::with_capacity(current.len());
        for instance in current {
            let key = instance_key(instance.instance_id);
            write_typed(store, &key, instance, Some(SNAPSHOT_TTL))
                .await
                .with_context(|| format!("writing {} failed", key))?;
            keep.insert(key);
        }

        match store.keys_matching(INSTANCE_KEY_PATTERN).await {
            Ok(keys) => {
                for key in keys.into_iter().filter(|k| !keep.contains(k)) {
                    debug!("removing stale key {}", key);
                    if let Err(e) = store.delete_json(&key).await {
                        warn!("cannot remove stale key {}: {}", key, e);
                    }
                }
            }
            Err(e) => warn!("cannot list instance keys: {}", e),
        }
        Ok(())
    }

    /// Polls until `stop` is notified. A cycle in progress is finished first.
    pub async fn run(&self, stop: Arc<Notify>) {
        let stopped = stop.notified();
        tokio::pin!(stopped);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("polling the panel every {}s", self.interval.as_secs());

        loop {
            tokio::select! {
                _ = &mut stopped => break,
                _ = ticker.tick() => {}
            }
            match self.run_cycle().await {
                Ok(report) if !report.skipped => info!(
                    "cycle done: {} listed, {} stored, {} created, {} deleted",
                    report.listed, report.stored, report.created, report.deleted
                ),
                Ok(_) => {}
                Err(e) => error!("cycle failed: {:#}", e),
            }
        }
        info!("poller stopped");
    }
}
