//! Per-instance failure bookkeeping.
//!
//! Once an instance has failed `threshold` times in a row it is put on hold
//! for an exponentially growing, capped backoff. Expensive enrichment skips
//! instances on hold. When the hold runs out the entry is dropped entirely.

use log::{debug, info};
use scc::hash_map::Entry;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttemptClass {
    Players,
}

impl fmt::Display for AttemptClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptClass::Players => f.write_str("players"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownPolicy {
    pub threshold: u32,
    pub base: Duration,
    pub max: Duration,
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self {
            threshold: 3,
            base: Duration::from_secs(60),
            max: Duration::from_secs(15 * 60),
        }
    }
}

impl CooldownPolicy {
    /// `min(max, base * 2^max(0, (failures - (threshold - 1)) - 1))`
    pub fn backoff(&self, failures: u32) -> Duration {
        let over = i64::from(failures) - (i64::from(self.threshold) - 1);
        let exponent = (over - 1).max(0);
        if exponent >= 32 {
            return self.max;
        }
        self.base
            .checked_mul(1u32 << exponent)
            .map_or(self.max, |d| d.min(self.max))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CooldownEntry {
    pub failures: u32,
    pub backoff: Duration,
    pub until: Option<Instant>,
}

pub struct CooldownTable {
    policy: CooldownPolicy,
    entries: scc::HashMap<(Uuid, AttemptClass), CooldownEntry>,
}

impl CooldownTable {
    pub fn new(policy: CooldownPolicy) -> Self {
        Self {
            policy,
            entries: scc::HashMap::new(),
        }
    }

    /// Whether the instance is on hold; an expired hold is removed here.
    pub async fn is_on_hold(&self, id: Uuid, class: AttemptClass) -> bool {
        let now = Instant::now();
        match self.entries.entry_async((id, class)).await {
            Entry::Occupied(entry) => match entry.get().until {
                Some(until) if now < until => true,
                Some(_) => {
                    debug!("cooldown for {} ({}) ran out", id, class);
                    let _ = entry.remove_entry();
                    false
                }
                None => false,
            },
            Entry::Vacant(_) => false,
        }
    }

    pub async fn record_failure(&self, id: Uuid, class: AttemptClass) -> CooldownEntry {
        let now = Instant::now();
        let policy = self.policy;
        let apply = |entry: &mut CooldownEntry| {
            entry.failures += 1;
            entry.backoff = policy.backoff(entry.failures);
            if entry.failures >= policy.threshold {
                entry.until = Some(now + entry.backoff);
            }
        };

        let entry = match self.entries.entry_async((id, class)).await {
            Entry::Occupied(mut occupied) => {
                apply(occupied.get_mut());
                *occupied.get()
            }
            Entry::Vacant(vacant) => {
                let mut entry = CooldownEntry {
                    failures: 0,
                    backoff: Duration::ZERO,
                    until: None,
                };
                apply(&mut entry);
                vacant.insert_entry(entry);
                entry
            }
        };
        if entry.until.is_some() {
            info!(
                "{} ({}) failed {} times, on hold for {}s",
                id,
                class,
                entry.failures,
                entry.backoff.as_secs()
            );
        }
        entry
    }

    pub async fn record_success(&self, id: Uuid, class: AttemptClass) {
        self.entries.remove_async(&(id, class)).await;
    }

    pub async fn get(&self, id: Uuid, class: AttemptClass) -> Option<CooldownEntry> {
        self.entries.read_async(&(id, class), |_, e| *e).await
    }

    pub async fn forget(&self, id: Uuid) {
        self.entries.retain_async(|(key, _), _| *key != id).await;
    }
}
