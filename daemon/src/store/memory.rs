use super::{KvStore, StoreError};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

struct Slot {
    value: Value,
    expires: Option<Instant>,
}

impl Slot {
    fn live(&self, now: Instant) -> bool {
        self.expires.map_or(true, |at| now < at)
    }
}

/// In-process store, used when no Redis is configured and in tests.
#[derive(Default)]
pub struct MemoryStore {
    slots: scc::HashMap<String, Slot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn glob_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{}$", body))
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn set_json(
        &self,
        key: &str,
        value: &Value,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let slot = Slot {
            value: value.clone(),
            expires: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.slots.upsert_async(key.to_string(), slot).await;
        Ok(())
    }

    async fn get_json(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let now = Instant::now();
        let found = self
            .slots
            .read_async(key, |_, slot| slot.live(now).then(|| slot.value.clone()))
            .await;
        match found {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                self.slots.remove_if_async(key, |slot| !slot.live(now)).await;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let regex = glob_regex(pattern)?;
        let now = Instant::now();
        let mut keys = vec![];
        self.slots
            .scan_async(|key, slot| {
                if slot.live(now) && regex.is_match(key) {
                    keys.push(key.clone());
                }
            })
            .await;
        keys.sort();
        Ok(keys)
    }

    async fn delete_json(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.slots.remove_async(key).await.is_some())
    }
}
