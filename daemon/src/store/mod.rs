//! Key-value persistence for snapshots.
//!
//! Values are JSON documents. Reads are forgiving: a missing, unreadable or
//! corrupt key is treated as "no data" by the typed helpers.

mod file;
mod memory;
mod redis_store;

pub use file::JsonFile;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use async_trait::async_trait;
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("value under '{key}' is not valid json: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("bad key pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("cannot encode value: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Stores `value`; `ttl` sets an expiry on the key.
    async fn set_json(
        &self,
        key: &str,
        value: &Value,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError>;

    async fn get_json(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Keys matching a glob where `*` stands for any run of characters.
    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Returns whether the key existed.
    async fn delete_json(&self, key: &str) -> Result<bool, StoreError>;
}

/// Reads and decodes `key`, treating every failure as absence.
pub async fn read_typed<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Option<T> {
    let value = match store.get_json(key).await {
        Ok(value) => value?,
        Err(e) => {
            warn!("cannot read '{}': {}", key, e);
            return None;
        }
    };
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            warn!("ignoring unexpected data under '{}': {}", key, e);
            None
        }
    }
}

pub async fn write_typed<T: Serialize + ?Sized>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<(), StoreError> {
    let value = serde_json::to_value(value)?;
    store.set_json(key, &value, ttl).await
}
