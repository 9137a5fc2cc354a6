use super::{KvStore, StoreError};
use async_trait::async_trait;
use log::info;
use redis::aio::ConnectionManager;
use serde_json::Value;
use std::time::Duration;

/// Redis-backed store; values are stored as JSON strings.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(host: &str, port: u16) -> Result<Self, StoreError> {
        let url = format!("redis://{}:{}/", host, port);
        let client = redis::Client::open(url.as_str())?;
        let conn = ConnectionManager::new(client).await?;
        info!("connected to redis at {}:{}", host, port);
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn set_json(
        &self,
        key: &str,
        value: &Value,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let text = serde_json::to_string(value)?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(text);
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }
        let mut conn = self.conn.clone();
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn get_json(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let mut conn = self.conn.clone();
        let text: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        text.map(|text| {
            serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
                key: key.to_string(),
                source,
            })
        })
        .transpose()
    }

    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let mut keys: Vec<String> = redis::cmd("KEYS").arg(pattern).query_async(&mut conn).await?;
        keys.sort();
        Ok(keys)
    }

    async fn delete_json(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(removed > 0)
    }
}
