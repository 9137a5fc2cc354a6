//! Contract of the game panel the cache is fed from.
//!
//! [`PanelProvider`] logs in, [`PanelSession`] lists every instance the
//! controller knows and opens [`ResourceSession`]s scoped to one instance.

mod amp;
mod error;

pub use amp::AmpProvider;
pub use error::{UpstreamError, SESSION_EXPIRED_SIGNATURE};

use ampcord_protocol::management::instance::{ModuleKind, RawInstance};
use ampcord_protocol::management::player::Player;
use ampcord_protocol::management::schedule::ScheduleTrigger;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub uri: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[async_trait::async_trait]
pub trait PanelProvider: Send + Sync {
    async fn login(&self, credentials: &Credentials)
        -> Result<Arc<dyn PanelSession>, UpstreamError>;
}

#[async_trait::async_trait]
pub trait PanelSession: Send + Sync {
    /// Cheap call used to tell whether a cached session is still alive.
    async fn probe(&self) -> Result<(), UpstreamError>;

    async fn list_instances(&self) -> Result<Vec<RawInstance>, UpstreamError>;

    async fn login_to_resource(
        &self,
        instance_id: Uuid,
        module: &ModuleKind,
    ) -> Result<Arc<dyn ResourceSession>, UpstreamError>;
}

#[async_trait::async_trait]
pub trait ResourceSession: Send + Sync {
    async fn probe(&self) -> Result<(), UpstreamError>;

    async fn user_list(&self) -> Result<Vec<Player>, UpstreamError>;

    async fn get_config(&self, keys: &[&str]) -> Result<HashMap<String, Value>, UpstreamError>;

    async fn schedule_triggers(&self) -> Result<Vec<ScheduleTrigger>, UpstreamError>;
}

/// Bounds an upstream call; a hung request becomes [`UpstreamError::Timeout`].
pub async fn timed<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, UpstreamError>>,
) -> Result<T, UpstreamError> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or_else(|_| Err(UpstreamError::Timeout(limit.as_secs())))
}

#[cfg(test)]
pub mod mock;
