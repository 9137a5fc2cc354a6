//! Panel sessions shared by the whole daemon.
//!
//! One controller session, plus one session per `instance:module` key. Cached
//! sessions are probed before use. A key whose probe fails twice in a short
//! span is parked: it yields `None` until the poller finishes a good cycle.

mod inflight;

pub use inflight::Inflight;

use crate::upstream::{
    timed, Credentials, PanelProvider, PanelSession, ResourceSession, UpstreamError,
};
use ampcord_protocol::management::instance::ModuleKind;
use futures::FutureExt;
use log::{debug, info, warn};
use scc::hash_map::Entry;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

const GLOBAL_KEY: &str = "global";

/// Probe failures further apart than this do not add up.
pub const FAILURE_SPAN: Duration = Duration::from_secs(15 * 60);

#[derive(Error, Debug, Clone)]
pub enum SessionError {
    #[error("panel credentials are not configured")]
    MissingCredentials,

    #[error(transparent)]
    Upstream(Arc<UpstreamError>),
}

impl From<UpstreamError> for SessionError {
    fn from(value: UpstreamError) -> Self {
        SessionError::Upstream(Arc::new(value))
    }
}

struct FailureStreak {
    count: u32,
    last: Instant,
}

pub fn session_key(instance_id: Uuid, module: &ModuleKind) -> String {
    format!("{}:{}", instance_id, module)
}

fn same_session<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

pub struct SessionManager {
    provider: Arc<dyn PanelProvider>,
    credentials: Option<Credentials>,
    request_timeout: Duration,
    global: Mutex<Option<Arc<dyn PanelSession>>>,
    global_logins: Inflight<Arc<dyn PanelSession>>,
    resources: scc::HashMap<String, Arc<dyn ResourceSession>>,
    resource_logins: Inflight<Arc<dyn ResourceSession>>,
    failures: scc::HashMap<String, FailureStreak>,
    parked: scc::HashSet<String>,
}

impl SessionManager {
    pub fn new(
        provider: Arc<dyn PanelProvider>,
        credentials: Option<Credentials>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            credentials,
            request_timeout,
            global: Mutex::new(None),
            global_logins: Inflight::new(),
            resources: scc::HashMap::new(),
            resource_logins: Inflight::new(),
            failures: scc::HashMap::new(),
            parked: scc::HashSet::new(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Controller session; relogs once when the panel forgot the cached one.
    pub async fn global_session(&self) -> Result<Arc<dyn PanelSession>, SessionError> {
        let cached = self.global.lock().await.clone();
        if let Some(session) = cached {
            match timed(self.request_timeout, session.probe()).await {
                Ok(()) => return Ok(session),
                Err(e) if e.is_session_expired() => {
                    info!("panel session expired, logging in again");
                    let mut slot = self.global.lock().await;
                    if slot.as_ref().is_some_and(|s| same_session(s, &session)) {
                        *slot = None;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        self.login_global().await
    }

    async fn login_global(&self) -> Result<Arc<dyn PanelSession>, SessionError> {
        let credentials = self
            .credentials
            .clone()
            .ok_or(SessionError::MissingCredentials)?;
        let provider = self.provider.clone();
        let limit = self.request_timeout;

        let session = self
            .global_logins
            .run(GLOBAL_KEY, move || {
                async move {
                    timed(limit, provider.login(&credentials))
                        .await
                        .map_err(SessionError::from)
                }
                .boxed()
            })
            .await?;
        *self.global.lock().await = Some(session.clone());
        Ok(session)
    }

    /// Session scoped to one instance, or `None` while the key is parked.
    pub async fn resource_session(
        &self,
        instance_id: Uuid,
        module: &ModuleKind,
    ) -> Result<Option<Arc<dyn ResourceSession>>, SessionError> {
        let key = session_key(instance_id, module);
        if self.parked.contains_async(&key).await {
            debug!("instance session {} is parked", key);
            return Ok(None);
        }

        let cached = self.resources.read_async(&key, |_, s| s.clone()).await;
        if let Some(session) = cached {
            match timed(self.request_timeout, session.probe()).await {
                Ok(()) => {
                    self.failures.remove_async(&key).await;
                    return Ok(Some(session));
                }
                Err(e) => {
                    self.resources
                        .remove_if_async(&key, |current| same_session(current, &session))
                        .await;
                    if e.is_session_expired() {
                        debug!("instance session {} expired, logging in again", key);
                    } else {
                        let streak = self.record_failure(&key).await;
                        if streak > 1 {
                            warn!(
                                "instance session {} failed {} probes in a row, parking it: {}",
                                key, streak, e
                            );
                            let _ = self.parked.insert_async(key).await;
                            return Ok(None);
                        }
                        warn!("instance session {} probe failed, logging in again: {}", key, e);
                    }
                }
            }
        }

        self.login_resource(&key, instance_id, module).await.map(Some)
    }

    async fn login_resource(
        &self,
        key: &str,
        instance_id: Uuid,
        module: &ModuleKind,
    ) -> Result<Arc<dyn ResourceSession>, SessionError> {
        let global = self.global_session().await?;
        let module = module.clone();
        let limit = self.request_timeout;

        let session = self
            .resource_logins
            .run(key, move || {
                async move {
                    timed(limit, global.login_to_resource(instance_id, &module))
                        .await
                        .map_err(SessionError::from)
                }
                .boxed()
            })
            .await?;
        self.resources
            .upsert_async(key.to_string(), session.clone())
            .await;
        Ok(session)
    }

    async fn record_failure(&self, key: &str) -> u32 {
        let now = Instant::now();
        match self.failures.entry_async(key.to_string()).await {
            Entry::Occupied(mut entry) => {
                let streak = entry.get_mut();
                if now.duration_since(streak.last) > FAILURE_SPAN {
                    streak.count = 0;
                }
                streak.count += 1;
                streak.last = now;
                streak.count
            }
            Entry::Vacant(entry) => {
                entry.insert_entry(FailureStreak {
                    count: 1,
                    last: now,
                });
                1
            }
        }
    }

    /// Gives parked keys a clean slate; called after a successful poll cycle.
    pub async fn release_parked(&self) -> usize {
        let mut released = vec![];
        self.parked
            .retain_async(|key| {
                released.push(key.clone());
                false
            })
            .await;
        for key in &released {
            self.failures.remove_async(key).await;
        }
        if !released.is_empty() {
            info!("released {} parked instance session(s)", released.len());
        }
        released.len()
    }

    /// Drops every session held for an instance that left the panel.
    pub async fn forget(&self, instance_id: Uuid) {
        let prefix = format!("{}:", instance_id);
        self.resources
            .retain_async(|key, _| !key.starts_with(&prefix))
            .await;
        self.failures
            .retain_async(|key, _| !key.starts_with(&prefix))
            .await;
        self.parked.retain_async(|key| !key.starts_with(&prefix)).await;
    }

    pub async fn is_parked(&self, instance_id: Uuid, module: &ModuleKind) -> bool {
        self.parked
            .contains_async(&session_key(instance_id, module))
            .await
    }
}
