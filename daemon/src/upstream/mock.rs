//! In-process panel double for tests.

use super::{Credentials, PanelProvider, PanelSession, ResourceSession, UpstreamError};
use ampcord_protocol::management::instance::{ModuleKind, RawInstance};
use ampcord_protocol::management::player::Player;
use ampcord_protocol::management::schedule::ScheduleTrigger;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeMode {
    #[default]
    Ok,
    Expired,
    Broken,
}

impl ProbeMode {
    fn check(self) -> Result<(), UpstreamError> {
        match self {
            ProbeMode::Ok => Ok(()),
            ProbeMode::Expired => Err(UpstreamError::SessionExpired("gone".into())),
            ProbeMode::Broken => Err(UpstreamError::Api {
                status: 500,
                message: "broken".into(),
            }),
        }
    }
}

#[derive(Default)]
pub struct FakePanel {
    pub logins: AtomicUsize,
    pub resource_logins: AtomicUsize,
    pub reject_login: AtomicBool,
    pub login_delay: Mutex<Duration>,
    pub global_probe: Mutex<ProbeMode>,
    pub resource_probe: Mutex<HashMap<Uuid, ProbeMode>>,
    /// Resource sessions (numbered by login, from 1) whose probe always fails.
    pub broken_sessions: Mutex<Vec<usize>>,
    pub probe_delay: Mutex<Duration>,
    pub instances: Mutex<Vec<RawInstance>>,
    pub list_fails: AtomicBool,
    pub players: Mutex<HashMap<Uuid, Vec<Player>>>,
    pub broken_players: Mutex<Vec<Uuid>>,
    pub player_fetches: AtomicUsize,
    pub triggers: Mutex<Vec<ScheduleTrigger>>,
    pub config: Mutex<HashMap<String, Value>>,
    pub schedule_fetches: AtomicUsize,
}

impl FakePanel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_instances(&self, instances: Vec<RawInstance>) {
        *self.instances.lock().unwrap() = instances;
    }

    pub fn set_resource_probe(&self, id: Uuid, mode: ProbeMode) {
        self.resource_probe.lock().unwrap().insert(id, mode);
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        uri: "http://panel.test/".into(),
        username: "admin".into(),
        password: "secret".into(),
    }
}

pub struct FakeProvider(pub Arc<FakePanel>);

#[async_trait::async_trait]
impl PanelProvider for FakeProvider {
    async fn login(&self, _: &Credentials) -> Result<Arc<dyn PanelSession>, UpstreamError> {
        self.0.logins.fetch_add(1, Ordering::SeqCst);
        let delay = *self.0.login_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.0.reject_login.load(Ordering::SeqCst) {
            return Err(UpstreamError::Auth("bad password".into()));
        }
        Ok(Arc::new(FakeSession(self.0.clone())))
    }
}

struct FakeSession(Arc<FakePanel>);

#[async_trait::async_trait]
impl PanelSession for FakeSession {
    async fn probe(&self) -> Result<(), UpstreamError> {
        let mode = *self.0.global_probe.lock().unwrap();
        mode.check()
    }

    async fn list_instances(&self) -> Result<Vec<RawInstance>, UpstreamError> {
        if self.0.list_fails.load(Ordering::SeqCst) {
            return Err(UpstreamError::Api {
                status: 502,
                message: "bad gateway".into(),
            });
        }
        Ok(self.0.instances.lock().unwrap().clone())
    }

    async fn login_to_resource(
        &self,
        instance_id: Uuid,
        _: &ModuleKind,
    ) -> Result<Arc<dyn ResourceSession>, UpstreamError> {
        let login_no = self.0.resource_logins.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = *self.0.login_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.0.reject_login.load(Ordering::SeqCst) {
            return Err(UpstreamError::Auth("bad password".into()));
        }
        Ok(Arc::new(FakeResourceSession {
            id: instance_id,
            login_no,
            panel: self.0.clone(),
        }))
    }
}

struct FakeResourceSession {
    id: Uuid,
    login_no: usize,
    panel: Arc<FakePanel>,
}

#[async_trait::async_trait]
impl ResourceSession for FakeResourceSession {
    async fn probe(&self) -> Result<(), UpstreamError> {
        let delay = *self.panel.probe_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.panel.broken_sessions.lock().unwrap().contains(&self.login_no) {
            return ProbeMode::Broken.check();
        }
        let mode = self
            .panel
            .resource_probe
            .lock()
            .unwrap()
            .get(&self.id)
            .copied()
            .unwrap_or_default();
        mode.check()
    }

    async fn user_list(&self) -> Result<Vec<Player>, UpstreamError> {
        self.panel.player_fetches.fetch_add(1, Ordering::SeqCst);
        if self.panel.broken_players.lock().unwrap().contains(&self.id) {
            return Err(UpstreamError::Api {
                status: 500,
                message: "user list unavailable".into(),
            });
        }
        Ok(self
            .panel
            .players
            .lock()
            .unwrap()
            .get(&self.id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_config(&self, keys: &[&str]) -> Result<HashMap<String, Value>, UpstreamError> {
        let config = self.panel.config.lock().unwrap();
        Ok(keys
            .iter()
            .filter_map(|k| config.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    async fn schedule_triggers(&self) -> Result<Vec<ScheduleTrigger>, UpstreamError> {
        self.panel.schedule_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.panel.triggers.lock().unwrap().clone())
    }
}
