use anyhow::Context;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::ops::Deref;
use std::sync::{Arc, LazyLock};
use tokio::sync::Notify;

use crate::cache::InstanceCache;
use crate::config::{AppConfig, StoreConfig};
use crate::cooldown::CooldownTable;
use crate::drivers::{GracefulShutdown, PollerDriver};
use crate::normalize::{MetricsHistory, Normalizer};
use crate::poller::ReconciliationPoller;
use crate::session::SessionManager;
use crate::store::{KvStore, MemoryStore, RedisStore};
use crate::upstream::AmpProvider;
use crate::utils::InstanceEvents;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
static START_TIME: LazyLock<DateTime<Utc>> = LazyLock::new(Utc::now);

pub struct ApplicationState {
    pub stop_notify: Arc<Notify>,
    pub config: AppConfig,
    pub poller: Arc<ReconciliationPoller>,
    pub cache: InstanceCache,
}
pub type AppState = Arc<ApplicationState>;

pub fn get_start_time() -> &'static DateTime<Utc> {
    START_TIME.deref()
}

async fn open_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn KvStore>> {
    if !config.redis {
        warn!("redis disabled, the snapshot lives in memory only");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = RedisStore::connect(&config.host, config.port)
        .await
        .with_context(|| format!("connecting to redis at {}:{}", config.host, config.port))?;
    Ok(Arc::new(store))
}

async fn init_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    debug!(
        "config loaded: {}",
        serde_json::to_string_pretty(&config.redacted()).unwrap_or_default()
    );

    let credentials = match config.panel.credentials() {
        Ok(credentials) => Some(credentials),
        Err(e) => {
            error!("{}", e);
            None
        }
    };
    let panel_url = credentials
        .as_ref()
        .map(|c| c.uri.clone())
        .unwrap_or_default();

    let timeout = config.panel.request_timeout();
    let provider = AmpProvider::new(timeout).context("building http client")?;
    let sessions = Arc::new(SessionManager::new(Arc::new(provider), credentials, timeout));
    let normalizer = Arc::new(Normalizer::new(
        sessions.clone(),
        Arc::new(CooldownTable::new(config.cooldown.policy())),
        Arc::new(MetricsHistory::new()),
        panel_url,
    ));

    let store = open_store(&config.store).await?;
    let events = Arc::new(InstanceEvents::default());
    let poller = Arc::new(ReconciliationPoller::new(
        normalizer,
        store.clone(),
        events.clone(),
        config.poller.concurrency,
        config.poller.interval(),
    ));

    Ok(Arc::new(ApplicationState {
        stop_notify: Arc::new(Notify::new()),
        cache: InstanceCache::new(store, events),
        poller,
        config,
    }))
}

pub async fn run_app() -> anyhow::Result<()> {
    let _ = get_start_time();
    info!("ampcord daemon v{}", VERSION);

    let config = AppConfig::load().context("loading configuration")?;
    let state = init_app_state(config).await?;

    state.cache.on_create(|instance| {
        debug!("announcing new instance {}", instance.friendly_name);
    });
    state.cache.on_delete(|instance| {
        debug!("announcing removed instance {}", instance.friendly_name);
    });

    let mut gs = GracefulShutdown::new();
    gs.add_driver(PollerDriver::new(
        state.poller.clone(),
        state.stop_notify.clone(),
    ));
    gs.watch(state.stop_notify.clone()).await;

    let uptime = Utc::now() - *get_start_time();
    info!("Bye. (up {}s)", uptime.num_seconds());
    Ok(())
}
