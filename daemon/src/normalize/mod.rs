//! Raw panel records to [`SanitizedInstance`]s.
//!
//! Icon and schedule lookups are best effort and degrade to empty values. The
//! online player list is not: when it cannot be read the instance is dropped
//! from the cycle and a cooldown failure is recorded.

mod enrich;
mod history;
mod icon;
mod modpack;
mod port;
mod schedule;

pub use enrich::Enriched;
pub use history::{averages, MetricsHistory, TrackedMetric};
pub use icon::resolve_icon;
pub use modpack::{is_hidden, parse_modpack};
pub use port::resolve_port;
pub use schedule::{summarize, ScheduleCache, OFFSET_CONFIG_KEY};

use crate::cooldown::{AttemptClass, CooldownTable};
use crate::session::SessionManager;
use crate::upstream::timed;
use crate::utils::format_memory;
use ampcord_protocol::management::instance::{
    RawInstance, RawMetric, SanitizedInstance, SanitizedMetric,
};
use ampcord_protocol::management::player::Player;
use ampcord_protocol::management::schedule::ScheduleInfo;
use anyhow::{anyhow, Context};
use chrono::Utc;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Metric names carrying the number of connected players.
pub const ACTIVE_USER_ALIASES: [&str; 3] = ["Active Users", "Users", "Players"];

pub const SCHEDULE_TTL: Duration = Duration::from_secs(60);

fn active_users(metrics: &HashMap<String, RawMetric>) -> Option<(&'static str, &RawMetric)> {
    ACTIVE_USER_ALIASES
        .iter()
        .find_map(|alias| metrics.get(*alias).map(|m| (*alias, m)))
}

fn next_unit(units: &str) -> &str {
    match units.trim() {
        "KB" => "MB",
        "MB" => "GB",
        "GB" => "TB",
        other => other,
    }
}

fn memory_display(metric: &RawMetric) -> Option<String> {
    if !metric.raw_value.is_finite() {
        return None;
    }
    let unit = next_unit(&metric.units);
    let used = format_memory(metric.raw_value);
    Some(if metric.max_value.is_finite() && metric.max_value > 0.0 {
        format!("{} / {} {}", used, format_memory(metric.max_value), unit)
    } else {
        format!("{} {}", used, unit)
    })
}

pub struct Normalizer {
    sessions: Arc<SessionManager>,
    cooldowns: Arc<CooldownTable>,
    history: Arc<MetricsHistory>,
    schedules: ScheduleCache,
    panel_url: String,
}

impl Normalizer {
    pub fn new(
        sessions: Arc<SessionManager>,
        cooldowns: Arc<CooldownTable>,
        history: Arc<MetricsHistory>,
        panel_url: impl Into<String>,
    ) -> Self {
        Self {
            sessions,
            cooldowns,
            history,
            schedules: ScheduleCache::new(SCHEDULE_TTL),
            panel_url: panel_url.into(),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Normalizes one instance, or `None` when it has to sit this cycle out.
    pub async fn normalize(&self, raw: &RawInstance) -> Option<SanitizedInstance> {
        match self.try_normalize(raw).await {
            Ok(instance) => Some(instance),
            Err(e) => {
                warn!(
                    "dropping instance '{}' ({}) from this cycle: {:#}",
                    raw.display_name(),
                    raw.instance_id,
                    e
                );
                None
            }
        }
    }

    pub async fn try_normalize(&self, raw: &RawInstance) -> anyhow::Result<SanitizedInstance> {
        let id = raw.instance_id;
        let on_hold = self.cooldowns.is_on_hold(id, AttemptClass::Players).await;
        if on_hold {
            debug!("instance {} is cooling down, skipping player list", id);
        }

        let icon = resolve_icon(&raw.display_image_source, &self.panel_url);
        if let Some(reason) = icon.degraded_reason() {
            debug!("no icon for {}: {}", id, reason);
        }

        // one at a time: both lookups go through the same instance session
        let schedule = self.resolve_schedule(raw).await;
        if let Some(reason) = schedule.degraded_reason() {
            debug!("no schedule for {}: {}", id, reason);
        }
        let schedule = schedule.into_value();
        let players = self.resolve_players(raw, on_hold).await?;

        let metrics_history = self.history.record(id, &raw.metrics).await;
        let averages = averages(&metrics_history);

        let mut metrics: HashMap<String, SanitizedMetric> = raw
            .metrics
            .iter()
            .map(|(name, metric)| (name.clone(), SanitizedMetric::from(metric)))
            .collect();
        if let Some((name, _)) = active_users(&raw.metrics) {
            if let Some(metric) = metrics.get_mut(name) {
                metric.players = players;
            }
        }
        if let Some((name, raw_memory)) = TrackedMetric::Memory.find(&raw.metrics) {
            if let Some(metric) = metrics.get_mut(name) {
                metric.display = memory_display(raw_memory);
            }
        }

        let modpack =
            parse_modpack(&raw.welcome_message).or_else(|| parse_modpack(&raw.description));

        Ok(SanitizedInstance {
            instance_id: id,
            friendly_name: raw.friendly_name.clone(),
            instance_name: raw.instance_name.clone(),
            module: raw.module.clone(),
            welcome_message: raw.welcome_message.clone(),
            hidden: is_hidden(&raw.welcome_message),
            modpack,
            app_state: raw.app_state.resolve(),
            running: raw.running,
            suspended: raw.suspended,
            server_icon: icon.into_value(),
            server_port: resolve_port(&raw.module, &raw.deployment_args),
            metrics,
            next_restart: schedule.next_restart,
            next_backup: schedule.next_backup,
            schedule_offset_seconds: schedule.offset_seconds,
            metrics_history,
            averages,
        })
    }

    async fn resolve_schedule(&self, raw: &RawInstance) -> Enriched<ScheduleInfo> {
        if !raw.running {
            return Enriched::Ok(ScheduleInfo::default());
        }
        if let Some(info) = self.schedules.get(raw.instance_id).await {
            return Enriched::Ok(info);
        }
        match self.fetch_schedule(raw).await {
            Ok(info) => {
                self.schedules.insert(raw.instance_id, info.clone()).await;
                Enriched::Ok(info)
            }
            Err(e) => Enriched::degraded(ScheduleInfo::default(), format!("{:#}", e)),
        }
    }

    async fn fetch_schedule(&self, raw: &RawInstance) -> anyhow::Result<ScheduleInfo> {
        let session = self
            .sessions
            .resource_session(raw.instance_id, &raw.module)
            .await?
            .ok_or_else(|| anyhow!("instance session is parked"))?;
        let limit = self.sessions.request_timeout();
        let (config, triggers) = tokio::try_join!(
            timed(limit, session.get_config(&[OFFSET_CONFIG_KEY])),
            timed(limit, session.schedule_triggers()),
        )?;
        let offset = schedule::offset_from_config(config.get(OFFSET_CONFIG_KEY));
        Ok(summarize(&triggers, offset, Utc::now()))
    }

    async fn resolve_players(
        &self,
        raw: &RawInstance,
        on_hold: bool,
    ) -> anyhow::Result<Vec<Player>> {
        if on_hold || !raw.running {
            return Ok(vec![]);
        }
        let online = active_users(&raw.metrics)
            .map(|(_, metric)| metric.raw_value)
            .is_some_and(|count| count.is_finite() && count > 0.0);
        if !online {
            return Ok(vec![]);
        }

        match self.fetch_players(raw).await {
            Ok(players) => {
                self.cooldowns
                    .record_success(raw.instance_id, AttemptClass::Players)
                    .await;
                Ok(players)
            }
            Err(e) => {
                let entry = self
                    .cooldowns
                    .record_failure(raw.instance_id, AttemptClass::Players)
                    .await;
                Err(e.context(format!("player list failed ({} in a row)", entry.failures)))
            }
        }
    }

    async fn fetch_players(&self, raw: &RawInstance) -> anyhow::Result<Vec<Player>> {
        let session = self
            .sessions
            .resource_session(raw.instance_id, &raw.module)
            .await?
            .ok_or_else(|| anyhow!("instance session is parked"))?;
        timed(self.sessions.request_timeout(), session.user_list())
            .await
            .context("reading online players")
    }

    /// Drops per-instance state once an instance left the panel.
    pub async fn forget(&self, instance: &SanitizedInstance) {
        let id = instance.instance_id;
        self.history.forget(id).await;
        self.cooldowns.forget(id).await;
        self.schedules.forget(id).await;
        self.sessions.forget(id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cooldown::CooldownPolicy;
    use crate::upstream::mock::{credentials, FakePanel, FakeProvider};
    use ampcord_protocol::management::instance::{ModuleKind, RawAppState};
    use ampcord_protocol::management::schedule::ScheduleTrigger;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::Ordering;
    use uuid::Uuid;

    fn normalizer(panel: &Arc<FakePanel>) -> Normalizer {
        let sessions = Arc::new(SessionManager::new(
            Arc::new(FakeProvider(panel.clone())),
            Some(credentials()),
            Duration::from_secs(5),
        ));
        let policy = CooldownPolicy {
            threshold: 2,
            ..Default::default()
        };
        Normalizer::new(
            sessions,
            Arc::new(CooldownTable::new(policy)),
            Arc::new(MetricsHistory::new()),
            "http://panel.test/",
        )
    }

    fn metric(raw: f64, percent: f64, units: &str) -> RawMetric {
        RawMetric {
            raw_value: raw,
            max_value: f64::NAN,
            percent,
            units: units.into(),
            ..Default::default()
        }
    }

    fn survival(players_online: f64) -> RawInstance {
        let mut raw = RawInstance::new(Uuid::new_v4(), "Survival");
        raw.module = ModuleKind::Minecraft;
        raw.running = true;
        raw.app_state = RawAppState::Code(20);
        raw.display_image_source = "internal:MinecraftJava".into();
        raw.welcome_message = "All The Mods 9||https://example.com/atm9".into();
        raw.deployment_args
            .insert("MinecraftModule.Minecraft.PortNumber".into(), "25565".into());
        raw.metrics
            .insert("Active Users".into(), metric(players_online, 0.0, "Users"));
        raw
    }

    #[tokio::test]
    async fn test_full_record() {
        let panel = FakePanel::new();
        let raw = survival(1.0);
        panel.players.lock().unwrap().insert(
            raw.instance_id,
            vec![Player {
                id: "1".into(),
                name: "steve".into(),
            }],
        );
        let n = normalizer(&panel);

        let instance = n.normalize(&raw).await.unwrap();
        assert_eq!(instance.app_state, "Running");
        assert_eq!(instance.server_port, Some(25565));
        assert_eq!(
            instance.server_icon,
            "http://panel.test/Plugins/ADSModule/Images/MinecraftJava.jpg"
        );
        assert_eq!(instance.modpack.unwrap().name, "All The Mods 9");
        assert!(!instance.hidden);
        assert_eq!(instance.metrics["Active Users"].players.len(), 1);
    }

    #[tokio::test]
    async fn test_nan_raw_value_records_percent() {
        let panel = FakePanel::new();
        let mut raw = survival(0.0);
        raw.metrics
            .insert("CPU Usage".into(), metric(f64::NAN, 42.0, "%"));
        let n = normalizer(&panel);

        let instance = n.normalize(&raw).await.unwrap();
        assert_eq!(instance.metrics_history.cpu, vec![42.0]);
        assert_eq!(instance.averages.cpu, Some(42.0));
    }

    #[tokio::test]
    async fn test_memory_display() {
        let panel = FakePanel::new();
        let mut raw = survival(0.0);
        let mut memory = metric(3584.0, 43.75, "MB");
        memory.max_value = 8192.0;
        raw.metrics.insert("Memory Usage".into(), memory);
        let n = normalizer(&panel);

        let instance = n.normalize(&raw).await.unwrap();
        assert_eq!(
            instance.metrics["Memory Usage"].display.as_deref(),
            Some("3.5 / 8 GB")
        );
    }

    #[tokio::test]
    async fn test_player_failure_drops_instance() {
        let panel = FakePanel::new();
        let raw = survival(2.0);
        panel.broken_players.lock().unwrap().push(raw.instance_id);
        let n = normalizer(&panel);

        assert!(n.normalize(&raw).await.is_none());
        let entry = n
            .cooldowns
            .get(raw.instance_id, AttemptClass::Players)
            .await
            .unwrap();
        assert_eq!(entry.failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_hold_skips_player_list() {
        let panel = FakePanel::new();
        let raw = survival(2.0);
        panel.broken_players.lock().unwrap().push(raw.instance_id);
        let n = normalizer(&panel);

        assert!(n.normalize(&raw).await.is_none());
        assert!(n.normalize(&raw).await.is_none());
        assert!(n.cooldowns.is_on_hold(raw.instance_id, AttemptClass::Players).await);
        let fetches = panel.player_fetches.load(Ordering::SeqCst);

        let instance = n.normalize(&raw).await.unwrap();
        assert!(instance.metrics["Active Users"].players.is_empty());
        assert_eq!(panel.player_fetches.load(Ordering::SeqCst), fetches);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_session_is_replaced_once() {
        let panel = FakePanel::new();
        let raw = survival(2.0);
        let n = normalizer(&panel);
        n.sessions()
            .resource_session(raw.instance_id, &raw.module)
            .await
            .unwrap()
            .unwrap();
        panel.broken_sessions.lock().unwrap().push(1);
        *panel.probe_delay.lock().unwrap() = Duration::from_millis(10);

        let instance = n.normalize(&raw).await;
        assert!(instance.is_some());
        assert!(!n.sessions().is_parked(raw.instance_id, &raw.module).await);
        assert_eq!(panel.resource_logins.load(Ordering::SeqCst), 2);
        assert_eq!(panel.player_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_player_success_clears_cooldown() {
        let panel = FakePanel::new();
        let raw = survival(2.0);
        panel.broken_players.lock().unwrap().push(raw.instance_id);
        let n = normalizer(&panel);

        assert!(n.normalize(&raw).await.is_none());
        panel.broken_players.lock().unwrap().clear();
        assert!(n.normalize(&raw).await.is_some());
        assert!(n
            .cooldowns
            .get(raw.instance_id, AttemptClass::Players)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_stopped_instance_makes_no_resource_calls() {
        let panel = FakePanel::new();
        let mut raw = survival(3.0);
        raw.running = false;
        raw.app_state = RawAppState::Code(0);
        let n = normalizer(&panel);

        let instance = n.normalize(&raw).await.unwrap();
        assert_eq!(instance.app_state, "Stopped");
        assert_eq!(instance.next_restart, None);
        assert_eq!(panel.resource_logins.load(Ordering::SeqCst), 0);
        assert_eq!(panel.player_fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_schedule_is_cached() {
        let panel = FakePanel::new();
        panel.triggers.lock().unwrap().push(ScheduleTrigger {
            description: "nightly restart".into(),
            enabled: true,
            match_hours: vec![4],
            match_minutes: vec![0],
            tasks: vec!["Core.RestartApplication".into()],
            ..Default::default()
        });
        let raw = survival(0.0);
        let n = normalizer(&panel);

        let first = n.normalize(&raw).await.unwrap();
        let second = n.normalize(&raw).await.unwrap();
        assert!(first.next_restart.is_some());
        assert_eq!(first.next_restart, second.next_restart);
        assert_eq!(panel.schedule_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_schedule_failure_degrades() {
        let panel = FakePanel::new();
        panel.reject_login.store(true, Ordering::SeqCst);
        let raw = survival(0.0);
        let n = normalizer(&panel);

        let schedule = n.resolve_schedule(&raw).await;
        assert!(schedule.degraded_reason().is_some());
        assert_eq!(schedule.into_value(), ScheduleInfo::default());

        let instance = n.normalize(&raw).await.unwrap();
        assert_eq!(instance.next_restart, None);
        assert_eq!(instance.next_backup, None);
    }

    #[tokio::test]
    async fn test_hidden_and_description_modpack() {
        let panel = FakePanel::new();
        let mut raw = survival(0.0);
        raw.welcome_message = " Hidden ".into();
        raw.description = "Vanilla+||not a url".into();
        let n = normalizer(&panel);

        let instance = n.normalize(&raw).await.unwrap();
        assert!(instance.hidden);
        let modpack = instance.modpack.unwrap();
        assert_eq!(modpack.name, "Vanilla+");
        assert_eq!(modpack.url, None);
    }
}
