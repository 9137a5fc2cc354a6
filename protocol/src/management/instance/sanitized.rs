use super::{ModuleKind, SanitizedMetric};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Welcome message that keeps an instance out of public listings.
pub const HIDDEN_SENTINEL: &str = "hidden";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modpack {
    pub name: String,
    pub url: Option<String>,
}

/// Rolling samples, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsHistorySnapshot {
    pub cpu: Vec<f64>,
    pub memory: Vec<f64>,
    pub tps: Vec<f64>,
}

/// Averages over [`MetricsHistorySnapshot`], one decimal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsAverages {
    pub cpu: Option<f64>,
    pub memory: Option<f64>,
    pub tps: Option<f64>,
}

/// Canonical, display-ready view of one instance, as stored in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanitizedInstance {
    pub instance_id: Uuid,
    pub friendly_name: String,
    pub instance_name: String,
    pub module: ModuleKind,
    pub welcome_message: String,
    pub hidden: bool,
    pub modpack: Option<Modpack>,
    pub app_state: String,
    pub running: bool,
    pub suspended: bool,
    pub server_icon: String,
    pub server_port: Option<u16>,
    pub metrics: HashMap<String, SanitizedMetric>,
    pub next_restart: Option<DateTime<Utc>>,
    pub next_backup: Option<DateTime<Utc>>,
    #[serde(default)]
    pub schedule_offset_seconds: i64,
    #[serde(default)]
    pub metrics_history: MetricsHistorySnapshot,
    #[serde(default)]
    pub averages: MetricsAverages,
}
