use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A populated time trigger from the panel scheduler.
///
/// Empty match lists mean "any". Weekdays count from Sunday = 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScheduleTrigger {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub match_months: Vec<u32>,
    #[serde(default)]
    pub match_days: Vec<u32>,
    #[serde(default)]
    pub match_weekdays: Vec<u32>,
    #[serde(default)]
    pub match_hours: Vec<u32>,
    #[serde(default)]
    pub match_minutes: Vec<u32>,
    /// Method names of the tasks run by this trigger, e.g. `Core.RestartApplication`.
    #[serde(default)]
    pub tasks: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTrigger {
    pub description: String,
    pub next_run: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleInfo {
    pub offset_seconds: i64,
    pub triggers: Vec<ScheduledTrigger>,
    pub next_restart: Option<DateTime<Utc>>,
    pub next_backup: Option<DateTime<Utc>>,
}
