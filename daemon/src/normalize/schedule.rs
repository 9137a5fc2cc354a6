use ampcord_protocol::management::schedule::{ScheduleInfo, ScheduleTrigger, ScheduledTrigger};
use cached::{Cached, TimedCache};
use chrono::{DateTime, Datelike, Days, NaiveDateTime, TimeDelta, Utc};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Config node holding the offset between panel-local schedule time and UTC.
pub const OFFSET_CONFIG_KEY: &str = "Core.Schedule.ScheduleOffsetSeconds";

/// How far ahead a trigger is searched for its next match.
const SEARCH_DAYS: u64 = 400;

/// Next time `trigger` fires strictly after `after`.
///
/// Match lists are evaluated in panel-local time, `offset_seconds` ahead of UTC.
pub fn next_fire(
    trigger: &ScheduleTrigger,
    after: DateTime<Utc>,
    offset_seconds: i64,
) -> Option<DateTime<Utc>> {
    let offset = TimeDelta::try_seconds(offset_seconds)?;
    let local = after.naive_utc().checked_add_signed(offset)?;

    let hours = sorted_or_range(&trigger.match_hours, 0..24);
    let minutes = sorted_or_range(&trigger.match_minutes, 0..60);
    let matches = |list: &[u32], value: u32| list.is_empty() || list.contains(&value);

    for day in 0..SEARCH_DAYS {
        let date = local.date().checked_add_days(Days::new(day))?;
        if !matches(&trigger.match_months, date.month())
            || !matches(&trigger.match_days, date.day())
            || !matches(&trigger.match_weekdays, date.weekday().num_days_from_sunday())
        {
            continue;
        }
        for &hour in &hours {
            for &minute in &minutes {
                let Some(candidate) = date.and_hms_opt(hour, minute, 0) else {
                    continue;
                };
                if candidate > local {
                    return to_utc(candidate, offset);
                }
            }
        }
    }
    None
}

fn to_utc(local: NaiveDateTime, offset: TimeDelta) -> Option<DateTime<Utc>> {
    local.checked_sub_signed(offset).map(|t| t.and_utc())
}

fn sorted_or_range(list: &[u32], range: std::ops::Range<u32>) -> Vec<u32> {
    if list.is_empty() {
        return range.collect();
    }
    let mut sorted: Vec<u32> = list.iter().copied().filter(|v| range.contains(v)).collect();
    sorted.sort_unstable();
    sorted.dedup();
    sorted
}

fn runs_task(trigger: &ScheduleTrigger, needle: &str) -> bool {
    trigger
        .tasks
        .iter()
        .any(|task| task.to_ascii_lowercase().contains(needle))
}

/// Upcoming runs of every enabled trigger, plus the next restart and backup.
pub fn summarize(
    triggers: &[ScheduleTrigger],
    offset_seconds: i64,
    now: DateTime<Utc>,
) -> ScheduleInfo {
    let mut info = ScheduleInfo {
        offset_seconds,
        ..Default::default()
    };
    for trigger in triggers.iter().filter(|t| t.enabled) {
        let next_run = next_fire(trigger, now, offset_seconds);
        if let Some(at) = next_run {
            if runs_task(trigger, "restart") {
                info.next_restart = Some(info.next_restart.map_or(at, |cur| cur.min(at)));
            }
            if runs_task(trigger, "backup") {
                info.next_backup = Some(info.next_backup.map_or(at, |cur| cur.min(at)));
            }
        }
        info.triggers.push(ScheduledTrigger {
            description: trigger.description.clone(),
            next_run,
        });
    }
    info
}

pub fn offset_from_config(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Briefly remembered schedule lookups, one per instance.
pub struct ScheduleCache {
    entries: Mutex<TimedCache<Uuid, ScheduleInfo>>,
}

impl ScheduleCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(TimedCache::with_lifespan(ttl.as_secs().max(1))),
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<ScheduleInfo> {
        self.entries.lock().await.cache_get(&id).cloned()
    }

    pub async fn insert(&self, id: Uuid, info: ScheduleInfo) {
        self.entries.lock().await.cache_set(id, info);
    }

    pub async fn forget(&self, id: Uuid) {
        self.entries.lock().await.cache_remove(&id);
    }
}
