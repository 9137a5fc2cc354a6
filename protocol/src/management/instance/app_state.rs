use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Application state reported by the panel for one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppState {
    Stopped,
    PreStart,
    Configuring,
    Starting,
    Running,
    Restarting,
    Stopping,
    PreparingForSleep,
    Sleeping,
    Waiting,
    Installing,
    Updating,
    AwaitingUserInput,
    Failed,
    Suspended,
    Maintenance,
    Indeterminate,
    /// Any code missing from the panel's table.
    Offline,
}

impl AppState {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => AppState::Stopped,
            5 => AppState::PreStart,
            7 => AppState::Configuring,
            10 => AppState::Starting,
            20 => AppState::Running,
            30 => AppState::Restarting,
            40 => AppState::Stopping,
            45 => AppState::PreparingForSleep,
            50 => AppState::Sleeping,
            60 => AppState::Waiting,
            70 => AppState::Installing,
            75 => AppState::Updating,
            80 => AppState::AwaitingUserInput,
            100 => AppState::Failed,
            200 => AppState::Suspended,
            250 => AppState::Maintenance,
            999 => AppState::Indeterminate,
            _ => AppState::Offline,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppState::Stopped => "Stopped",
            AppState::PreStart => "PreStart",
            AppState::Configuring => "Configuring",
            AppState::Starting => "Starting",
            AppState::Running => "Running",
            AppState::Restarting => "Restarting",
            AppState::Stopping => "Stopping",
            AppState::PreparingForSleep => "PreparingForSleep",
            AppState::Sleeping => "Sleeping",
            AppState::Waiting => "Waiting",
            AppState::Installing => "Installing",
            AppState::Updating => "Updating",
            AppState::AwaitingUserInput => "AwaitingUserInput",
            AppState::Failed => "Failed",
            AppState::Suspended => "Suspended",
            AppState::Maintenance => "Maintenance",
            AppState::Indeterminate => "Indeterminate",
            AppState::Offline => "Offline",
        }
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The panel sends the state either as a numeric code or as a ready label.
///
/// Anything else (null, fractional numbers, objects) reads as an unknown code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RawAppState {
    Code(i64),
    Label(String),
}

impl Default for RawAppState {
    fn default() -> Self {
        RawAppState::Code(-1)
    }
}

impl<'de> Deserialize<'de> for RawAppState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_i64().map_or_else(RawAppState::default, RawAppState::Code),
            Value::String(label) => RawAppState::Label(label),
            _ => RawAppState::default(),
        })
    }
}

impl RawAppState {
    /// Labels pass through untouched, codes go through [`AppState::from_code`].
    pub fn resolve(&self) -> String {
        match self {
            RawAppState::Code(code) => AppState::from_code(*code).to_string(),
            RawAppState::Label(label) => label.clone(),
        }
    }
}
