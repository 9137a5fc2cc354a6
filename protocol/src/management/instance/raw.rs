use super::{ModuleKind, RawAppState, RawMetric};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Instance record as listed by the panel's controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawInstance {
    #[serde(rename = "InstanceID")]
    pub instance_id: Uuid,
    #[serde(default)]
    pub instance_name: String,
    #[serde(default)]
    pub friendly_name: String,
    #[serde(default)]
    pub module: ModuleKind,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub suspended: bool,
    #[serde(default)]
    pub app_state: RawAppState,
    #[serde(default)]
    pub metrics: HashMap<String, RawMetric>,
    #[serde(default)]
    pub deployment_args: HashMap<String, String>,
    #[serde(default)]
    pub display_image_source: String,
    #[serde(default)]
    pub welcome_message: String,
    #[serde(default)]
    pub description: String,
}

impl RawInstance {
    pub fn new(instance_id: Uuid, friendly_name: impl Into<String>) -> Self {
        let friendly_name = friendly_name.into();
        Self {
            instance_id,
            instance_name: friendly_name.replace(' ', ""),
            friendly_name,
            module: ModuleKind::default(),
            running: false,
            suspended: false,
            app_state: RawAppState::default(),
            metrics: HashMap::new(),
            deployment_args: HashMap::new(),
            display_image_source: String::new(),
            welcome_message: String::new(),
            description: String::new(),
        }
    }

    /// Name used in logs; the friendly name when the panel has one.
    pub fn display_name(&self) -> &str {
        if self.friendly_name.is_empty() {
            &self.instance_name
        } else {
            &self.friendly_name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_deserialize_panel_record() {
        let json = r#"{
            "InstanceID": "0c2d5ec2-a1b3-4bd0-9d30-6a9c3a0f6a11",
            "InstanceName": "Survival01",
            "FriendlyName": "Survival",
            "Module": "Minecraft",
            "Running": true,
            "AppState": 20,
            "Metrics": {
                "CPU Usage": {"RawValue": 12, "MaxValue": 100, "Percent": 12, "Units": "%"}
            },
            "DeploymentArgs": {"MinecraftModule.Minecraft.PortNumber": "25565"},
            "DisplayImageSource": "internal:MinecraftJava",
            "WelcomeMessage": "All The Mods||https://example.com/atm"
        }"#;
        let raw: RawInstance = serde_json::from_str(json).unwrap();
        assert_eq!(raw.module, ModuleKind::Minecraft);
        assert_eq!(raw.app_state, RawAppState::Code(20));
        assert_eq!(raw.metrics["CPU Usage"].raw_value, 12.0);
        assert_eq!(raw.display_name(), "Survival");
        assert!(!raw.suspended);
        assert_eq!(raw.description, "");
    }
}
