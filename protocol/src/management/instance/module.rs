use serde::{Deserialize, Serialize};
use std::fmt;

/// Server software family of an instance, as named by the panel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModuleKind {
    Minecraft,
    #[default]
    Generic,
    Other(String),
}

impl ModuleKind {
    /// Deployment argument carrying the connection port.
    pub fn port_key(&self) -> Option<&'static str> {
        match self {
            ModuleKind::Minecraft => Some("MinecraftModule.Minecraft.PortNumber"),
            ModuleKind::Generic => Some("GenericModule.App.Ports"),
            ModuleKind::Other(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ModuleKind::Minecraft => "Minecraft",
            ModuleKind::Generic => "GenericModule",
            ModuleKind::Other(name) => name,
        }
    }
}

impl From<String> for ModuleKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Minecraft" => ModuleKind::Minecraft,
            "GenericModule" | "Generic" => ModuleKind::Generic,
            _ => ModuleKind::Other(value),
        }
    }
}

impl From<ModuleKind> for String {
    fn from(value: ModuleKind) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
