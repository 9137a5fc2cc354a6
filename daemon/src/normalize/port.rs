use ampcord_protocol::management::instance::ModuleKind;
use serde_json::Value;
use std::collections::HashMap;

/// Connection port from the module-specific deployment argument.
///
/// Minecraft stores a plain number; the generic module stores a JSON list of
/// port descriptors and the first usable one wins.
pub fn resolve_port(module: &ModuleKind, deployment_args: &HashMap<String, String>) -> Option<u16> {
    let raw = deployment_args.get(module.port_key()?)?.trim();
    match module {
        ModuleKind::Minecraft => raw.parse().ok(),
        ModuleKind::Generic => serde_json::from_str::<Vec<Value>>(raw)
            .ok()?
            .iter()
            .find_map(port_of),
        ModuleKind::Other(_) => None,
    }
}

fn port_of(entry: &Value) -> Option<u16> {
    let port = match entry {
        Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Value::String(s) => s.trim().parse().ok(),
        Value::Object(obj) => obj.get("Port").and_then(port_of),
        _ => None,
    };
    port.filter(|port| *port != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(key: &str, value: &str) -> HashMap<String, String> {
        HashMap::from([(key.to_string(), value.to_string())])
    }

    #[test]
    fn test_minecraft_port() {
        let port = args("MinecraftModule.Minecraft.PortNumber", "25565");
        assert_eq!(resolve_port(&ModuleKind::Minecraft, &port), Some(25565));
    }

    #[test]
    fn test_generic_port_list() {
        let ports = args(
            "GenericModule.App.Ports",
            r#"[{"Protocol": 1, "Port": 0}, {"Protocol": 1, "Port": 7777, "Name": "Game"}]"#,
        );
        assert_eq!(resolve_port(&ModuleKind::Generic, &ports), Some(7777));

        let ports = args("GenericModule.App.Ports", r#"[{"Name": "x"}, {"Port": "2456"}]"#);
        assert_eq!(resolve_port(&ModuleKind::Generic, &ports), Some(2456));
    }

    #[test]
    fn test_missing_or_bad_port() {
        assert_eq!(resolve_port(&ModuleKind::Minecraft, &HashMap::new()), None);
        let bad = args("MinecraftModule.Minecraft.PortNumber", "99999");
        assert_eq!(resolve_port(&ModuleKind::Minecraft, &bad), None);
        let bad = args("GenericModule.App.Ports", "not json");
        assert_eq!(resolve_port(&ModuleKind::Generic, &bad), None);
        let other = args("GenericModule.App.Ports", "[1]");
        assert_eq!(resolve_port(&ModuleKind::Other("ADS".into()), &other), None);
    }
}
