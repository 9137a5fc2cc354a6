use crate::management::player::Player;
use serde::{Deserialize, Serialize};

/// One metric as the panel reports it, e.g. `"CPU Usage"` or `"Active Users"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawMetric {
    #[serde(default = "not_a_number", with = "lenient_f64")]
    pub raw_value: f64,
    #[serde(default = "not_a_number", with = "lenient_f64")]
    pub max_value: f64,
    #[serde(default = "not_a_number", with = "lenient_f64")]
    pub percent: f64,
    #[serde(default)]
    pub units: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub color2: Option<String>,
    #[serde(default)]
    pub color3: Option<String>,
}

impl Default for RawMetric {
    fn default() -> Self {
        Self {
            raw_value: f64::NAN,
            max_value: f64::NAN,
            percent: f64::NAN,
            units: String::new(),
            color: None,
            color2: None,
            color3: None,
        }
    }
}

impl RawMetric {
    /// Raw value when it is a real number, the percentage otherwise.
    pub fn sample_value(&self) -> Option<f64> {
        if self.raw_value.is_finite() {
            Some(self.raw_value)
        } else if self.percent.is_finite() {
            Some(self.percent)
        } else {
            None
        }
    }
}

fn not_a_number() -> f64 {
    f64::NAN
}

/// The panel is not consistent about numbers: strings, nulls and numbers all show up.
mod lenient_f64 {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
            Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
            _ => f64::NAN,
        })
    }
}

/// Display-ready metric stored in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanitizedMetric {
    pub raw_value: Option<f64>,
    pub max_value: Option<f64>,
    pub percent: Option<f64>,
    pub units: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color3: Option<String>,
    /// Online players, only filled on the active-user metric.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub players: Vec<Player>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl From<&RawMetric> for SanitizedMetric {
    fn from(raw: &RawMetric) -> Self {
        let finite = |v: f64| v.is_finite().then_some(v);
        Self {
            raw_value: finite(raw.raw_value),
            max_value: finite(raw.max_value),
            percent: finite(raw.percent),
            units: raw.units.clone(),
            color: raw.color.clone(),
            color2: raw.color2.clone(),
            color3: raw.color3.clone(),
            players: vec![],
            display: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_numbers() {
        let metric: RawMetric = serde_json::from_str(
            r#"{"RawValue": "12.5", "MaxValue": null, "Percent": 42, "Units": "%"}"#,
        )
        .unwrap();
        assert_eq!(metric.raw_value, 12.5);
        assert!(metric.max_value.is_nan());
        assert_eq!(metric.percent, 42.0);
        assert_eq!(metric.units, "%");
    }

    #[test]
    fn test_sample_value_falls_back_to_percent() {
        let metric = RawMetric {
            raw_value: f64::NAN,
            percent: 42.0,
            ..Default::default()
        };
        assert_eq!(metric.sample_value(), Some(42.0));

        let empty = RawMetric::default();
        assert_eq!(empty.sample_value(), None);
    }

    #[test]
    fn test_sanitized_drops_nan() {
        let metric = RawMetric {
            raw_value: 3.0,
            ..Default::default()
        };
        let sanitized = SanitizedMetric::from(&metric);
        assert_eq!(sanitized.raw_value, Some(3.0));
        assert_eq!(sanitized.max_value, None);
    }
}
