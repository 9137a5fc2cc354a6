use super::{Credentials, PanelProvider, PanelSession, ResourceSession, UpstreamError};
use super::SESSION_EXPIRED_SIGNATURE;
use ampcord_protocol::management::instance::{ModuleKind, RawInstance};
use ampcord_protocol::management::player::Player;
use ampcord_protocol::management::schedule::ScheduleTrigger;
use log::{debug, warn};
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// HTTP client for the AMP panel API.
#[derive(Clone)]
pub struct AmpProvider {
    http: reqwest::Client,
}

impl AmpProvider {
    pub fn new(timeout: Duration) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

#[derive(Clone)]
struct AmpApi {
    http: reqwest::Client,
    base: Url,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResult {
    #[serde(default)]
    success: bool,
    #[serde(rename = "sessionID", default)]
    session_id: String,
    #[serde(default)]
    result_reason: String,
}

impl AmpApi {
    fn new(http: reqwest::Client, uri: &str) -> Result<Self, UpstreamError> {
        let mut root = Url::parse(uri)?;
        if !root.path().ends_with('/') {
            let path = format!("{}/", root.path());
            root.set_path(&path);
        }
        Ok(Self {
            http,
            base: root.join("API/")?,
        })
    }

    fn scoped(&self, instance_id: Uuid) -> Result<Self, UpstreamError> {
        Ok(Self {
            http: self.http.clone(),
            base: self
                .base
                .join(&format!("ADSModule/Servers/{}/API/", instance_id))?,
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        session_id: Option<&str>,
        mut body: Value,
    ) -> Result<T, UpstreamError> {
        let url = self.base.join(method)?;
        if let (Some(sid), Some(obj)) = (session_id, body.as_object_mut()) {
            obj.insert("SESSIONID".into(), Value::String(sid.to_string()));
        }

        let resp = self
            .http
            .post(url)
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        let value: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };

        if let Some(title) = value.get("Title").and_then(Value::as_str) {
            let message = value
                .get("Message")
                .and_then(Value::as_str)
                .unwrap_or(title)
                .to_string();
            return Err(if title == SESSION_EXPIRED_SIGNATURE {
                UpstreamError::SessionExpired(message)
            } else {
                UpstreamError::Api {
                    status: status.as_u16(),
                    message,
                }
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(UpstreamError::SessionExpired(text));
        }
        if !status.is_success() {
            return Err(UpstreamError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        Ok(serde_json::from_value(unwrap_result(value))?)
    }

    async fn login(&self, credentials: &Credentials) -> Result<String, UpstreamError> {
        let result: LoginResult = self
            .call(
                "Core/Login",
                None,
                json!({
                    "username": credentials.username,
                    "password": credentials.password,
                    "token": "",
                    "rememberMe": false,
                }),
            )
            .await?;
        if !result.success || result.session_id.is_empty() {
            return Err(UpstreamError::Auth(if result.result_reason.is_empty() {
                format!("login as {} failed", credentials.username)
            } else {
                result.result_reason
            }));
        }
        Ok(result.session_id)
    }
}

/// Some calls wrap their payload in `{"result": ...}`.
fn unwrap_result(value: Value) -> Value {
    match value {
        Value::Object(mut obj) if obj.len() == 1 && obj.contains_key("result") => {
            obj.remove("result").unwrap_or(Value::Null)
        }
        other => other,
    }
}

#[async_trait::async_trait]
impl PanelProvider for AmpProvider {
    async fn login(
        &self,
        credentials: &Credentials,
    ) -> Result<Arc<dyn PanelSession>, UpstreamError> {
        let api = AmpApi::new(self.http.clone(), &credentials.uri)?;
        let session_id = api.login(credentials).await?;
        debug!("logged in to panel at {}", credentials.uri);
        Ok(Arc::new(AmpSession {
            api,
            credentials: credentials.clone(),
            session_id,
        }))
    }
}

struct AmpSession {
    api: AmpApi,
    credentials: Credentials,
    session_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AmpTarget {
    #[serde(default)]
    available_instances: Vec<Value>,
}

/// Decodes each listed instance on its own; unreadable records are skipped.
fn decode_instances(targets: Vec<AmpTarget>) -> Vec<RawInstance> {
    targets
        .into_iter()
        .flat_map(|t| t.available_instances)
        .filter_map(|record| {
            let id = record.get("InstanceID").cloned().unwrap_or(Value::Null);
            match serde_json::from_value::<RawInstance>(record) {
                Ok(raw) => Some(raw),
                Err(e) => {
                    warn!("skipping unreadable instance record {}: {}", id, e);
                    None
                }
            }
        })
        // the controller lists itself as an instance
        .filter(|i| i.module != ModuleKind::Other("ADS".into()))
        .collect()
}

#[async_trait::async_trait]
impl PanelSession for AmpSession {
    async fn probe(&self) -> Result<(), UpstreamError> {
        self.api
            .call::<Value>("Core/GetStatus", Some(&self.session_id), json!({}))
            .await
            .map(|_| ())
    }

    async fn list_instances(&self) -> Result<Vec<RawInstance>, UpstreamError> {
        let targets: Vec<AmpTarget> = self
            .api
            .call("ADSModule/GetInstances", Some(&self.session_id), json!({}))
            .await?;
        Ok(decode_instances(targets))
    }

    async fn login_to_resource(
        &self,
        instance_id: Uuid,
        module: &ModuleKind,
    ) -> Result<Arc<dyn ResourceSession>, UpstreamError> {
        let api = self.api.scoped(instance_id)?;
        let session_id = api.login(&self.credentials).await?;
        debug!("logged in to instance {} ({})", instance_id, module);
        Ok(Arc::new(AmpResourceSession { api, session_id }))
    }
}

struct AmpResourceSession {
    api: AmpApi,
    session_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AmpConfigNode {
    node: String,
    #[serde(default)]
    current_value: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AmpScheduleData {
    #[serde(default)]
    populated_triggers: Vec<AmpTrigger>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AmpTrigger {
    #[serde(default)]
    id: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    enabled_state: Value,
    #[serde(default)]
    match_months: Vec<u32>,
    #[serde(default)]
    match_days_of_month: Vec<u32>,
    #[serde(default)]
    match_days: Vec<u32>,
    #[serde(default)]
    match_hours: Vec<u32>,
    #[serde(default)]
    match_minutes: Vec<u32>,
    #[serde(default)]
    tasks: Vec<AmpTask>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AmpTask {
    #[serde(default)]
    task_method_name: String,
}

impl From<AmpTrigger> for ScheduleTrigger {
    fn from(t: AmpTrigger) -> Self {
        let enabled = match &t.enabled_state {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_i64() == Some(1),
            Value::String(s) => s.eq_ignore_ascii_case("enabled"),
            _ => true,
        };
        ScheduleTrigger {
            id: t.id,
            description: t.description,
            enabled,
            match_months: t.match_months,
            match_days: t.match_days_of_month,
            match_weekdays: t.match_days,
            match_hours: t.match_hours,
            match_minutes: t.match_minutes,
            tasks: t.tasks.into_iter().map(|t| t.task_method_name).collect(),
        }
    }
}

#[async_trait::async_trait]
impl ResourceSession for AmpResourceSession {
    async fn probe(&self) -> Result<(), UpstreamError> {
        self.api
            .call::<Value>("Core/GetStatus", Some(&self.session_id), json!({}))
            .await
            .map(|_| ())
    }

    async fn user_list(&self) -> Result<Vec<Player>, UpstreamError> {
        let users: HashMap<String, String> = self
            .api
            .call("Core/GetUserList", Some(&self.session_id), json!({}))
            .await?;
        let mut players: Vec<Player> = users
            .into_iter()
            .map(|(id, name)| Player { id, name })
            .collect();
        players.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(players)
    }

    async fn get_config(&self, keys: &[&str]) -> Result<HashMap<String, Value>, UpstreamError> {
        let nodes: Vec<AmpConfigNode> = self
            .api
            .call(
                "Core/GetConfigs",
                Some(&self.session_id),
                json!({ "nodes": keys }),
            )
            .await?;
        Ok(nodes
            .into_iter()
            .map(|n| (n.node, n.current_value))
            .collect())
    }

    async fn schedule_triggers(&self) -> Result<Vec<ScheduleTrigger>, UpstreamError> {
        let data: AmpScheduleData = self
            .api
            .call("Core/GetScheduleData", Some(&self.session_id), json!({}))
            .await?;
        Ok(data
            .populated_triggers
            .into_iter()
            .map(ScheduleTrigger::from)
            .collect())
    }
}
