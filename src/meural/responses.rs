use serde::Deserialize;
use serde_json::Value;

/// Ids arrive as JSON numbers or strings depending on the endpoint.
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Response from `POST authenticate`.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub token: Option<String>,
}

/// Envelope used by the cloud relay: `{"data": ...}`.
#[derive(Debug, Deserialize)]
pub struct DataResponse<T> {
    pub data: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: Value,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub frame_status: Option<FrameStatus>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameStatus {
    #[serde(default)]
    pub local_ip: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gallery {
    pub id: Value,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub item_ids: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct Item {
    pub id: Value,
}

/// Response from the device's local HTTP endpoints.
#[derive(Debug, Deserialize)]
pub struct LocalResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub response: Value,
}

impl LocalResponse {
    pub fn is_pass(&self) -> bool {
        self.status == "pass"
    }
}
