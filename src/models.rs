//! Data structures exchanged with the monitoring API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type ServiceId = u64;

/// A monitored web endpoint as the server knows it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MonitoredService {
    pub id: ServiceId,
    #[serde(rename = "webservice_name")]
    pub name: String,
    #[serde(rename = "webservice_url")]
    pub url: String,
    pub is_active: bool,
    #[serde(rename = "email_alert")]
    pub alerts_enabled: bool,
    /// Minutes between checks
    #[serde(rename = "monitor_interval")]
    pub check_interval: u32,
    #[serde(rename = "expect_status_code")]
    pub expected_status_code: u16,
}

/// The mutable fields of a service, as sent to the add and update endpoints.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ServiceDraft {
    #[serde(rename = "webservice_name")]
    pub name: String,
    #[serde(rename = "webservice_url")]
    pub url: String,
    pub is_active: bool,
    #[serde(rename = "email_alert")]
    pub alerts_enabled: bool,
    #[serde(rename = "monitor_interval")]
    pub check_interval: u32,
    #[serde(rename = "expect_status_code")]
    pub expected_status_code: u16,
}

impl ServiceDraft {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            is_active: true,
            alerts_enabled: true,
            check_interval: 10,
            expected_status_code: 200,
        }
    }

    pub fn with_check_interval(mut self, minutes: u32) -> Self {
        self.check_interval = minutes;
        self
    }

    pub fn with_expected_status(mut self, code: u16) -> Self {
        self.expected_status_code = code;
        self
    }

    pub fn with_alerts(mut self, enabled: bool) -> Self {
        self.alerts_enabled = enabled;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }
}

impl From<&MonitoredService> for ServiceDraft {
    fn from(service: &MonitoredService) -> Self {
        Self {
            name: service.name.clone(),
            url: service.url.clone(),
            is_active: service.is_active,
            alerts_enabled: service.alerts_enabled,
            check_interval: service.check_interval,
            expected_status_code: service.expected_status_code,
        }
    }
}

/// One observed health check. Arrival order carries no meaning; `timestamp` does.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StatusRecord {
    pub id: u64,
    #[serde(rename = "status")]
    pub up: bool,
    /// Milliseconds; meaningless when down
    #[serde(rename = "ping", default)]
    pub latency_ms: Option<u64>,
    pub status_code: u16,
    #[serde(rename = "date_and_time")]
    pub timestamp: DateTime<Utc>,
}

impl StatusRecord {
    pub fn latency_or_zero(&self) -> u64 {
        self.latency_ms.unwrap_or(0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub first_name: String,
    pub email: String,
    pub is_email_verified: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    #[serde(default)]
    pub success: bool,
    pub token: Option<TokenPair>,
    pub error: Option<Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefreshResponse {
    pub access: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct LogoutRequest<'a> {
    pub refresh_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserResponse {
    pub user: UserProfile,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServiceListResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub webservices: Vec<MonitoredService>,
    pub error: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServiceResponse {
    #[serde(default)]
    pub success: bool,
    pub webservice: Option<MonitoredService>,
    pub error: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AckResponse {
    #[serde(default)]
    pub success: bool,
    pub error: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryResponse {
    #[serde(default)]
    pub success: bool,
    pub webstatus: Option<Vec<StatusRecord>>,
    pub error: Option<Value>,
}

/// Flatten the server's `error` field into one line.
///
/// Validation failures arrive as `{"field": ["msg", ...]}`, everything else as
/// a plain string.
pub(crate) fn error_message(error: Option<&Value>, fallback: &str) -> String {
    match error {
        Some(Value::String(msg)) => msg.clone(),
        Some(Value::Object(fields)) => {
            let messages: Vec<String> = fields
                .values()
                .flat_map(|v| match v {
                    Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>(),
                    other => vec![value_text(other)],
                })
                .collect();
            if messages.is_empty() {
                fallback.to_string()
            } else {
                messages.join(", ")
            }
        }
        Some(Value::Array(items)) if !items.is_empty() => {
            items.iter().map(value_text).collect::<Vec<_>>().join(", ")
        }
        _ => fallback.to_string(),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_wire_format() {
        let service: MonitoredService = serde_json::from_value(json!({
            "id": 4,
            "webservice_name": "Homepage",
            "webservice_url": "https://example.com",
            "is_active": true,
            "email_alert": false,
            "monitor_interval": 10,
            "expect_status_code": 200,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(service.id, 4);
        assert_eq!(service.name, "Homepage");
        assert!(!service.alerts_enabled);
        assert_eq!(service.check_interval, 10);
    }

    #[test]
    fn test_status_record_missing_ping() {
        let record: StatusRecord = serde_json::from_value(json!({
            "id": 1,
            "status": false,
            "status_code": 503,
            "date_and_time": "2025-03-01T12:30:00+02:00"
        }))
        .unwrap();

        assert!(!record.up);
        assert_eq!(record.latency_ms, None);
        assert_eq!(record.latency_or_zero(), 0);
        assert_eq!(record.timestamp.to_rfc3339(), "2025-03-01T10:30:00+00:00");
    }

    #[test]
    fn test_draft_defaults() {
        let draft = ServiceDraft::new("API", "https://api.example.com");
        assert!(draft.is_active);
        assert!(draft.alerts_enabled);
        assert_eq!(draft.check_interval, 10);
        assert_eq!(draft.expected_status_code, 200);

        let body = serde_json::to_value(&draft.with_check_interval(15)).unwrap();
        assert_eq!(body["monitor_interval"], 15);
        assert_eq!(body["webservice_url"], "https://api.example.com");
    }

    #[test]
    fn test_error_message_flattening() {
        let errors = json!({"email": ["This field is required."], "password": ["Too short."]});
        let msg = error_message(Some(&errors), "failed");
        assert!(msg.contains("This field is required."));
        assert!(msg.contains("Too short."));

        assert_eq!(error_message(Some(&json!("nope")), "failed"), "nope");
        assert_eq!(error_message(None, "failed"), "failed");
    }
}
