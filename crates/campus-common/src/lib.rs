// Shared data types and the error taxonomy used across crates.
use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, ApiError>;

/// Error taxonomy for everything the backend or the transport can hand us.
///
/// `Unauthorized` is the only variant with a cross-cutting side effect: the
/// gateway tears the session down before returning it, so callers must not
/// catch-and-retry it. Everything else is handled per call site.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("dashboard config fetch failed: {message}")]
    ConfigFetch {
        // None when the request never reached the server.
        status: Option<u16>,
        message: String,
    },
    #[error("HTTP error, status {status}: {message}")]
    Http { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("validation error: {0}")]
    Validation(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// HTTP status carried by the error, when one exists.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized => Some(401),
            ApiError::ConfigFetch { status, .. } => *status,
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// One per-school feature toggle as the backend reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
}

/// Per-school dashboard configuration fetched after login.
///
/// A malformed or missing `features` field deserializes as an empty list
/// rather than failing the whole config: client-side storage is never
/// authoritative and a partial config is still usable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_features")]
    pub features: Vec<Feature>,
}

impl DashboardConfig {
    /// Stored `enabled` flag for a feature id; absent means disabled.
    pub fn feature_enabled(&self, feature_id: &str) -> bool {
        self.features
            .iter()
            .find(|feature| feature.id == feature_id)
            .map(|feature| feature.enabled)
            .unwrap_or(false)
    }

    pub fn enabled_features(&self) -> Vec<Feature> {
        self.features
            .iter()
            .filter(|feature| feature.enabled)
            .cloned()
            .collect()
    }
}

// Accept anything in the `features` slot; keep the entries that parse and
// drop the rest. A non-array value yields no features at all.
fn lenient_features<'de, D>(deserializer: D) -> std::result::Result<Vec<Feature>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let Some(items) = value.as_array() else {
        return Ok(Vec::new());
    };
    Ok(items
        .iter()
        .filter_map(|item| serde_json::from_value(item.clone()).ok())
        .collect())
}

/// Cached user profile. Best effort only: always safe to re-fetch, may be
/// stale, and never consulted for authorization decisions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
    // Free-form profile fields the backend may add over time.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Payload of a successful `/auth/login-user` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
}

/// The backend's `{success, message, data}` response wrapper.
///
/// No `serde(default)` on the payload field: `Option` already reads a
/// missing field as `None`, and the attribute would force `T: Default`
/// onto every decode site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Human-readable failure message, preferring `message` over `error`.
    pub fn error_message(&self) -> Option<&str> {
        self.message.as_deref().or(self.error.as_deref())
    }

    /// Unwrap the payload of a successful envelope.
    pub fn into_data(self) -> Result<T> {
        if !self.success {
            let message = self
                .error_message()
                .unwrap_or("request was not successful")
                .to_string();
            return Err(ApiError::Http {
                status: 200,
                message,
            });
        }
        self.data.ok_or_else(|| ApiError::Http {
            status: 200,
            message: "response body missing data".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_variants() {
        let errors = vec![
            ApiError::Unauthorized,
            ApiError::Authentication("bad credentials".to_string()),
            ApiError::ConfigFetch {
                status: Some(500),
                message: "down".to_string(),
            },
            ApiError::Http {
                status: 404,
                message: "not found".to_string(),
            },
            ApiError::Network("offline".to_string()),
            ApiError::Validation("email required".to_string()),
        ];

        for error in errors {
            let rendered = error.to_string();
            assert!(!rendered.is_empty());
        }
    }

    #[test]
    fn error_status_reporting() {
        assert_eq!(ApiError::Unauthorized.status(), Some(401));
        assert_eq!(
            ApiError::Http {
                status: 503,
                message: "busy".into()
            }
            .status(),
            Some(503)
        );
        assert_eq!(ApiError::Network("offline".into()).status(), None);
    }

    #[test]
    fn config_feature_lookup() {
        let config: DashboardConfig = serde_json::from_value(serde_json::json!({
            "schoolId": "S1",
            "features": [
                {"id": "dashboard", "name": "Dashboard", "enabled": true},
                {"id": "fees", "name": "Fees", "enabled": false},
            ],
        }))
        .expect("parse");
        assert!(config.feature_enabled("dashboard"));
        assert!(!config.feature_enabled("fees"));
        // Absent feature ids read as disabled.
        assert!(!config.feature_enabled("students"));
        assert_eq!(config.enabled_features().len(), 1);
    }

    #[test]
    fn malformed_features_parse_as_empty() {
        let config: DashboardConfig =
            serde_json::from_value(serde_json::json!({"schoolId": "S1", "features": "oops"}))
                .expect("parse");
        assert!(config.features.is_empty());

        let config: DashboardConfig =
            serde_json::from_value(serde_json::json!({"schoolId": "S1"})).expect("parse");
        assert!(config.features.is_empty());

        // Entries that do not parse are dropped, the rest survive.
        let config: DashboardConfig = serde_json::from_value(serde_json::json!({
            "features": [{"id": "students", "enabled": true}, 42],
        }))
        .expect("parse");
        assert_eq!(config.features.len(), 1);
        assert!(config.feature_enabled("students"));
    }

    #[test]
    fn envelope_error_message_prefers_message() {
        let envelope: Envelope<serde_json::Value> = serde_json::from_value(serde_json::json!({
            "success": false,
            "message": "from message",
            "error": "from error",
        }))
        .expect("parse");
        assert_eq!(envelope.error_message(), Some("from message"));

        let envelope: Envelope<serde_json::Value> =
            serde_json::from_value(serde_json::json!({"success": false, "error": "from error"}))
                .expect("parse");
        assert_eq!(envelope.error_message(), Some("from error"));
    }

    #[test]
    fn envelope_into_data() {
        let envelope: Envelope<DashboardConfig> = serde_json::from_value(serde_json::json!({
            "success": true,
            "data": {"schoolId": "S1", "features": []},
        }))
        .expect("parse");
        let config = envelope.into_data().expect("data");
        assert_eq!(config.school_id.as_deref(), Some("S1"));

        let envelope: Envelope<DashboardConfig> =
            serde_json::from_value(serde_json::json!({"success": false, "message": "nope"}))
                .expect("parse");
        let err = envelope.into_data().expect_err("failure");
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn envelope_decodes_payloads_without_default() {
        // LoginData implements no Default; decoding must not require one,
        // and missing optional fields read as None.
        let envelope: Envelope<LoginData> = serde_json::from_value(serde_json::json!({
            "success": true,
            "data": {"accessToken": "T1"},
        }))
        .expect("parse");
        let data = envelope.into_data().expect("data");
        assert_eq!(data.access_token, "T1");
        assert!(data.refresh_token.is_none());
        assert!(data.user.is_none());

        let envelope: Envelope<LoginData> =
            serde_json::from_value(serde_json::json!({"success": false})).expect("parse");
        assert!(envelope.data.is_none());
        assert!(envelope.message.is_none());
    }

    #[test]
    fn user_profile_keeps_free_form_fields() {
        let profile: UserProfile = serde_json::from_value(serde_json::json!({
            "name": "A",
            "email": "a@b.com",
            "role": "admin",
            "schoolId": "S1",
            "phone": "555",
        }))
        .expect("parse");
        assert_eq!(profile.school_id.as_deref(), Some("S1"));
        assert_eq!(
            profile.extra.get("phone").and_then(|v| v.as_str()),
            Some("555")
        );
        let round_trip = serde_json::to_value(&profile).expect("serialize");
        assert_eq!(round_trip.get("phone").and_then(|v| v.as_str()), Some("555"));
    }
}
