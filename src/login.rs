//! Login test against an authentication backend that is still being configured.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::api::ApiResponse;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLogin {
    pub username: String,
    pub password: String,
}

/// Body of the login-test call. `backend_configuration` is the unsaved
/// backend form, sent as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginTestRequest {
    pub backend_configuration: JsonValue,
    pub user_login: UserLogin,
    pub backend_id: Option<String>,
}

impl LoginTestRequest {
    pub fn new(
        backend_configuration: JsonValue,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            backend_configuration,
            user_login: UserLogin {
                username: username.into(),
                password: password.into(),
            },
            backend_id: None,
        }
    }

    pub fn with_backend_id(mut self, backend_id: impl Into<String>) -> Self {
        self.backend_id = Some(backend_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginTestResult {
    pub user_exists: bool,
    pub login_success: bool,
    pub user_details: Option<BTreeMap<String, JsonValue>>,
}

/// What the wizard shows while and after a login test runs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoginStatus {
    pub loading: bool,
    pub success: bool,
    pub message: Option<String>,
    pub result: Option<LoginTestResult>,
}

impl LoginStatus {
    pub fn started() -> Self {
        Self {
            loading: true,
            ..Default::default()
        }
    }

    /// An unsuccessful response is a normal outcome, not an error.
    pub fn finished(response: ApiResponse<LoginTestResult>) -> Self {
        Self {
            loading: false,
            success: response.success,
            message: response.message,
            result: response.result,
        }
    }

    pub fn summary_lines(&self) -> Vec<String> {
        let Some(result) = &self.result else {
            return Vec::new();
        };

        if !result.user_exists {
            return vec!["User does not exist".to_string()];
        }

        let mut lines = vec![if result.login_success {
            "Login was successful".to_string()
        } else {
            "Login failed".to_string()
        }];

        if let Some(details) = &result.user_details {
            lines.push("User attributes:".to_string());
            lines.extend(
                details
                    .iter()
                    .map(|(key, value)| format!("{key}: {}", display_value(value))),
            );
        }

        lines
    }
}

fn display_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => "null".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_wire_shape() {
        let request = LoginTestRequest::new(json!({ "title": "LDAP" }), "jane", "secret")
            .with_backend_id("backend-1");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "backend_configuration": { "title": "LDAP" },
                "user_login": { "username": "jane", "password": "secret" },
                "backend_id": "backend-1",
            })
        );
    }

    #[test]
    fn missing_user() {
        let status = LoginStatus::finished(ApiResponse {
            success: false,
            message: Some("not found".to_string()),
            result: Some(LoginTestResult::default()),
        });
        assert!(!status.loading);
        assert!(!status.success);
        assert_eq!(status.summary_lines(), vec!["User does not exist"]);
    }

    #[test]
    fn successful_login_lists_attributes() {
        let response: ApiResponse<LoginTestResult> = serde_json::from_value(json!({
            "success": true,
            "message": "ok",
            "result": {
                "user_exists": true,
                "login_success": true,
                "user_details": { "cn": "Jane", "uid": 1001 }
            }
        }))
        .unwrap();

        let status = LoginStatus::finished(response);
        assert!(status.success);
        assert_eq!(
            status.summary_lines(),
            vec!["Login was successful", "User attributes:", "cn: Jane", "uid: 1001"]
        );
    }

    #[test]
    fn failed_login_and_pending_state() {
        let status = LoginStatus::finished(ApiResponse {
            success: false,
            message: None,
            result: Some(LoginTestResult {
                user_exists: true,
                login_success: false,
                user_details: None,
            }),
        });
        assert_eq!(status.summary_lines(), vec!["Login failed"]);

        let pending = LoginStatus::started();
        assert!(pending.loading);
        assert!(pending.summary_lines().is_empty());
    }
}
