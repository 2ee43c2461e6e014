use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, warn};

use crate::datetime::DateTimeContext;
use crate::login::{LoginTestRequest, LoginTestResult};
use crate::validation::{
    QueryValidationState, ValidationError, ValidationQuery, build_validation_payload,
};

pub const DEFAULT_VALIDATION_PATH: &str = "/api/search/validate";
pub const DEFAULT_LOGIN_TEST_PATH: &str = "/api/system/authentication/services/backends/test/login";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to build HTTP client: {source}")]
    Client {
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url:?} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url:?} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("failed to encode request for {path:?}: {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode response from {path:?}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Envelope the backend wraps test/validation results in.
///
/// A falsy `success` is a regular outcome for the caller to show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
}

/// Sends one JSON `POST` and hands back the decoded JSON body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, path: &str, body: JsonValue) -> Result<JsonValue, ApiError>;
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

/// Connection settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub base_url: String,
    pub credentials: Option<Credentials>,
    pub timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9000".to_string(),
            credentials: None,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl HttpTransport {
    pub fn new(settings: &HttpSettings) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        // The backend rejects state-changing requests without this header.
        headers.insert(
            "X-Requested-By",
            HeaderValue::from_static("lumberjack-console"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()
            .map_err(|source| ApiError::Client { source })?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            credentials: settings.credentials.clone(),
        })
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, path: &str, body: JsonValue) -> Result<JsonValue, ApiError> {
        let url = self.url_for(path);

        let mut req = self.client.post(&url).json(&body);
        if let Some(creds) = &self.credentials {
            req = req.basic_auth(&creds.username, creds.password.as_ref());
        }

        let resp = req.send().await.map_err(|source| ApiError::Transport {
            url: url.clone(),
            source,
        })?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(|source| ApiError::Transport {
            url: url.clone(),
            source,
        })?;

        if !status.is_success() {
            return Err(ApiError::Status {
                url,
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        if bytes.is_empty() {
            return Ok(JsonValue::Null);
        }

        serde_json::from_slice(&bytes).map_err(|source| ApiError::Decode {
            path: path.to_string(),
            source,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ApiPaths {
    pub validation: String,
    pub login_test: String,
}

impl Default for ApiPaths {
    fn default() -> Self {
        Self {
            validation: DEFAULT_VALIDATION_PATH.to_string(),
            login_test: DEFAULT_LOGIN_TEST_PATH.to_string(),
        }
    }
}

/// Calls made by the search bar and the authentication wizard.
///
/// Every call is a single request. Nothing is retried and concurrent calls
/// are not de-duplicated.
pub struct ConsoleClient<T> {
    transport: T,
    context: DateTimeContext,
    paths: ApiPaths,
}

impl<T: Transport> ConsoleClient<T> {
    pub fn new(transport: T, context: DateTimeContext) -> Self {
        Self {
            transport,
            context,
            paths: ApiPaths::default(),
        }
    }

    pub fn with_paths(mut self, paths: ApiPaths) -> Self {
        self.paths = paths;
        self
    }

    pub fn context(&self) -> &DateTimeContext {
        &self.context
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn validate_query(
        &self,
        query: &ValidationQuery,
    ) -> Result<ApiResponse<QueryValidationState>, ApiError> {
        let payload = build_validation_payload(query, &self.context)?;
        debug!(query = %payload.query, streams = payload.streams.len(), "validating query");

        let response: ApiResponse<QueryValidationState> =
            self.post(&self.paths.validation, &payload).await?;

        if !response.success {
            warn!(message = ?response.message, "query validation was not successful");
        }
        Ok(response)
    }

    pub async fn test_login(
        &self,
        request: &LoginTestRequest,
    ) -> Result<ApiResponse<LoginTestResult>, ApiError> {
        debug!(
            username = %request.user_login.username,
            backend_id = ?request.backend_id,
            "testing backend login"
        );

        let response: ApiResponse<LoginTestResult> =
            self.post(&self.paths.login_test, request).await?;

        if !response.success {
            warn!(message = ?response.message, "login test was not successful");
        }
        Ok(response)
    }

    /// An empty success body reads as an unsuccessful response.
    async fn post<B, R>(&self, path: &str, body: &B) -> Result<ApiResponse<R>, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = serde_json::to_value(body).map_err(|source| ApiError::Encode {
            path: path.to_string(),
            source,
        })?;

        let raw = self.transport.post_json(path, body).await?;
        if raw.is_null() {
            return Ok(ApiResponse {
                success: false,
                message: None,
                result: None,
            });
        }

        serde_json::from_value(raw).map_err(|source| ApiError::Decode {
            path: path.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_defaults_to_unsuccessful() {
        let response: ApiResponse<LoginTestResult> = serde_json::from_value(json!({})).unwrap();
        assert!(!response.success);
        assert_eq!(response.message, None);
        assert_eq!(response.result, None);
    }

    struct EmptyBody;

    #[async_trait]
    impl Transport for EmptyBody {
        async fn post_json(&self, _path: &str, _body: JsonValue) -> Result<JsonValue, ApiError> {
            Ok(JsonValue::Null)
        }
    }

    #[tokio::test]
    async fn empty_body_is_unsuccessful_not_an_error() {
        let client = ConsoleClient::new(EmptyBody, DateTimeContext::default());

        let verdict = client
            .validate_query(&ValidationQuery::default())
            .await
            .unwrap();
        assert!(!verdict.success);
        assert!(verdict.result.is_none());

        let login = client
            .test_login(&LoginTestRequest::new(json!({}), "jane", "secret"))
            .await
            .unwrap();
        assert!(!login.success);
        assert!(login.result.is_none());
    }

    #[test]
    fn url_join_ignores_duplicate_slashes() {
        let transport = HttpTransport::new(&HttpSettings {
            base_url: "http://localhost:9000/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            transport.url_for("/api/search/validate"),
            "http://localhost:9000/api/search/validate"
        );
        assert_eq!(
            transport.url_for("api/search/validate"),
            "http://localhost:9000/api/search/validate"
        );
    }
}
