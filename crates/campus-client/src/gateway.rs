// Single outbound-request path: bearer attachment, body serialization,
// response classification, and the 401 session-teardown side effect.
use crate::config::ClientConfig;
use campus_common::{ApiError, Envelope, Result};
use campus_store::{ConfigStore, CredentialStore};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;

/// Injected reaction to an unauthorized response. The gateway clears both
/// stores first, then invokes the hook, so the hook only has to navigate.
/// Bootstrap uses the suppressed request path instead of installing a
/// second policy here.
pub type UnauthorizedHook = Arc<dyn Fn() + Send + Sync>;

/// The API gateway. One of these per session, shared via `Arc`.
///
/// Performs no retries: retry policy belongs to callers. Unauthenticated
/// requests pass through without an Authorization header so public
/// endpoints (login) work before any token exists.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    credentials: CredentialStore,
    configs: ConfigStore,
    on_unauthorized: Option<UnauthorizedHook>,
}

impl ApiClient {
    pub fn new(
        config: &ClientConfig,
        credentials: CredentialStore,
        configs: ConfigStore,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| ApiError::Network(format!("build http client: {err}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            credentials,
            configs,
            on_unauthorized: None,
        })
    }

    /// Install the navigation reaction for unauthorized responses.
    pub fn with_unauthorized_hook(mut self, hook: UnauthorizedHook) -> Self {
        self.on_unauthorized = Some(hook);
        self
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn configs(&self) -> &ConfigStore {
        &self.configs
    }

    pub async fn request(&self, method: Method, endpoint: &str, body: Option<&Value>) -> Result<Value> {
        self.dispatch(method, endpoint, body, &[], false).await
    }

    /// Like `request`, but a 401 performs no teardown and fires no hook.
    /// Used where a 401 means something other than "session expired",
    /// e.g. the bootstrap's config fetch right after login.
    pub async fn request_suppressed(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        self.dispatch(method, endpoint, body, &[], true).await
    }

    pub async fn get(&self, endpoint: &str) -> Result<Value> {
        self.request(Method::GET, endpoint, None).await
    }

    pub async fn get_with_query(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Value> {
        self.dispatch(Method::GET, endpoint, None, query, false).await
    }

    pub async fn get_suppressed(&self, endpoint: &str) -> Result<Value> {
        self.request_suppressed(Method::GET, endpoint, None).await
    }

    pub async fn post(&self, endpoint: &str, body: &Value) -> Result<Value> {
        self.request(Method::POST, endpoint, Some(body)).await
    }

    pub async fn post_empty(&self, endpoint: &str) -> Result<Value> {
        self.request(Method::POST, endpoint, None).await
    }

    pub async fn put(&self, endpoint: &str, body: &Value) -> Result<Value> {
        self.request(Method::PUT, endpoint, Some(body)).await
    }

    pub async fn patch(&self, endpoint: &str, body: &Value) -> Result<Value> {
        self.request(Method::PATCH, endpoint, Some(body)).await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<Value> {
        self.request(Method::DELETE, endpoint, None).await
    }

    /// Multipart upload. No content type is set here so the transport
    /// layer picks the boundary itself.
    pub async fn post_multipart(
        &self,
        endpoint: &str,
        form: reqwest::multipart::Form,
    ) -> Result<Value> {
        let mut builder = self.http.post(self.resolve_url(endpoint));
        if let Some(token) = self.credentials.auth_token().await {
            builder = builder.bearer_auth(token);
        }
        let response = builder
            .multipart(form)
            .send()
            .await
            .map_err(|err| ApiError::Network(err.to_string()))?;
        self.classify(response, false).await
    }

    async fn dispatch(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
        query: &[(&str, &str)],
        suppress_unauthorized: bool,
    ) -> Result<Value> {
        let mut builder = self.http.request(method, self.resolve_url(endpoint));
        if let Some(token) = self.credentials.auth_token().await {
            builder = builder.bearer_auth(token);
        }
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            // reqwest sets the application/json content type here.
            builder = builder.json(body);
        }
        let response = builder
            .send()
            .await
            .map_err(|err| ApiError::Network(err.to_string()))?;
        self.classify(response, suppress_unauthorized).await
    }

    fn resolve_url(&self, endpoint: &str) -> String {
        // Absolute endpoints pass through untouched.
        if endpoint.starts_with("http") {
            return endpoint.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        if endpoint.starts_with('/') {
            format!("{base}{endpoint}")
        } else {
            format!("{base}/{endpoint}")
        }
    }

    async fn classify(&self, response: reqwest::Response, suppress_unauthorized: bool) -> Result<Value> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            if !suppress_unauthorized {
                tracing::warn!("unauthorized response, tearing down session");
                self.teardown().await;
                if let Some(hook) = &self.on_unauthorized {
                    hook();
                }
            }
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let code = status.as_u16();
            // Prefer the structured error body; fall back to a generic line.
            let message = response
                .json::<Envelope<Value>>()
                .await
                .ok()
                .and_then(|body| body.error_message().map(str::to_string))
                .unwrap_or_else(|| format!("HTTP error, status {code}"));
            return Err(ApiError::Http {
                status: code,
                message,
            });
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.contains("application/json"))
            .unwrap_or(false);
        if is_json {
            response
                .json()
                .await
                .map_err(|err| ApiError::Network(format!("decode response body: {err}")))
        } else {
            // Non-JSON success bodies come back as a plain string value.
            response
                .text()
                .await
                .map(Value::String)
                .map_err(|err| ApiError::Network(format!("read response body: {err}")))
        }
    }

    /// Global session teardown: credentials, cached profile, and config
    /// all go. Idempotent; also invoked by explicit logout.
    pub async fn teardown(&self) {
        self.credentials.clear_all().await;
        self.configs.clear_config().await;
    }
}
