// Session bootstrap: the login-to-ready sequence, including the config
// fetch that gates the dashboard and the rollback rules when it fails.
use crate::endpoints::Api;
use campus_common::{ApiError, LoginRequest};
use campus_store::{ConfigStore, CredentialStore};

const REMEMBER_ME_TTL_DAYS: u64 = 30;
const SESSION_TTL_DAYS: u64 = 7;

/// Where the login sequence currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    Idle,
    /// Credentials submitted, waiting on the auth service.
    Authenticating,
    /// Tokens stored, waiting on the dashboard config.
    ConfigFetching,
    /// Authenticated with a loaded config.
    Ready,
    Failed(LoginFailure),
}

/// Terminal failure classification for one login attempt. Each variant
/// implies a different stored-state outcome, see `LoginFlow::submit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginFailure {
    /// Rejected before any request was made.
    Validation(String),
    /// The auth service rejected the credentials.
    Authentication(String),
    /// The config service answered 401 for the fresh token. Credentials
    /// were rolled back; the user is logged out again.
    ConfigRejected(String),
    /// The config service was unreachable or errored. Credentials were
    /// kept so a later retry can skip re-authentication.
    ConfigUnavailable(String),
}

impl LoginFailure {
    pub fn message(&self) -> &str {
        match self {
            LoginFailure::Validation(message)
            | LoginFailure::Authentication(message)
            | LoginFailure::ConfigRejected(message)
            | LoginFailure::ConfigUnavailable(message) => message,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoginSubmission {
    pub email: String,
    pub password: String,
    /// Extends stored token TTLs from 7 to 30 days.
    pub remember_me: bool,
}

/// Drives one session through login, token persistence, and the config
/// fetch. Owns no transport state of its own; everything goes through the
/// injected `Api` and its stores.
pub struct LoginFlow {
    api: Api,
    credentials: CredentialStore,
    configs: ConfigStore,
    state: LoginState,
}

impl LoginFlow {
    pub fn new(api: Api) -> Self {
        let credentials = api.client().credentials().clone();
        let configs = api.client().configs().clone();
        Self {
            api,
            credentials,
            configs,
            state: LoginState::Idle,
        }
    }

    pub fn state(&self) -> &LoginState {
        &self.state
    }

    /// Run the full bootstrap sequence for one submission.
    ///
    /// Order matters: both tokens and the profile are stored before the
    /// config fetch starts, so a config failure can decide what to keep.
    /// A second submit while one is in progress is ignored.
    pub async fn submit(&mut self, submission: LoginSubmission) -> &LoginState {
        match self.state {
            LoginState::Authenticating | LoginState::ConfigFetching => {
                tracing::debug!("login already in progress, ignoring submit");
                return &self.state;
            }
            _ => {}
        }

        if submission.email.trim().is_empty() || submission.password.is_empty() {
            self.state = LoginState::Failed(LoginFailure::Validation(
                "email and password are required".to_string(),
            ));
            return &self.state;
        }

        // Defensive reset: a half-torn-down previous session must not
        // bleed into this one.
        self.credentials.clear_all().await;
        self.configs.clear_config().await;
        self.state = LoginState::Authenticating;

        let request = LoginRequest {
            email: submission.email.trim().to_string(),
            password: submission.password.clone(),
        };
        let login = match self.api.auth().login(&request).await {
            Ok(envelope) => match envelope.into_data() {
                Ok(data) => data,
                Err(err) => {
                    self.state =
                        LoginState::Failed(LoginFailure::Authentication(err.to_string()));
                    return &self.state;
                }
            },
            Err(err) => {
                let message = match &err {
                    ApiError::Unauthorized => "invalid email or password".to_string(),
                    ApiError::Http { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                self.state = LoginState::Failed(LoginFailure::Authentication(message));
                return &self.state;
            }
        };

        let days = if submission.remember_me {
            REMEMBER_ME_TTL_DAYS
        } else {
            SESSION_TTL_DAYS
        };
        self.credentials.set_auth_token(&login.access_token, days).await;
        if let Some(refresh_token) = &login.refresh_token {
            self.credentials.set_refresh_token(refresh_token, days).await;
        }
        if let Some(user) = &login.user {
            self.credentials.set_user(user, days).await;
        }
        tracing::info!(ttl_days = days, "credentials stored, fetching dashboard config");
        self.state = LoginState::ConfigFetching;

        // Suppressed fetch: a 401 here is this flow's to interpret, not
        // the gateway's global teardown.
        match self.api.dashboard().config_suppressed().await {
            Ok(envelope) => match envelope.into_data() {
                Ok(config) => {
                    self.configs.set_config(&config).await;
                    self.state = LoginState::Ready;
                }
                Err(err) => {
                    self.state = LoginState::Failed(LoginFailure::ConfigUnavailable(
                        err.to_string(),
                    ));
                }
            },
            Err(err) if err.status() == Some(401) => {
                // The config service does not trust the fresh token.
                // Roll the login back completely.
                tracing::warn!("dashboard config rejected the new session, rolling back");
                self.credentials.clear_all().await;
                self.configs.clear_config().await;
                self.state = LoginState::Failed(LoginFailure::ConfigRejected(
                    "session could not be established".to_string(),
                ));
            }
            Err(err) => {
                // Server error or network failure: keep the credentials
                // and let the user retry the config fetch.
                let failure = ApiError::ConfigFetch {
                    status: err.status(),
                    message: err.to_string(),
                };
                tracing::warn!(error = %failure, "dashboard config fetch failed");
                self.state = LoginState::Failed(LoginFailure::ConfigUnavailable(
                    "server error, please try again later".to_string(),
                ));
            }
        }
        &self.state
    }

    /// Retry just the config fetch after a `ConfigUnavailable` failure.
    /// Requires stored credentials; anything else restarts from submit.
    pub async fn retry_config(&mut self) -> &LoginState {
        if !self.credentials.is_authenticated().await {
            self.state = LoginState::Failed(LoginFailure::Validation(
                "no stored session to retry".to_string(),
            ));
            return &self.state;
        }
        self.state = LoginState::ConfigFetching;
        match self.api.dashboard().config_suppressed().await {
            Ok(envelope) => match envelope.into_data() {
                Ok(config) => {
                    self.configs.set_config(&config).await;
                    self.state = LoginState::Ready;
                }
                Err(err) => {
                    self.state = LoginState::Failed(LoginFailure::ConfigUnavailable(
                        err.to_string(),
                    ));
                }
            },
            Err(err) if err.status() == Some(401) => {
                self.credentials.clear_all().await;
                self.configs.clear_config().await;
                self.state = LoginState::Failed(LoginFailure::ConfigRejected(
                    "session could not be established".to_string(),
                ));
            }
            Err(err) => {
                let failure = ApiError::ConfigFetch {
                    status: err.status(),
                    message: err.to_string(),
                };
                self.state = LoginState::Failed(LoginFailure::ConfigUnavailable(
                    failure.to_string(),
                ));
            }
        }
        &self.state
    }

    /// Resume a previous session without re-authenticating: valid stored
    /// token plus a loaded config means the dashboard can mount directly.
    pub async fn resume(&mut self) -> &LoginState {
        if self.credentials.is_authenticated().await && self.configs.is_loaded().await {
            self.state = LoginState::Ready;
        } else {
            self.state = LoginState::Idle;
        }
        &self.state
    }

    /// Log out: best-effort server-side revocation, unconditional local
    /// teardown. A failed revocation call never blocks the teardown.
    pub async fn logout(&mut self) -> &LoginState {
        if let Err(err) = self.api.auth().logout().await {
            tracing::debug!(error = %err, "server-side logout failed, clearing locally");
        }
        self.credentials.clear_all().await;
        self.configs.clear_config().await;
        self.state = LoginState::Idle;
        &self.state
    }

    /// Drop any failure state without touching stored data.
    pub fn reset(&mut self) {
        self.state = LoginState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_access() {
        let failure = LoginFailure::ConfigUnavailable("server error".to_string());
        assert_eq!(failure.message(), "server error");
        assert_eq!(
            LoginFailure::Validation("email and password are required".to_string()).message(),
            "email and password are required"
        );
    }
}
