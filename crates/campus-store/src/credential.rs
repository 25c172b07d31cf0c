// Access/refresh token and cached-profile persistence.
use crate::{keys, ttl_days, StoreBackend};
use campus_common::UserProfile;
use std::sync::Arc;

/// Credential persistence over an injected backend.
///
/// The store performs no signature validation; authorization is enforced
/// server-side on every request. A token that has expired locally simply
/// reads back as absent, which downgrades the session to unauthenticated.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn StoreBackend>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    pub async fn set_auth_token(&self, token: &str, days: u64) {
        self.backend
            .put(keys::AUTH_TOKEN, token.to_string(), Some(ttl_days(days)))
            .await;
    }

    pub async fn auth_token(&self) -> Option<String> {
        self.backend.get(keys::AUTH_TOKEN).await
    }

    /// Erase the access token and the cached profile.
    ///
    /// Clearing the profile here keeps a previous user's identity from
    /// leaking into the next session. Idempotent.
    pub async fn clear_auth(&self) {
        self.backend.delete(keys::AUTH_TOKEN).await;
        self.backend.delete(keys::USER).await;
    }

    pub async fn set_refresh_token(&self, token: &str, days: u64) {
        self.backend
            .put(keys::REFRESH_TOKEN, token.to_string(), Some(ttl_days(days)))
            .await;
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.backend.get(keys::REFRESH_TOKEN).await
    }

    pub async fn clear_refresh_token(&self) {
        self.backend.delete(keys::REFRESH_TOKEN).await;
    }

    pub async fn set_user(&self, profile: &UserProfile, days: u64) {
        match serde_json::to_string(profile) {
            Ok(serialized) => {
                self.backend
                    .put(keys::USER, serialized, Some(ttl_days(days)))
                    .await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "serialize user profile failed");
            }
        }
    }

    /// Cached profile, best effort. Corrupted data reads as absent.
    pub async fn user(&self) -> Option<UserProfile> {
        let serialized = self.backend.get(keys::USER).await?;
        match serde_json::from_str(&serialized) {
            Ok(profile) => Some(profile),
            Err(err) => {
                tracing::warn!(error = %err, "cached user profile corrupted");
                None
            }
        }
    }

    /// True iff an unexpired access token is present. No other stored
    /// state matters: without a token the user is unauthenticated.
    pub async fn is_authenticated(&self) -> bool {
        self.auth_token().await.is_some()
    }

    /// Full credential teardown: token, refresh token, profile.
    pub async fn clear_all(&self) {
        self.clear_auth().await;
        self.clear_refresh_token().await;
    }
}
