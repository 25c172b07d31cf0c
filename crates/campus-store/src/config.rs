// Dashboard configuration persistence with clear-then-write replacement.
use crate::{keys, StoreBackend};
use campus_common::{DashboardConfig, Feature};
use std::sync::Arc;

/// Headline counts for the feature-management screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureStats {
    pub total: usize,
    pub enabled: usize,
}

/// Per-school dashboard config store.
///
/// Exactly one config is live per session. `set_config` always clears the
/// prior value before writing: a partial merge could leave feature entries
/// from a previous school visible after an account switch.
#[derive(Clone)]
pub struct ConfigStore {
    backend: Arc<dyn StoreBackend>,
}

impl ConfigStore {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    /// Atomically replace the stored config (clear, then write).
    pub async fn set_config(&self, config: &DashboardConfig) {
        self.backend.delete(keys::DASHBOARD_CONFIG).await;
        match serde_json::to_string(config) {
            Ok(serialized) => {
                self.backend
                    .put(keys::DASHBOARD_CONFIG, serialized, None)
                    .await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "serialize dashboard config failed");
            }
        }
    }

    /// Stored config, or None when never set or corrupted. A parse failure
    /// is absence, not an error the caller has to handle.
    pub async fn config(&self) -> Option<DashboardConfig> {
        let serialized = self.backend.get(keys::DASHBOARD_CONFIG).await?;
        match serde_json::from_str(&serialized) {
            Ok(config) => Some(config),
            Err(err) => {
                tracing::warn!(error = %err, "stored dashboard config corrupted");
                None
            }
        }
    }

    pub async fn clear_config(&self) {
        self.backend.delete(keys::DASHBOARD_CONFIG).await;
    }

    /// Feature predicate answered purely from the last-cached config: no
    /// network, no side effects. Unset config and absent ids are disabled.
    pub async fn is_feature_enabled(&self, feature_id: &str) -> bool {
        match self.config().await {
            Some(config) => config.feature_enabled(feature_id),
            None => false,
        }
    }

    pub async fn enabled_features(&self) -> Vec<Feature> {
        self.config()
            .await
            .map(|config| config.enabled_features())
            .unwrap_or_default()
    }

    pub async fn is_loaded(&self) -> bool {
        self.config().await.is_some()
    }

    /// Feature counts for the loaded config; zeros when none is loaded.
    pub async fn feature_stats(&self) -> FeatureStats {
        match self.config().await {
            Some(config) => FeatureStats {
                total: config.features.len(),
                enabled: config
                    .features
                    .iter()
                    .filter(|feature| feature.enabled)
                    .count(),
            },
            None => FeatureStats::default(),
        }
    }

    pub async fn school_id(&self) -> Option<String> {
        self.config().await.and_then(|config| config.school_id)
    }

    /// Rewrite just the school id, keeping the feature list. Creates a
    /// features-less config when none is loaded yet.
    pub async fn set_school_id(&self, school_id: &str) {
        let mut config = self.config().await.unwrap_or_default();
        config.school_id = Some(school_id.to_string());
        self.set_config(&config).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn store() -> ConfigStore {
        ConfigStore::new(Arc::new(MemoryStore::new()))
    }

    fn config(school_id: &str, features: &[(&str, bool)]) -> DashboardConfig {
        DashboardConfig {
            school_id: Some(school_id.to_string()),
            features: features
                .iter()
                .map(|(id, enabled)| Feature {
                    id: id.to_string(),
                    name: id.to_string(),
                    enabled: *enabled,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn replace_is_atomic() {
        // No field of config A may survive set_config(B).
        let configs = store();
        configs
            .set_config(&config("S1", &[("dashboard", true), ("fees", true)]))
            .await;
        assert!(configs.is_feature_enabled("fees").await);

        configs.set_config(&config("S2", &[("dashboard", true)])).await;
        let current = configs.config().await.expect("config");
        assert_eq!(current.school_id.as_deref(), Some("S2"));
        assert!(!configs.is_feature_enabled("fees").await);
    }

    #[tokio::test]
    async fn feature_predicate_scenarios() {
        let configs = store();
        // Unset config: everything disabled.
        assert!(!configs.is_feature_enabled("dashboard").await);

        configs
            .set_config(&config("S1", &[("dashboard", true), ("fees", false)]))
            .await;
        assert!(configs.is_feature_enabled("dashboard").await);
        assert!(!configs.is_feature_enabled("fees").await);
        // Absent id reads as disabled.
        assert!(!configs.is_feature_enabled("students").await);
    }

    #[tokio::test]
    async fn corrupted_config_reads_as_absent() {
        let backend = Arc::new(MemoryStore::new());
        let configs = ConfigStore::new(backend.clone());
        backend
            .put(keys::DASHBOARD_CONFIG, "{broken".to_string(), None)
            .await;
        assert!(configs.config().await.is_none());
        assert!(!configs.is_loaded().await);
        assert!(!configs.is_feature_enabled("dashboard").await);
    }

    #[tokio::test]
    async fn clear_config_is_idempotent() {
        let configs = store();
        configs.set_config(&config("S1", &[("dashboard", true)])).await;
        configs.clear_config().await;
        assert!(configs.config().await.is_none());
        configs.clear_config().await;
        assert!(configs.config().await.is_none());
    }

    #[tokio::test]
    async fn feature_stats_count_enabled() {
        let configs = store();
        assert_eq!(configs.feature_stats().await, FeatureStats::default());

        configs
            .set_config(&config(
                "S1",
                &[("dashboard", true), ("students", true), ("fees", false)],
            ))
            .await;
        let stats = configs.feature_stats().await;
        assert_eq!(stats.total, 3);
        assert_eq!(stats.enabled, 2);
    }

    #[tokio::test]
    async fn school_id_accessors() {
        let configs = store();
        assert!(configs.school_id().await.is_none());

        // No config yet: set_school_id creates a features-less one.
        configs.set_school_id("S1").await;
        assert_eq!(configs.school_id().await.as_deref(), Some("S1"));
        assert!(configs.enabled_features().await.is_empty());

        configs
            .set_config(&config("S1", &[("students", true)]))
            .await;
        configs.set_school_id("S2").await;
        // Feature list survives a school-id rewrite.
        assert_eq!(configs.school_id().await.as_deref(), Some("S2"));
        assert!(configs.is_feature_enabled("students").await);
    }
}
