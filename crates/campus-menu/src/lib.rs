// Feature-flag-driven navigation: a fixed master menu table and the
// order-preserving filter that intersects it with the fetched config.
use campus_common::DashboardConfig;
use campus_store::ConfigStore;
use serde::{Deserialize, Serialize};

/// The entry that stays visible while config is loading, so navigation
/// never renders fully empty during the gap.
pub const ROOT_ENTRY_ID: &str = "dashboard";

/// A navigation entry derived from the master table. Never persisted;
/// recomputed on every config change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub id: String,
    pub label: String,
    pub icon: String,
    // Groups carry no route of their own, only children do.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MenuEntry>,
}

impl MenuEntry {
    fn leaf(id: &str, label: &str, icon: &str, route: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            icon: icon.to_string(),
            route: Some(route.to_string()),
            children: Vec::new(),
        }
    }

    fn group(id: &str, label: &str, icon: &str, children: Vec<MenuEntry>) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            icon: icon.to_string(),
            route: None,
            children,
        }
    }

    pub fn is_group(&self) -> bool {
        !self.children.is_empty()
    }
}

/// The master menu table: a pure data constant, separate from the
/// filtering algorithm. Order here is the order users see.
pub fn master_menu() -> Vec<MenuEntry> {
    vec![
        MenuEntry::leaf("dashboard", "Dashboard", "home", "/dashboard"),
        MenuEntry::leaf("students", "Students", "graduation-cap", "/students"),
        MenuEntry::leaf("classes", "Class", "school", "/classes"),
        MenuEntry::leaf("subjects", "Subjects", "book-open", "/subjects"),
        MenuEntry::leaf("teachers", "Teachers", "users", "/teachers"),
        MenuEntry::group(
            "fees",
            "Fees",
            "dollar-sign",
            vec![
                MenuEntry::leaf("create-fees", "Create Fees", "plus", "/fees/create"),
                MenuEntry::leaf("fees-management", "Fees Management", "list", "/fees"),
            ],
        ),
    ]
}

/// Entries that are never feature-gated: profile and settings.
pub fn secondary_menu() -> Vec<MenuEntry> {
    vec![
        MenuEntry::leaf("profile", "Profile", "user", "/profile"),
        MenuEntry::leaf("settings", "Settings", "settings", "/settings"),
    ]
}

/// Intersect the master table with the enabled feature ids.
///
/// Master-table order wins, not config order. An entry survives iff its
/// own id is enabled; a group's children are not individually filtered,
/// group visibility is atomic. With no config (or no usable features) the
/// fallback is the always-visible root entry alone.
pub fn compute_menu(config: Option<&DashboardConfig>) -> Vec<MenuEntry> {
    let master = master_menu();
    let features = match config {
        Some(config) if !config.features.is_empty() => &config.features,
        // Not loaded yet, or nothing usable: show only the root entry.
        _ => {
            return master
                .into_iter()
                .filter(|entry| entry.id == ROOT_ENTRY_ID)
                .collect();
        }
    };
    master
        .into_iter()
        .filter(|entry| {
            features
                .iter()
                .any(|feature| feature.enabled && feature.id == entry.id)
        })
        .collect()
}

/// Whether a feature is on, answered from the last-cached config. Safe to
/// call in render paths: never triggers a fetch.
pub async fn is_enabled(store: &ConfigStore, feature_id: &str) -> bool {
    store.is_feature_enabled(feature_id).await
}

/// A flattened, searchable view of the navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchItem {
    pub id: String,
    pub name: String,
    pub route: String,
    pub category: String,
}

/// Flatten a computed menu (plus the secondary entries) into search rows.
/// Group children are listed under their group's label as category.
pub fn searchable_items(menu: &[MenuEntry]) -> Vec<SearchItem> {
    let mut items = Vec::new();
    for entry in menu {
        if entry.is_group() {
            for child in &entry.children {
                if let Some(route) = &child.route {
                    items.push(SearchItem {
                        id: child.id.clone(),
                        name: child.label.clone(),
                        route: route.clone(),
                        category: entry.label.clone(),
                    });
                }
            }
        } else if let Some(route) = &entry.route {
            items.push(SearchItem {
                id: entry.id.clone(),
                name: entry.label.clone(),
                route: route.clone(),
                category: "Main".to_string(),
            });
        }
    }
    for entry in secondary_menu() {
        if let Some(route) = entry.route {
            items.push(SearchItem {
                id: entry.id,
                name: entry.label,
                route,
                category: "Other".to_string(),
            });
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_common::Feature;

    fn config(features: &[(&str, bool)]) -> DashboardConfig {
        DashboardConfig {
            school_id: Some("S1".to_string()),
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

    #[test]
    fn fallback_menu_when_config_missing() {
        let menu = compute_menu(None);
        assert_eq!(menu.len(), 1);
        assert_eq!(menu[0].id, ROOT_ENTRY_ID);
    }

    #[test]
    fn fallback_menu_when_features_empty() {
        let menu = compute_menu(Some(&DashboardConfig {
            school_id: Some("S1".to_string()),
            features: Vec::new(),
        }));
        assert_eq!(menu.len(), 1);
        assert_eq!(menu[0].id, ROOT_ENTRY_ID);
    }

    #[test]
    fn filter_keeps_master_order() {
        // Config lists features out of order; the menu must not care.
        let config = config(&[("teachers", true), ("dashboard", true), ("students", true)]);
        let menu = compute_menu(Some(&config));
        let ids: Vec<&str> = menu.iter().map(|entry| entry.id.as_str()).collect();
        assert_eq!(ids, vec!["dashboard", "students", "teachers"]);
    }

    #[test]
    fn disabled_features_are_excluded() {
        let config = config(&[("dashboard", true), ("fees", false)]);
        let menu = compute_menu(Some(&config));
        assert!(menu.iter().all(|entry| entry.id != "fees"));
    }

    #[test]
    fn group_visibility_is_atomic() {
        let config = config(&[("dashboard", true), ("fees", true)]);
        let menu = compute_menu(Some(&config));
        let fees = menu
            .iter()
            .find(|entry| entry.id == "fees")
            .expect("fees group");
        assert!(fees.is_group());
        // Children ride along with the group, not with their own ids.
        assert_eq!(fees.children.len(), 2);
    }

    #[test]
    fn searchable_items_flatten_groups() {
        let config = config(&[("dashboard", true), ("fees", true)]);
        let items = searchable_items(&compute_menu(Some(&config)));
        let create = items
            .iter()
            .find(|item| item.id == "create-fees")
            .expect("create-fees");
        assert_eq!(create.category, "Fees");
        assert_eq!(create.route, "/fees/create");
        // Secondary entries always show up under "Other".
        assert!(items
            .iter()
            .any(|item| item.id == "settings" && item.category == "Other"));
    }

    #[tokio::test]
    async fn predicate_delegates_to_store() {
        use campus_store::{ConfigStore, MemoryStore};
        use std::sync::Arc;

        let store = ConfigStore::new(Arc::new(MemoryStore::new()));
        assert!(!is_enabled(&store, "dashboard").await);
        store.set_config(&config(&[("dashboard", true)])).await;
        assert!(is_enabled(&store, "dashboard").await);
    }
}
