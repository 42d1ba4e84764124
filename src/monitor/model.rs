//! Diagnostic settings, in ARM wire format.

use lazy_static::lazy_static;
use std::collections::{BTreeSet, HashSet};

lazy_static! {
    /// Known log category groups (lowercase).
    static ref CATEGORY_GROUPS: HashSet<&'static str> = ["alllogs", "audit"].iter().cloned().collect();
}

/// A named diagnostic setting attached to a resource.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct DiagnosticSetting {
    #[serde(default)]
    pub(crate) name: String,
    pub(crate) properties: SettingProperties,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct SettingProperties {
    #[serde(flatten)]
    pub(crate) destination: Destination,
    #[serde(default)]
    pub(crate) logs: Vec<LogEntry>,
    #[serde(default)]
    pub(crate) metrics: Vec<MetricEntry>,
}

/// Where diagnostic data is shipped to.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Destination {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) workspace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) storage_account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) event_hub_authorization_rule_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) event_hub_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LogEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) category_group: Option<String>,
    pub(crate) enabled: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct MetricEntry {
    pub(crate) category: String,
    pub(crate) enabled: bool,
}

impl DiagnosticSetting {
    /// Build a setting enabling the given log and metric categories.
    ///
    /// Log names matching a known category group (e.g. `allLogs`) are
    /// emitted as groups rather than single categories.
    pub(crate) fn new(
        name: &str,
        destination: Destination,
        logs: &[String],
        metrics: &[String],
    ) -> Self {
        let logs = logs
            .iter()
            .map(|l| {
                if CATEGORY_GROUPS.contains(l.to_ascii_lowercase().as_str()) {
                    LogEntry {
                        category: None,
                        category_group: Some(l.clone()),
                        enabled: true,
                    }
                } else {
                    LogEntry {
                        category: Some(l.clone()),
                        category_group: None,
                        enabled: true,
                    }
                }
            })
            .collect();
        let metrics = metrics
            .iter()
            .map(|m| MetricEntry {
                category: m.clone(),
                enabled: true,
            })
            .collect();

        Self {
            name: name.to_string(),
            properties: SettingProperties {
                destination,
                logs,
                metrics,
            },
        }
    }

    /// Enabled log categories and groups, normalized for comparison.
    pub(crate) fn enabled_logs(&self) -> BTreeSet<String> {
        self.properties
            .logs
            .iter()
            .filter(|l| l.enabled)
            .filter_map(|l| match (&l.category, &l.category_group) {
                (Some(c), _) => Some(c.to_ascii_lowercase()),
                (None, Some(g)) => Some(format!("group:{}", g.to_ascii_lowercase())),
                (None, None) => None,
            })
            .collect()
    }

    /// Enabled metric categories, normalized for comparison.
    pub(crate) fn enabled_metrics(&self) -> BTreeSet<String> {
        self.properties
            .metrics
            .iter()
            .filter(|m| m.enabled)
            .map(|m| m.category.to_ascii_lowercase())
            .collect()
    }
}

impl Destination {
    /// Whether no sink at all is configured.
    pub(crate) fn is_empty(&self) -> bool {
        normalized(&self.workspace_id).is_none()
            && normalized(&self.storage_account_id).is_none()
            && normalized(&self.event_hub_authorization_rule_id).is_none()
            && normalized(&self.event_hub_name).is_none()
    }

    /// Compare sinks, ignoring case and trailing slashes on ids.
    pub(crate) fn equivalent(&self, other: &Destination) -> bool {
        normalized(&self.workspace_id) == normalized(&other.workspace_id)
            && normalized(&self.storage_account_id) == normalized(&other.storage_account_id)
            && normalized(&self.event_hub_authorization_rule_id)
                == normalized(&other.event_hub_authorization_rule_id)
            && normalized(&self.event_hub_name) == normalized(&other.event_hub_name)
    }
}

fn normalized(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|v| v.trim().trim_end_matches('/').to_ascii_lowercase())
        .filter(|v| !v.is_empty())
}
