/// Top-level configuration stanza.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ConfigSnippet {
    /// Management API client configuration.
    pub(crate) client: Option<ClientSnippet>,
    /// Fleet processing configuration.
    pub(crate) fleet: Option<FleetSnippet>,
    /// Desired diagnostic setting.
    pub(crate) setting: Option<SettingSnippet>,
}

/// Config snippet for the management API client.
#[derive(Debug, Deserialize)]
pub(crate) struct ClientSnippet {
    /// Base URL of the management API (default: public Azure cloud).
    pub(crate) endpoint: Option<String>,
    /// Diagnostic settings API version.
    pub(crate) api_version: Option<String>,
    /// Per-request timeout, in seconds.
    pub(crate) timeout_secs: Option<u64>,
    /// Token source, `env` or `azure-cli` (default: env).
    pub(crate) token_source: Option<String>,
    /// Environment variable holding the token, for the `env` source.
    pub(crate) token_env: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FleetSnippet {
    /// Maximum number of concurrent remote operations.
    pub(crate) concurrency: Option<usize>,
    /// Sub-services to process (default: all).
    pub(crate) services: Option<Vec<String>>,
}

/// Config snippet for the desired diagnostic setting.
#[derive(Debug, Deserialize)]
pub(crate) struct SettingSnippet {
    pub(crate) name: Option<String>,
    pub(crate) workspace_id: Option<String>,
    pub(crate) storage_account_id: Option<String>,
    pub(crate) event_hub_authorization_rule_id: Option<String>,
    pub(crate) event_hub_name: Option<String>,
    /// Log categories or category groups to enable.
    pub(crate) logs: Option<Vec<String>>,
    /// Metric categories to enable.
    pub(crate) metrics: Option<Vec<String>>,
}
