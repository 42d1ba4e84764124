//! Configuration parsing and validation.
//!
//! This module contains three logical entities:
//!  * Snippets: single configuration files, holding a subset of configuration entries.
//!  * Inputs: configuration snippets merged with command-line overrides, but not yet validated.
//!  * RunConfig: validated configuration for a reconciliation run.

mod inputs;
mod snippets;

use crate::cli::CliOptions;
use crate::monitor::{Destination, DiagnosticSetting, TokenSource};
use crate::reconcile::{Mode, ReconcileOptions};
use crate::report::OutputFormat;
use crate::resource::StorageService;
use failure::{Fallible, ResultExt};
use std::time;

/// Default management API endpoint (public cloud).
static DEFAULT_ENDPOINT: &str = "https://management.azure.com/";
/// Default diagnostic settings API version.
static DEFAULT_API_VERSION: &str = "2021-05-01-preview";
/// Default per-request timeout, in seconds.
static DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default number of concurrent remote operations.
static DEFAULT_CONCURRENCY: usize = 10;
/// Upper bound on concurrent remote operations.
static MAX_CONCURRENCY: usize = 256;
/// Default name of the managed diagnostic setting.
static DEFAULT_SETTING_NAME: &str = "diaglog";
/// Default log categories for storage sub-services.
static DEFAULT_LOGS: &[&str] = &["StorageRead", "StorageWrite", "StorageDelete"];
/// Default metric categories for storage sub-services.
static DEFAULT_METRICS: &[&str] = &["Transaction"];

/// Runtime configuration for a run.
///
/// It holds validated configuration.
#[derive(Debug, Serialize)]
pub(crate) struct RunConfig {
    #[serde(with = "url_serde")]
    pub(crate) endpoint: reqwest::Url,
    pub(crate) api_version: String,
    pub(crate) timeout: time::Duration,
    pub(crate) token_source: TokenSource,
    pub(crate) concurrency: usize,
    pub(crate) services: Vec<StorageService>,
    pub(crate) desired: DiagnosticSetting,
    pub(crate) options: ReconcileOptions,
    pub(crate) output: OutputFormat,
    pub(crate) verify_login: bool,
}

impl RunConfig {
    pub(crate) fn read_config(dirs: &[&str], cli: &CliOptions) -> Fallible<Self> {
        let mut cfg = inputs::ConfigInput::read_configs(dirs, cli.config.as_ref().map(|p| p.as_path()))?;
        cfg.override_with(cli);

        let options = ReconcileOptions {
            mode: cli.mode,
            force: cli.force,
            dry_run: cli.dry_run,
        };
        let mut run = Self::try_from_input(cfg, options)?;
        run.output = cli.output;
        run.verify_login = !cli.skip_login_check;

        debug!(
            "runtime configuration:\n{}",
            serde_json::to_string_pretty(&run).unwrap_or_default()
        );
        Ok(run)
    }

    /// Validate inputs and return a valid run configuration.
    fn try_from_input(cfg: inputs::ConfigInput, options: ReconcileOptions) -> Fallible<Self> {
        let endpoint = parse_endpoint(&cfg.client.endpoint).context("invalid client endpoint")?;
        let api_version = if cfg.client.api_version.is_empty() {
            DEFAULT_API_VERSION.to_string()
        } else {
            cfg.client.api_version
        };
        let timeout_secs = cfg.client.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        ensure!(timeout_secs > 0, "client timeout must be positive");
        let token_source =
            TokenSource::try_from_config(&cfg.client.token_source, &cfg.client.token_env)?;

        let concurrency = cfg.fleet.concurrency.unwrap_or(DEFAULT_CONCURRENCY);
        ensure!(
            concurrency >= 1 && concurrency <= MAX_CONCURRENCY,
            "concurrency must be between 1 and {}, got {}",
            MAX_CONCURRENCY,
            concurrency
        );
        let services = parse_services(cfg.fleet.services)?;
        let desired = build_setting(cfg.setting, options.mode).context("invalid diagnostic setting")?;

        Ok(Self {
            endpoint,
            api_version,
            timeout: time::Duration::from_secs(timeout_secs),
            token_source,
            concurrency,
            services,
            desired,
            options,
            output: OutputFormat::default(),
            verify_login: true,
        })
    }
}

fn parse_endpoint(input: &str) -> Fallible<reqwest::Url> {
    let mut raw = if input.is_empty() {
        DEFAULT_ENDPOINT.to_string()
    } else {
        input.to_string()
    };
    // Relative joins need a trailing slash.
    if !raw.ends_with('/') {
        raw.push('/');
    }

    let url = reqwest::Url::parse(&raw)?;
    match url.scheme() {
        "https" | "http" => Ok(url),
        x => bail!("unsupported URL scheme '{}'", x),
    }
}

fn parse_services(input: Option<Vec<String>>) -> Fallible<Vec<StorageService>> {
    let names = match input {
        Some(n) => n,
        None => return Ok(StorageService::ALL.to_vec()),
    };

    let mut services = vec![];
    for name in names {
        let service = name.parse::<StorageService>()?;
        if !services.contains(&service) {
            services.push(service);
        }
    }
    ensure!(!services.is_empty(), "no storage services selected");
    Ok(services)
}

fn optional(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn build_setting(input: inputs::SettingInput, mode: Mode) -> Fallible<DiagnosticSetting> {
    let name = optional(input.name).unwrap_or_else(|| DEFAULT_SETTING_NAME.to_string());
    ensure!(
        name.len() <= 260,
        "setting name longer than 260 characters"
    );
    if let Some(c) = name.chars().find(|c| "/\\?#%&<>*:".contains(*c)) {
        bail!("setting name '{}' contains forbidden character '{}'", name, c);
    }

    let destination = Destination {
        workspace_id: optional(input.workspace_id),
        storage_account_id: optional(input.storage_account_id),
        event_hub_authorization_rule_id: optional(input.event_hub_authorization_rule_id),
        event_hub_name: optional(input.event_hub_name),
    };
    let resource_ids = [
        ("workspace id", &destination.workspace_id),
        ("storage account id", &destination.storage_account_id),
        ("event hub rule id", &destination.event_hub_authorization_rule_id),
    ];
    for (label, id) in resource_ids.iter() {
        if let Some(id) = id {
            ensure!(
                id.to_ascii_lowercase().starts_with("/subscriptions/"),
                "{} '{}' is not a resource id",
                label,
                id
            );
        }
    }
    ensure!(
        destination.event_hub_name.is_none() || destination.event_hub_authorization_rule_id.is_some(),
        "event hub name requires an event hub rule id"
    );

    let owned = |defaults: &[&str]| defaults.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    let logs = input.logs.unwrap_or_else(|| owned(DEFAULT_LOGS));
    let metrics = input.metrics.unwrap_or_else(|| owned(DEFAULT_METRICS));

    if mode == Mode::Enable {
        ensure!(
            !destination.is_empty(),
            "enable mode requires a destination (workspace, storage account or event hub)"
        );
        ensure!(
            !logs.is_empty() || !metrics.is_empty(),
            "enable mode requires at least one log or metric category"
        );
    }

    Ok(DiagnosticSetting::new(&name, destination, &logs, &metrics))
}
