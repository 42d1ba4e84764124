//! Command-line options.

use crate::reconcile::Mode;
use crate::report::OutputFormat;
use std::path::PathBuf;
use structopt::StructOpt;

/// Audit and toggle diagnostic settings on storage accounts.
#[derive(Debug, StructOpt)]
#[structopt(name = "diaglog")]
pub(crate) struct CliOptions {
    /// Verbosity level (higher is more verbose).
    #[structopt(short = "v", parse(from_occurrences))]
    pub(crate) verbosity: u8,

    /// Run mode: audit, enable or disable.
    #[structopt(short = "m", long = "mode", default_value = "audit")]
    pub(crate) mode: Mode,

    /// Replace or remove settings with a different configuration.
    #[structopt(long = "force")]
    pub(crate) force: bool,

    /// Report planned changes without applying them.
    #[structopt(long = "dry-run")]
    pub(crate) dry_run: bool,

    /// Maximum number of concurrent remote operations.
    #[structopt(short = "j", long = "concurrency")]
    pub(crate) concurrency: Option<usize>,

    /// Storage sub-service to process (blob, queue, table, file), repeatable.
    #[structopt(short = "s", long = "service", raw(number_of_values = "1"))]
    pub(crate) services: Vec<String>,

    /// Name of the diagnostic setting.
    #[structopt(long = "setting-name")]
    pub(crate) setting_name: Option<String>,

    /// Log Analytics workspace resource id.
    #[structopt(long = "workspace-id")]
    pub(crate) workspace_id: Option<String>,

    /// Archive storage account resource id.
    #[structopt(long = "storage-account-id")]
    pub(crate) storage_account_id: Option<String>,

    /// Event Hub authorization rule resource id.
    #[structopt(long = "event-hub-rule-id")]
    pub(crate) event_hub_rule_id: Option<String>,

    /// Event Hub name.
    #[structopt(long = "event-hub-name")]
    pub(crate) event_hub_name: Option<String>,

    /// Additional configuration file, applied last.
    #[structopt(short = "c", long = "config", parse(from_os_str))]
    pub(crate) config: Option<PathBuf>,

    /// Output format: text or json.
    #[structopt(short = "o", long = "output", default_value = "text")]
    pub(crate) output: OutputFormat,

    /// Do not check management API access before starting.
    #[structopt(long = "skip-login-check")]
    pub(crate) skip_login_check: bool,

    /// Resource list (delimited text, one storage account per row).
    #[structopt(name = "INPUT", parse(from_os_str))]
    pub(crate) input: PathBuf,
}

impl CliOptions {
    /// Log level for the given number of `-v` flags.
    pub(crate) fn log_level(&self) -> log::LevelFilter {
        match self.verbosity {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}
