//! diaglog: diagnostic settings auditor for storage fleets.
//!
//! This binary reads a list of storage accounts and, for each of their
//! sub-services (blob, queue, table, file), checks whether a named
//! diagnostic setting exists and matches the desired configuration.
//! Depending on the run mode, missing settings are created or
//! matching ones removed; a status line is printed per account.
//!
//! It is made of a few layers:
//!  * `inventory` - delimited input list parsing.
//!  * `monitor` - blocking client to the diagnostic settings API.
//!  * `reconcile` - per sub-service decision logic, run on a bounded worker pool.
//!  * `report` - per-account status lines and run summary.

extern crate env_logger;
#[macro_use]
extern crate failure;
extern crate futures;
extern crate lazy_static;
#[macro_use]
extern crate log;
extern crate reqwest;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate serde_json;
extern crate structopt;
extern crate url_serde;
extern crate uuid;

mod cli;
mod config;
mod inventory;
mod monitor;
mod reconcile;
mod report;
mod resource;

use crate::cli::CliOptions;
use crate::config::RunConfig;
use crate::inventory::Inventory;
use crate::monitor::{ArmClient, Credential, DiagnosticsApi};
use crate::report::FleetReport;
use crate::resource::ServiceTarget;
use failure::{Fallible, ResultExt};
use std::sync::Arc;
use structopt::StructOpt;

/// Configuration directories, in increasing priority order.
static CONFIG_DIRS: [&str; 3] = [
    "/usr/lib/diaglog/config.d",
    "/run/diaglog/config.d",
    "/etc/diaglog/config.d",
];

fn main() -> Fallible<()> {
    let cli = CliOptions::from_args();
    let mut logger = env_logger::Builder::from_default_env();
    if cli.verbosity > 0 || std::env::var_os("RUST_LOG").is_none() {
        logger.filter_level(cli.log_level());
    }
    logger.try_init()?;
    info!("starting diaglog, mode '{}'", cli.mode);

    let cfg = RunConfig::read_config(&CONFIG_DIRS, &cli)?;
    let inventory = Inventory::read(&cli.input)?;
    info!(
        "inventory: {} account(s), {} rejected row(s)",
        inventory.accounts.len(),
        inventory.rejected.len()
    );

    // Pre-flight checks, before any remote change.
    let credential = Credential::acquire(&cfg.token_source, cfg.endpoint.as_str())
        .context("failed to acquire management API token")?;
    let client = ArmClient::new(
        cfg.endpoint.clone(),
        &cfg.api_version,
        cfg.timeout,
        credential,
    )?;
    if cfg.verify_login {
        let subs = client
            .verify_access()
            .context("management API access check failed")?;
        info!("access verified, {} subscription(s) visible", subs);
    }

    let targets = ServiceTarget::expand(&inventory.accounts, &cfg.services);
    let api: Arc<dyn DiagnosticsApi> = Arc::new(client);

    let mut sys = actix::System::new("diaglog");
    let reports = sys.block_on(reconcile::run_pool(
        api,
        targets,
        cfg.desired.clone(),
        cfg.options,
        cfg.concurrency,
    ))?;

    let fleet = FleetReport::new(
        cfg.options.mode,
        cfg.options.dry_run,
        &inventory.accounts,
        inventory.rejected,
        reports,
    );
    let stdout = std::io::stdout();
    fleet.write(cfg.output, &mut stdout.lock())?;

    if fleet.has_failures() {
        bail!(
            "{} sub-service operation(s) failed, {} input row(s) rejected",
            fleet.errors(),
            fleet.rejected.len()
        );
    }
    Ok(())
}
