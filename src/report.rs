//! Run report.
//!
//! Sub-service outcomes are grouped back per storage account, in
//! inventory order, and printed either as one status line per account
//! or as a single JSON document.

use crate::inventory::RejectedRow;
use crate::reconcile::{Mode, ServiceReport, Status};
use crate::resource::StorageAccountId;
use failure::Fallible;
use itertools::Itertools;
use std::collections::{BTreeMap, HashMap};
use std::{io, str};

/// Output rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Text
    }
}

impl str::FromStr for OutputFormat {
    type Err = failure::Error;

    fn from_str(input: &str) -> Fallible<Self> {
        let format = match input.trim().to_ascii_lowercase().as_str() {
            "text" => OutputFormat::Text,
            "json" => OutputFormat::Json,
            x => bail!("unsupported output format '{}'", x),
        };
        Ok(format)
    }
}

/// Outcomes for all sub-services of one account.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct AccountReport {
    pub(crate) account: StorageAccountId,
    pub(crate) services: Vec<ServiceReport>,
}

impl AccountReport {
    /// Single status line, e.g. `acct (rg): blob=created queue=enabled`.
    pub(crate) fn status_line(&self) -> String {
        let statuses = self
            .services
            .iter()
            .map(|s| format!("{}={}", s.target.service, s.status))
            .join(" ");
        format!(
            "{} ({}): {}",
            self.account.name(),
            self.account.resource_group(),
            statuses
        )
    }
}

/// Whole-run report.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct FleetReport {
    pub(crate) mode: Mode,
    pub(crate) dry_run: bool,
    pub(crate) accounts: Vec<AccountReport>,
    pub(crate) rejected: Vec<RejectedRow>,
    pub(crate) summary: BTreeMap<Status, usize>,
}

impl FleetReport {
    /// Group sub-service reports under their accounts.
    pub(crate) fn new(
        mode: Mode,
        dry_run: bool,
        accounts: &[StorageAccountId],
        rejected: Vec<RejectedRow>,
        reports: Vec<ServiceReport>,
    ) -> Self {
        let mut summary = BTreeMap::new();
        let mut by_account: HashMap<String, Vec<ServiceReport>> = HashMap::new();
        for report in reports {
            *summary.entry(report.status).or_insert(0) += 1;
            by_account
                .entry(report.target.account.key())
                .or_insert_with(Vec::new)
                .push(report);
        }

        let accounts = accounts
            .iter()
            .map(|account| AccountReport {
                account: account.clone(),
                services: by_account.remove(&account.key()).unwrap_or_default(),
            })
            .collect();

        Self {
            mode,
            dry_run,
            accounts,
            rejected,
            summary,
        }
    }

    /// Number of failed sub-service operations.
    pub(crate) fn errors(&self) -> usize {
        self.summary.get(&Status::Error).cloned().unwrap_or(0)
    }

    /// Whether the run should exit with a failure.
    pub(crate) fn has_failures(&self) -> bool {
        self.errors() > 0 || !self.rejected.is_empty()
    }

    pub(crate) fn write<W: io::Write>(&self, format: OutputFormat, out: &mut W) -> Fallible<()> {
        match format {
            OutputFormat::Text => self.write_text(out)?,
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *out, self)?;
                writeln!(out)?;
            }
        }
        Ok(())
    }

    fn write_text<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        for account in &self.accounts {
            writeln!(out, "{}", account.status_line())?;
            for service in &account.services {
                if let Some(err) = &service.error {
                    writeln!(out, "    {}: {}", service.target.service, err)?;
                }
            }
        }
        for row in &self.rejected {
            writeln!(out, "line {}: rejected: {}", row.line, row.reason)?;
        }

        let services: usize = self.summary.values().sum();
        let counts = self
            .summary
            .iter()
            .map(|(status, count)| format!("{}={}", status, count))
            .join(" ");
        let dry = if self.dry_run { ", dry-run" } else { "" };
        write!(
            out,
            "summary ({}{}): {} account(s), {} sub-service(s)",
            self.mode,
            dry,
            self.accounts.len(),
            services
        )?;
        if !counts.is_empty() {
            write!(out, ": {}", counts)?;
        }
        if !self.rejected.is_empty() {
            write!(out, "; {} rejected row(s)", self.rejected.len())?;
        }
        writeln!(out)
    }
}
