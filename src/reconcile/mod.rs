//! Diagnostic settings reconciliation.
//!
//! Each work item is one sub-service of one storage account. Its
//! current setting is fetched and classified against the desired one,
//! then the run mode decides whether to create, replace, remove or
//! leave it alone:
//!
//! | mode    | absent | matching | foreign                |
//! |---------|--------|----------|------------------------|
//! | audit   | -      | -        | -                      |
//! | enable  | create | -        | replace (force) / skip |
//! | disable | -      | delete   | delete (force) / skip  |

mod worker;

pub(crate) use worker::run_pool;

use crate::monitor::{DiagnosticSetting, DiagnosticsApi};
use crate::resource::ServiceTarget;
use failure::Fallible;
use itertools::Itertools;
use std::{fmt, str};

/// What a run does with the settings it finds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Mode {
    /// Only report current state.
    Audit,
    /// Make sure the desired setting exists.
    Enable,
    /// Make sure the desired setting does not exist.
    Disable,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Audit
    }
}

impl str::FromStr for Mode {
    type Err = failure::Error;

    fn from_str(input: &str) -> Fallible<Self> {
        let mode = match input.trim().to_ascii_lowercase().as_str() {
            "audit" => Mode::Audit,
            "enable" => Mode::Enable,
            "disable" => Mode::Disable,
            x => bail!("unsupported mode '{}'", x),
        };
        Ok(mode)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            Mode::Audit => "audit",
            Mode::Enable => "enable",
            Mode::Disable => "disable",
        };
        f.write_str(label)
    }
}

/// Current state of the named setting on a sub-service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Observed {
    /// No setting with the desired name.
    Absent,
    /// Setting present and equivalent to the desired one.
    Matching,
    /// Setting present with the desired name, but different content.
    Foreign,
}

/// Change to apply to a sub-service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Action {
    None,
    Create,
    Replace,
    Delete,
    Skip,
}

impl Action {
    fn is_mutating(self) -> bool {
        match self {
            Action::Create | Action::Replace | Action::Delete => true,
            Action::None | Action::Skip => false,
        }
    }
}

/// Per-run reconciliation knobs.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub(crate) struct ReconcileOptions {
    pub(crate) mode: Mode,
    /// Overwrite or remove settings with a foreign configuration.
    pub(crate) force: bool,
    /// Plan actions without applying them.
    pub(crate) dry_run: bool,
}

/// Classify the current setting against the desired one.
///
/// A desired setting without any destination only cares about the
/// name, so any present setting counts as matching.
pub(crate) fn classify(desired: &DiagnosticSetting, actual: Option<&DiagnosticSetting>) -> Observed {
    let actual = match actual {
        Some(a) => a,
        None => return Observed::Absent,
    };

    if desired.properties.destination.is_empty() {
        return Observed::Matching;
    }

    let same_destination = desired
        .properties
        .destination
        .equivalent(&actual.properties.destination);
    let same_logs = desired.enabled_logs() == actual.enabled_logs();
    let same_metrics = desired.enabled_metrics() == actual.enabled_metrics();
    trace!(
        "setting '{}': destination={} logs={} metrics={}",
        actual.name,
        same_destination,
        same_logs,
        same_metrics
    );

    if same_destination && same_logs && same_metrics {
        Observed::Matching
    } else {
        Observed::Foreign
    }
}

/// Decide the action for a sub-service.
pub(crate) fn plan(mode: Mode, observed: Observed, force: bool) -> Action {
    match (mode, observed) {
        (Mode::Audit, _) => Action::None,
        (Mode::Enable, Observed::Absent) => Action::Create,
        (Mode::Enable, Observed::Matching) => Action::None,
        (Mode::Enable, Observed::Foreign) if force => Action::Replace,
        (Mode::Disable, Observed::Absent) => Action::None,
        (Mode::Disable, Observed::Matching) => Action::Delete,
        (Mode::Disable, Observed::Foreign) if force => Action::Delete,
        (_, Observed::Foreign) => Action::Skip,
    }
}

/// Status token printed for a sub-service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum Status {
    Absent,
    Enabled,
    Foreign,
    Created,
    Replaced,
    Removed,
    SkippedForeign,
    WouldCreate,
    WouldReplace,
    WouldRemove,
    Error,
}

impl Status {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Status::Absent => "absent",
            Status::Enabled => "enabled",
            Status::Foreign => "foreign",
            Status::Created => "created",
            Status::Replaced => "replaced",
            Status::Removed => "removed",
            Status::SkippedForeign => "skipped-foreign",
            Status::WouldCreate => "would-create",
            Status::WouldReplace => "would-replace",
            Status::WouldRemove => "would-remove",
            Status::Error => "error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of reconciling one sub-service.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct ServiceReport {
    #[serde(flatten)]
    pub(crate) target: ServiceTarget,
    pub(crate) observed: Option<Observed>,
    pub(crate) action: Action,
    pub(crate) applied: bool,
    pub(crate) status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

impl ServiceReport {
    fn new(target: ServiceTarget) -> Self {
        Self {
            target,
            observed: None,
            action: Action::None,
            applied: false,
            status: Status::Error,
            error: None,
        }
    }

    fn failed(mut self, err: &failure::Error) -> Self {
        let chain = err.iter_chain().map(|c| c.to_string()).join(": ");
        error!("{}: {}", self.target.resource_path(), chain);
        self.error = Some(chain);
        self.status = Status::Error;
        self
    }

    fn finish(mut self) -> Self {
        self.status = match (self.action, self.applied) {
            (Action::None, _) => match self.observed {
                Some(Observed::Absent) => Status::Absent,
                Some(Observed::Matching) => Status::Enabled,
                Some(Observed::Foreign) => Status::Foreign,
                None => Status::Error,
            },
            (Action::Skip, _) => Status::SkippedForeign,
            (Action::Create, true) => Status::Created,
            (Action::Create, false) => Status::WouldCreate,
            (Action::Replace, true) => Status::Replaced,
            (Action::Replace, false) => Status::WouldReplace,
            (Action::Delete, true) => Status::Removed,
            (Action::Delete, false) => Status::WouldRemove,
        };
        self
    }
}

/// Reconcile diagnostic settings for a single sub-service.
///
/// Remote failures are captured in the report, they never abort
/// the caller.
pub(crate) fn reconcile_service(
    api: &dyn DiagnosticsApi,
    target: &ServiceTarget,
    desired: &DiagnosticSetting,
    options: &ReconcileOptions,
) -> ServiceReport {
    let path = target.resource_path();
    let report = ServiceReport::new(target.clone());

    let actual = match api.fetch(&path, &desired.name) {
        Ok(a) => a,
        Err(e) => return report.failed(&e),
    };
    let observed = classify(desired, actual.as_ref());
    let action = plan(options.mode, observed, options.force);
    debug!(
        "{} {}: observed {:?}, action {:?}",
        target.account.name(),
        target.service,
        observed,
        action
    );

    let mut report = ServiceReport {
        observed: Some(observed),
        action,
        ..report
    };
    if action == Action::Skip {
        warn!(
            "{} {}: setting '{}' has a different configuration, skipped",
            target.account.name(),
            target.service,
            desired.name
        );
    }
    if options.dry_run || !action.is_mutating() {
        return report.finish();
    }

    let applied = match action {
        Action::Create | Action::Replace => api.create(&path, desired),
        Action::Delete => api.delete(&path, &desired.name),
        Action::None | Action::Skip => Ok(()),
    };
    match applied {
        Ok(()) => {
            info!(
                "{} {}: {:?} setting '{}'",
                target.account.name(),
                target.service,
                action,
                desired.name
            );
            report.applied = true;
            report.finish()
        }
        Err(e) => report.failed(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::fake::FakeApi;
    use crate::monitor::Destination;
    use crate::resource::{StorageAccountId, StorageService};

    fn desired() -> DiagnosticSetting {
        let dest = Destination {
            workspace_id: Some("/subscriptions/x/ws".to_string()),
            ..Destination::default()
        };
        DiagnosticSetting::new(
            "diaglog",
            dest,
            &["StorageRead".to_string(), "StorageWrite".to_string()],
            &["Transaction".to_string()],
        )
    }

    fn target() -> ServiceTarget {
        let account = StorageAccountId::from_parts(
            "00000000-1111-2222-3333-444444444444",
            "rg",
            "acct",
        )
        .unwrap();
        ServiceTarget {
            account,
            service: StorageService::Blob,
        }
    }

    fn options(mode: Mode) -> ReconcileOptions {
        ReconcileOptions {
            mode,
            ..ReconcileOptions::default()
        }
    }

    fn foreign() -> DiagnosticSetting {
        let mut other = desired();
        other.properties.destination.workspace_id = Some("/subscriptions/x/other".to_string());
        other
    }

    #[test]
    fn decision_table() {
        let cases = vec![
            (Mode::Audit, Observed::Absent, false, Action::None),
            (Mode::Audit, Observed::Matching, false, Action::None),
            (Mode::Audit, Observed::Foreign, true, Action::None),
            (Mode::Enable, Observed::Absent, false, Action::Create),
            (Mode::Enable, Observed::Matching, true, Action::None),
            (Mode::Enable, Observed::Foreign, false, Action::Skip),
            (Mode::Enable, Observed::Foreign, true, Action::Replace),
            (Mode::Disable, Observed::Absent, true, Action::None),
            (Mode::Disable, Observed::Matching, false, Action::Delete),
            (Mode::Disable, Observed::Foreign, false, Action::Skip),
            (Mode::Disable, Observed::Foreign, true, Action::Delete),
        ];
        for (mode, observed, force, expected) in cases {
            assert_eq!(plan(mode, observed, force), expected, "{} {:?}", mode, observed);
        }
    }

    #[test]
    fn classify_variants() {
        let want = desired();
        assert_eq!(classify(&want, None), Observed::Absent);
        assert_eq!(classify(&want, Some(&want)), Observed::Matching);
        assert_eq!(classify(&want, Some(&foreign())), Observed::Foreign);

        let mut fewer_logs = desired();
        fewer_logs.properties.logs[1].enabled = false;
        assert_eq!(classify(&want, Some(&fewer_logs)), Observed::Foreign);

        let mut shouting = desired();
        shouting.properties.logs[0].category = Some("STORAGEREAD".to_string());
        assert_eq!(classify(&want, Some(&shouting)), Observed::Matching);

        let name_only = DiagnosticSetting::new("diaglog", Destination::default(), &[], &[]);
        assert_eq!(classify(&name_only, Some(&foreign())), Observed::Matching);
    }

    #[test]
    fn enable_creates_missing_setting() {
        let api = FakeApi::new();
        let t = target();
        let report = reconcile_service(&api, &t, &desired(), &options(Mode::Enable));
        assert_eq!(report.status, Status::Created);
        assert!(report.applied);
        assert_eq!(api.get(&t.resource_path(), "diaglog"), Some(desired()));

        let again = reconcile_service(&api, &t, &desired(), &options(Mode::Enable));
        assert_eq!(again.status, Status::Enabled);
        assert_eq!(api.calls().len(), 3);
    }

    #[test]
    fn foreign_setting_is_left_alone_without_force() {
        let api = FakeApi::new();
        let t = target();
        api.insert(&t.resource_path(), foreign());

        let report = reconcile_service(&api, &t, &desired(), &options(Mode::Disable));
        assert_eq!(report.status, Status::SkippedForeign);
        assert!(api.get(&t.resource_path(), "diaglog").is_some());

        let forced = ReconcileOptions {
            force: true,
            ..options(Mode::Enable)
        };
        let report = reconcile_service(&api, &t, &desired(), &forced);
        assert_eq!(report.status, Status::Replaced);
        assert_eq!(api.get(&t.resource_path(), "diaglog"), Some(desired()));
    }

    #[test]
    fn disable_and_dry_run() {
        let api = FakeApi::new();
        let t = target();
        api.insert(&t.resource_path(), desired());

        let dry = ReconcileOptions {
            dry_run: true,
            ..options(Mode::Disable)
        };
        let report = reconcile_service(&api, &t, &desired(), &dry);
        assert_eq!(report.status, Status::WouldRemove);
        assert!(!report.applied);
        assert_eq!(api.calls(), vec![format!("GET {}", t.resource_path())]);

        let report = reconcile_service(&api, &t, &desired(), &options(Mode::Disable));
        assert_eq!(report.status, Status::Removed);
        assert!(api.get(&t.resource_path(), "diaglog").is_none());

        let report = reconcile_service(&api, &t, &desired(), &options(Mode::Disable));
        assert_eq!(report.status, Status::Absent);
    }

    #[test]
    fn remote_failures_are_reported() {
        let api = FakeApi::new();
        let t = target();
        api.fail_on(&t.resource_path());

        let report = reconcile_service(&api, &t, &desired(), &options(Mode::Audit));
        assert_eq!(report.status, Status::Error);
        assert!(report.observed.is_none());
        assert!(report.error.unwrap().contains("injected failure"));
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("Enable".parse::<Mode>().unwrap(), Mode::Enable);
        assert_eq!(" disable ".parse::<Mode>().unwrap(), Mode::Disable);
        assert!("toggle".parse::<Mode>().is_err());
    }
}
