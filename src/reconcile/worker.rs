//! Bounded pool of blocking reconcile workers.
//!
//! Workers run on a `SyncArbiter`, so at most `concurrency` remote
//! operations are in flight at the same time. Work items are queued
//! all at once and results are collected in input order.

use super::{reconcile_service, ReconcileOptions, ServiceReport};
use crate::monitor::{DiagnosticSetting, DiagnosticsApi};
use crate::resource::ServiceTarget;
use actix::prelude::*;
use failure::{Error, Fallible};
use futures::future;
use futures::prelude::*;
use std::sync::Arc;

/// Reconcile worker, blocking implementation.
pub(crate) struct ReconcileWorker {
    api: Arc<dyn DiagnosticsApi>,
    desired: Arc<DiagnosticSetting>,
    options: ReconcileOptions,
}

impl Actor for ReconcileWorker {
    type Context = SyncContext<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        trace!("reconcile worker started");
    }
}

/// Worker request: reconcile one sub-service.
pub(crate) struct ReconcileService {
    pub(crate) target: ServiceTarget,
}

impl Message for ReconcileService {
    type Result = Fallible<ServiceReport>;
}

impl Handler<ReconcileService> for ReconcileWorker {
    type Result = Fallible<ServiceReport>;

    fn handle(&mut self, msg: ReconcileService, _ctx: &mut Self::Context) -> Self::Result {
        let report = reconcile_service(
            self.api.as_ref(),
            &msg.target,
            &self.desired,
            &self.options,
        );
        Ok(report)
    }
}

/// Reconcile all targets, with bounded concurrency.
///
/// This must be polled from within a running actix system.
pub(crate) fn run_pool(
    api: Arc<dyn DiagnosticsApi>,
    targets: Vec<ServiceTarget>,
    desired: DiagnosticSetting,
    options: ReconcileOptions,
    concurrency: usize,
) -> impl Future<Item = Vec<ServiceReport>, Error = Error> {
    future::lazy(move || {
        let threads = concurrency.max(1).min(targets.len().max(1));
        debug!(
            "reconciling {} sub-service(s) with {} worker(s), mode '{}'",
            targets.len(),
            threads,
            options.mode
        );

        let desired = Arc::new(desired);
        let addr = actix::sync::SyncArbiter::start(threads, move || ReconcileWorker {
            api: Arc::clone(&api),
            desired: Arc::clone(&desired),
            options,
        });

        let requests: Vec<_> = targets
            .into_iter()
            .map(|target| addr.send(ReconcileService { target }).flatten())
            .collect();
        future::join_all(requests)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::fake::FakeApi;
    use crate::monitor::Destination;
    use crate::reconcile::{Mode, Status};
    use crate::resource::{StorageAccountId, StorageService};
    use std::time;

    fn targets(accounts: usize) -> Vec<ServiceTarget> {
        let mut out = vec![];
        for n in 0..accounts {
            let account = StorageAccountId::from_parts(
                "00000000-1111-2222-3333-444444444444",
                "rg",
                &format!("acct{}", n),
            )
            .unwrap();
            for service in StorageService::ALL.iter() {
                out.push(ServiceTarget {
                    account: account.clone(),
                    service: *service,
                });
            }
        }
        out
    }

    fn desired() -> DiagnosticSetting {
        let dest = Destination {
            workspace_id: Some("/subscriptions/x/ws".to_string()),
            ..Destination::default()
        };
        DiagnosticSetting::new("diaglog", dest, &["StorageRead".to_string()], &[])
    }

    #[test]
    fn pool_bounds_concurrency_and_keeps_order() {
        let fake = Arc::new(FakeApi::with_delay(time::Duration::from_millis(20)));
        let api: Arc<dyn DiagnosticsApi> = fake.clone();
        let items = targets(3);
        let options = ReconcileOptions {
            mode: Mode::Enable,
            ..ReconcileOptions::default()
        };

        let mut sys = actix::System::new("pool-test");
        let reports = sys
            .block_on(run_pool(api, items.clone(), desired(), options, 2))
            .unwrap();

        assert_eq!(reports.len(), items.len());
        for (report, target) in reports.iter().zip(items.iter()) {
            assert_eq!(&report.target, target);
            assert_eq!(report.status, Status::Created);
        }
        assert_eq!(fake.max_in_flight(), 2);
        assert_eq!(fake.calls().len(), items.len() * 2);
    }

    #[test]
    fn pool_isolates_failures() {
        let fake = Arc::new(FakeApi::new());
        let items = targets(2);
        fake.fail_on(&items[1].resource_path());
        let api: Arc<dyn DiagnosticsApi> = fake.clone();

        let mut sys = actix::System::new("pool-test");
        let reports = sys
            .block_on(run_pool(api, items, desired(), ReconcileOptions::default(), 10))
            .unwrap();

        let errors: Vec<_> = reports
            .iter()
            .filter(|r| r.status == Status::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].target.service, StorageService::Queue);
        assert_eq!(
            reports.iter().filter(|r| r.status == Status::Absent).count(),
            7
        );
    }

    #[test]
    fn pool_with_no_targets() {
        let api: Arc<dyn DiagnosticsApi> = Arc::new(FakeApi::new());
        let mut sys = actix::System::new("pool-test");
        let reports = sys
            .block_on(run_pool(api, vec![], desired(), ReconcileOptions::default(), 4))
            .unwrap();
        assert!(reports.is_empty());
    }
}
