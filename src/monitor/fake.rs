//! In-memory `DiagnosticsApi`, for tests.

use super::{DiagnosticSetting, DiagnosticsApi};
use failure::Fallible;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::{thread, time};

#[derive(Debug, Default)]
pub(crate) struct FakeApi {
    settings: Mutex<HashMap<String, DiagnosticSetting>>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    delay: Option<time::Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

fn key(resource_path: &str, name: &str) -> String {
    format!("{}|{}", resource_path.to_ascii_lowercase(), name.to_ascii_lowercase())
}

/// Tracks concurrent calls for the lifetime of a request.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> Drop for InFlight<'a> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make every call sleep, to exercise concurrency.
    pub(crate) fn with_delay(delay: time::Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub(crate) fn insert(&self, resource_path: &str, setting: DiagnosticSetting) {
        let mut settings = self.settings.lock().unwrap();
        settings.insert(key(resource_path, &setting.name), setting);
    }

    pub(crate) fn get(&self, resource_path: &str, name: &str) -> Option<DiagnosticSetting> {
        let settings = self.settings.lock().unwrap();
        settings.get(&key(resource_path, name)).cloned()
    }

    /// Fail every call on this resource path.
    pub(crate) fn fail_on(&self, resource_path: &str) {
        let mut failing = self.failing.lock().unwrap();
        failing.insert(resource_path.to_ascii_lowercase());
    }

    /// Recorded calls, as `"<VERB> <path>"`.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self, verb: &str, resource_path: &str) -> Fallible<InFlight> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);

        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}", verb, resource_path));
        if let Some(d) = self.delay {
            thread::sleep(d);
        }

        let failing = self.failing.lock().unwrap();
        if failing.contains(&resource_path.to_ascii_lowercase()) {
            bail!("503 Service Unavailable: injected failure");
        }
        Ok(guard)
    }
}

impl DiagnosticsApi for FakeApi {
    fn fetch(&self, resource_path: &str, name: &str) -> Fallible<Option<DiagnosticSetting>> {
        let _guard = self.enter("GET", resource_path)?;
        Ok(self.get(resource_path, name))
    }

    fn create(&self, resource_path: &str, setting: &DiagnosticSetting) -> Fallible<()> {
        let _guard = self.enter("PUT", resource_path)?;
        self.insert(resource_path, setting.clone());
        Ok(())
    }

    fn delete(&self, resource_path: &str, name: &str) -> Fallible<()> {
        let _guard = self.enter("DELETE", resource_path)?;
        let mut settings = self.settings.lock().unwrap();
        settings.remove(&key(resource_path, name));
        Ok(())
    }
}
