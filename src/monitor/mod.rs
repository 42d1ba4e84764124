//! Diagnostic settings management.
//!
//! This module contains the `DiagnosticsApi` seam, which is the only
//! way the rest of the crate talks to the remote management service,
//! and `ArmClient`, its implementation over Azure Resource Manager.
//! Settings are keyed by a resource path and a setting name.

mod client;
mod credential;
mod model;

#[cfg(test)]
pub(crate) mod fake;

pub(crate) use client::ArmClient;
pub(crate) use credential::{Credential, TokenSource};
pub(crate) use model::{Destination, DiagnosticSetting};

use failure::Fallible;

/// Remote query/create/delete operations on named diagnostic settings.
pub(crate) trait DiagnosticsApi: Send + Sync {
    /// Fetch the named setting, if it exists.
    fn fetch(&self, resource_path: &str, name: &str) -> Fallible<Option<DiagnosticSetting>>;

    /// Create the setting, overwriting any setting with the same name.
    fn create(&self, resource_path: &str, setting: &DiagnosticSetting) -> Fallible<()>;

    /// Remove the named setting. Removing a missing setting is not an error.
    fn delete(&self, resource_path: &str, name: &str) -> Fallible<()>;
}
