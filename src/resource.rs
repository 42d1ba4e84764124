//! Storage resource identifiers.
//!
//! This module contains validated ARM identifiers for storage accounts,
//! and the sub-services (blob, queue, table, file) that carry their own
//! diagnostic settings.

use failure::{Fallible, ResultExt};
use std::{fmt, str};
use uuid::Uuid;

/// Resource provider segment for storage accounts.
static STORAGE_PROVIDER: &str = "Microsoft.Storage";
/// Resource type segment for storage accounts.
static STORAGE_ACCOUNTS: &str = "storageAccounts";

/// Validated ARM id of a storage account.
#[derive(Clone, Debug)]
pub(crate) struct StorageAccountId {
    id: String,
    subscription: Uuid,
    resource_group: String,
    name: String,
}

impl StorageAccountId {
    /// Parse a full ARM id.
    pub(crate) fn parse(input: &str) -> Fallible<Self> {
        let trimmed = input.trim().trim_end_matches('/');
        ensure!(
            trimmed.starts_with('/'),
            "resource id '{}' is not an absolute ARM path",
            input
        );

        let segments: Vec<&str> = trimmed[1..].split('/').collect();
        if segments.iter().any(|s| s.trim().is_empty()) {
            bail!("resource id '{}' contains empty segments", input);
        }
        if segments.len() != 8 {
            bail!(
                "resource id '{}' is not a storage account (expected 8 segments, got {})",
                input,
                segments.len()
            );
        }

        let expected = [
            (0, "subscriptions"),
            (2, "resourceGroups"),
            (4, "providers"),
            (5, STORAGE_PROVIDER),
            (6, STORAGE_ACCOUNTS),
        ];
        for (idx, literal) in expected.iter() {
            if !segments[*idx].eq_ignore_ascii_case(literal) {
                bail!(
                    "resource id '{}': expected '{}' at segment {}, found '{}'",
                    input,
                    literal,
                    idx + 1,
                    segments[*idx]
                );
            }
        }

        Self::from_parts(segments[1], segments[3], segments[7])
    }

    /// Build an id from its components.
    pub(crate) fn from_parts(subscription: &str, resource_group: &str, name: &str) -> Fallible<Self> {
        let subscription = subscription.trim();
        let resource_group = resource_group.trim();
        let name = name.trim();

        let sub_uuid = Uuid::parse_str(subscription)
            .context(format!("invalid subscription id '{}'", subscription))?;
        ensure!(!resource_group.is_empty(), "empty resource group");
        ensure!(!name.is_empty(), "empty storage account name");
        ensure!(
            !resource_group.contains('/') && !name.contains('/'),
            "resource group and account name must not contain '/'"
        );

        let id = format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}/{}",
            subscription, resource_group, STORAGE_PROVIDER, STORAGE_ACCOUNTS, name
        );
        Ok(Self {
            id,
            subscription: sub_uuid,
            resource_group: resource_group.to_string(),
            name: name.to_string(),
        })
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.id
    }

    pub(crate) fn subscription(&self) -> &Uuid {
        &self.subscription
    }

    pub(crate) fn resource_group(&self) -> &str {
        &self.resource_group
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Case-insensitive key, used for deduplication.
    pub(crate) fn key(&self) -> String {
        self.id.to_ascii_lowercase()
    }
}

impl PartialEq for StorageAccountId {
    fn eq(&self, other: &Self) -> bool {
        self.id.eq_ignore_ascii_case(&other.id)
    }
}

impl Eq for StorageAccountId {}

impl serde::Serialize for StorageAccountId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.id)
    }
}

impl fmt::Display for StorageAccountId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Storage sub-service with its own diagnostic settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum StorageService {
    Blob,
    Queue,
    Table,
    File,
}

impl StorageService {
    pub(crate) const ALL: [StorageService; 4] = [
        StorageService::Blob,
        StorageService::Queue,
        StorageService::Table,
        StorageService::File,
    ];

    pub(crate) fn label(self) -> &'static str {
        match self {
            StorageService::Blob => "blob",
            StorageService::Queue => "queue",
            StorageService::Table => "table",
            StorageService::File => "file",
        }
    }

    /// Path segment of the sub-service, relative to the account.
    fn path_segment(self) -> &'static str {
        match self {
            StorageService::Blob => "blobServices/default",
            StorageService::Queue => "queueServices/default",
            StorageService::Table => "tableServices/default",
            StorageService::File => "fileServices/default",
        }
    }
}

impl str::FromStr for StorageService {
    type Err = failure::Error;

    fn from_str(input: &str) -> Fallible<Self> {
        let service = match input.trim().to_ascii_lowercase().as_str() {
            "blob" => StorageService::Blob,
            "queue" => StorageService::Queue,
            "table" => StorageService::Table,
            "file" => StorageService::File,
            x => bail!("unsupported storage service '{}'", x),
        };
        Ok(service)
    }
}

impl fmt::Display for StorageService {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single unit of work: one sub-service of one account.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct ServiceTarget {
    pub(crate) account: StorageAccountId,
    pub(crate) service: StorageService,
}

impl ServiceTarget {
    /// Work items for all selected sub-services of all accounts,
    /// account-major.
    pub(crate) fn expand(
        accounts: &[StorageAccountId],
        services: &[StorageService],
    ) -> Vec<ServiceTarget> {
        let mut targets = Vec::with_capacity(accounts.len() * services.len());
        for account in accounts {
            for service in services {
                targets.push(ServiceTarget {
                    account: account.clone(),
                    service: *service,
                });
            }
        }
        targets
    }

    /// Full resource path of the sub-service.
    pub(crate) fn resource_path(&self) -> String {
        format!("{}/{}", self.account.as_str(), self.service.path_segment())
    }
}
