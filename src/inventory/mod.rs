//! Resource inventory.
//!
//! This module reads the tabular list of storage accounts to process.
//! Input is a delimited text file (comma, semicolon, tab or pipe),
//! either with a header naming the relevant columns or with bare
//! resource ids in the first column.
//! Rows which cannot be turned into a valid account id are collected
//! instead of aborting the whole run.

mod sniff;

use crate::resource::StorageAccountId;
use failure::{Fallible, ResultExt};
use std::collections::HashSet;
use std::path::Path;

/// Header names (normalized) holding a full resource id.
static ID_COLUMNS: &[&str] = &["resourceid", "id", "storageaccountid"];
/// Header names (normalized) holding a subscription id.
static SUBSCRIPTION_COLUMNS: &[&str] = &["subscriptionid", "subscription"];
/// Header names (normalized) holding a resource group.
static GROUP_COLUMNS: &[&str] = &["resourcegroupname", "resourcegroup"];
/// Header names (normalized) holding an account name.
static NAME_COLUMNS: &[&str] = &["storageaccountname", "storageaccount", "accountname", "name"];

/// Valid accounts and rejected rows from an input list.
#[derive(Clone, Debug, Default)]
pub(crate) struct Inventory {
    /// Unique accounts, in input order.
    pub(crate) accounts: Vec<StorageAccountId>,
    /// Rows which could not be parsed.
    pub(crate) rejected: Vec<RejectedRow>,
}

/// Input row which failed validation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct RejectedRow {
    pub(crate) line: u64,
    pub(crate) reason: String,
}

/// How account ids are laid out in rows.
#[derive(Clone, Debug, PartialEq)]
enum Layout {
    /// Full id in a single column.
    IdColumn { column: usize, header: bool },
    /// Id assembled from subscription, group and name columns.
    Parts {
        subscription: usize,
        group: usize,
        name: usize,
    },
}

impl Inventory {
    /// Read and parse an inventory file.
    pub(crate) fn read<P: AsRef<Path>>(path: P) -> Fallible<Self> {
        use std::io::Read;
        let path = path.as_ref();
        trace!("reading inventory from {:?}", path);

        let fp = std::fs::File::open(path)
            .context(format!("failed to open inventory '{}'", path.display()))?;
        let mut bufrd = std::io::BufReader::new(fp);
        let mut content = String::new();
        bufrd
            .read_to_string(&mut content)
            .context("failed to read inventory content")?;

        let inventory =
            Self::parse(&content).context(format!("invalid inventory '{}'", path.display()))?;
        Ok(inventory)
    }

    /// Parse inventory content.
    pub(crate) fn parse(content: &str) -> Fallible<Self> {
        let content = content.trim_start_matches('\u{feff}');
        let delimiter = sniff::sniff_delimiter(content);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_reader(content.as_bytes());

        let mut rows = vec![];
        for record in reader.records() {
            let record = record.context("malformed delimited input")?;
            if record.iter().all(str::is_empty) {
                continue;
            }
            // Indented comments, which the reader only skips at column 0.
            if record.get(0).map(|f| f.starts_with('#')).unwrap_or(false) {
                continue;
            }
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            rows.push((line, record));
        }
        ensure!(!rows.is_empty(), "empty inventory");

        let layout = detect_layout(&rows[0].1)?;
        debug!(
            "inventory layout {:?}, delimiter {:?}",
            layout, delimiter as char
        );
        let skip = match layout {
            Layout::IdColumn { header, .. } => header,
            Layout::Parts { .. } => true,
        };

        let mut inventory = Inventory::default();
        let mut seen = HashSet::new();
        for (line, record) in rows.iter().skip(if skip { 1 } else { 0 }) {
            match account_from_row(&layout, record) {
                Ok(account) => {
                    if seen.insert(account.key()) {
                        trace!(
                            "inventory line {}: account '{}' in subscription {}",
                            line,
                            account.name(),
                            account.subscription()
                        );
                        inventory.accounts.push(account);
                    } else {
                        warn!("inventory line {}: duplicate account '{}', skipped", line, account);
                    }
                }
                Err(e) => {
                    warn!("inventory line {}: {}", line, e);
                    inventory.rejected.push(RejectedRow {
                        line: *line,
                        reason: e.to_string(),
                    });
                }
            }
        }
        ensure!(
            !inventory.accounts.is_empty() || !inventory.rejected.is_empty(),
            "empty inventory"
        );

        Ok(inventory)
    }
}

/// Lowercase a header name and drop separators.
fn normalize_header(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn find_column(headers: &[String], names: &[&str]) -> Option<usize> {
    // Honor the preference order of `names`, not the column order.
    names
        .iter()
        .filter_map(|n| headers.iter().position(|h| h == n))
        .next()
}

fn detect_layout(first: &csv::StringRecord) -> Fallible<Layout> {
    let headers: Vec<String> = first.iter().map(normalize_header).collect();

    if let Some(column) = find_column(&headers, ID_COLUMNS) {
        return Ok(Layout::IdColumn {
            column,
            header: true,
        });
    }

    let parts = (
        find_column(&headers, SUBSCRIPTION_COLUMNS),
        find_column(&headers, GROUP_COLUMNS),
        find_column(&headers, NAME_COLUMNS),
    );
    if let (Some(subscription), Some(group), Some(name)) = parts {
        return Ok(Layout::Parts {
            subscription,
            group,
            name,
        });
    }

    let leading = first.get(0).unwrap_or_default();
    if leading.to_ascii_lowercase().starts_with("/subscriptions/") {
        return Ok(Layout::IdColumn {
            column: 0,
            header: false,
        });
    }

    bail!(
        "unrecognized header '{}', expected a 'ResourceId' column or 'SubscriptionId', 'ResourceGroupName' and 'StorageAccountName' columns",
        first.iter().collect::<Vec<_>>().join(",")
    )
}

fn field<'a>(record: &'a csv::StringRecord, column: usize) -> Fallible<&'a str> {
    match record.get(column) {
        Some(f) if !f.is_empty() => Ok(f),
        _ => bail!("missing value in column {}", column + 1),
    }
}

fn account_from_row(layout: &Layout, record: &csv::StringRecord) -> Fallible<StorageAccountId> {
    match *layout {
        Layout::IdColumn { column, .. } => StorageAccountId::parse(field(record, column)?),
        Layout::Parts {
            subscription,
            group,
            name,
        } => StorageAccountId::from_parts(
            field(record, subscription)?,
            field(record, group)?,
            field(record, name)?,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static SUB: &str = "00000000-1111-2222-3333-444444444444";

    fn id(name: &str) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/{}",
            SUB, name
        )
    }

    #[test]
    fn headerless_ids() {
        let text = format!("{}\n\n# comment\n{}\n", id("one"), id("two"));
        let inv = Inventory::parse(&text).unwrap();
        let names: Vec<_> = inv.accounts.iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["one", "two"]);
        assert!(inv.rejected.is_empty());
    }

    #[test]
    fn resource_id_column_with_semicolons() {
        let text = format!(
            "\u{feff}Owner;Resource Id;Notes\nteam-a;{};\"x;y\"\nteam-b;{};\n",
            id("one"),
            id("two")
        );
        let inv = Inventory::parse(&text).unwrap();
        assert_eq!(inv.accounts.len(), 2);
        assert_eq!(inv.accounts[1].name(), "two");
    }

    #[test]
    fn parts_columns() {
        let text = format!(
            "SubscriptionId\tResourceGroupName\tStorageAccountName\n{}\trg-a\tacct1\n{}\trg-b\tacct2\n",
            SUB, SUB
        );
        let inv = Inventory::parse(&text).unwrap();
        assert_eq!(inv.accounts.len(), 2);
        assert_eq!(inv.accounts[0].resource_group(), "rg-a");
        assert_eq!(inv.accounts[1].name(), "acct2");
    }

    #[test]
    fn rejects_bad_rows_and_drops_duplicates() {
        let text = format!(
            "ResourceId\n{}\nnot-an-id\n{}\n\"\"\n",
            id("one"),
            id("ONE").to_uppercase()
        );
        let inv = Inventory::parse(&text).unwrap();
        assert_eq!(inv.accounts.len(), 1);
        assert_eq!(inv.rejected.len(), 1);
        assert_eq!(inv.rejected[0].line, 3);
    }

    #[test]
    fn unknown_header_is_an_error() {
        assert!(Inventory::parse("foo,bar\n1,2\n").is_err());
        assert!(Inventory::parse("\n# only comments\n").is_err());
    }

    #[test]
    fn header_without_rows_is_empty() {
        for text in &[
            "ResourceId\n",
            "SubscriptionId,ResourceGroupName,StorageAccountName\n",
            "ResourceId\n\n# nothing yet\n",
        ] {
            let err = Inventory::parse(text).unwrap_err();
            assert_eq!(err.to_string(), "empty inventory");
        }

        // Rejected rows alone are still reported.
        let inv = Inventory::parse("ResourceId\nnot-an-id\n").unwrap();
        assert!(inv.accounts.is_empty());
        assert_eq!(inv.rejected.len(), 1);
    }

    #[test]
    fn indented_comments_are_skipped() {
        let text = format!(
            "ResourceId\n  # disabled account\n{}\n\t# {}\n",
            id("one"),
            id("two")
        );
        let inv = Inventory::parse(&text).unwrap();
        assert_eq!(inv.accounts.len(), 1);
        assert_eq!(inv.accounts[0].name(), "one");
        assert!(inv.rejected.is_empty());
    }
}
