//! Directory-level partition discovery.
//!
//! Missing directories list as empty: a dataset nobody has written yet is
//! "no data", not an error.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{Days, NaiveDate};

use crate::app::{FeedstashError, Result};

/// Suffix of shard files and dataset directories.
pub const DATA_SUFFIX: &str = ".parquet";

pub const DATE_KEY: &str = "date";

#[derive(Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Dir,
    File,
}

/// Sorted names of entries of one kind; empty when `dir` doesn't exist.
fn entry_names(dir: &Path, kind: EntryKind) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let matches = match kind {
            EntryKind::Dir => file_type.is_dir(),
            EntryKind::File => file_type.is_file(),
        };
        if matches {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

fn is_word(s: &str) -> bool {
    s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// `key=value` directory name with word characters on both sides.
pub fn is_partition_name(name: &str) -> bool {
    name.split_once('=')
        .is_some_and(|(key, value)| is_word(key) && is_word(value))
}

pub fn date_partition(date: NaiveDate) -> String {
    date.format("date=%Y%m%d").to_string()
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| FeedstashError::InvalidDate(s.to_string()))
}

/// Server directories under the storage root.
pub fn list_servers(root: &Path) -> Result<Vec<String>> {
    entry_names(root, EntryKind::Dir)
}

/// Dataset directories (`<feed>.parquet`) of one server.
pub fn list_datasets(server_dir: &Path) -> Result<Vec<String>> {
    Ok(entry_names(server_dir, EntryKind::Dir)?
        .into_iter()
        .filter(|name| name.ends_with(DATA_SUFFIX))
        .collect())
}

/// Every `key=value` partition directory of a dataset.
pub fn list_partition_dirs(dataset_dir: &Path) -> Result<Vec<String>> {
    Ok(entry_names(dataset_dir, EntryKind::Dir)?
        .into_iter()
        .filter(|name| is_partition_name(name))
        .collect())
}

/// Data files of the partitions keyed by `key`, relative to `root`.
///
/// With a filter, only partition values present in it are listed.
/// Values are visited in lexicographic order.
pub fn list_partitions(
    root: &Path,
    key: &str,
    values_filter: Option<&BTreeSet<String>>,
) -> Result<Vec<String>> {
    let prefix = format!("{key}=");
    let values: BTreeSet<String> = entry_names(root, EntryKind::Dir)?
        .into_iter()
        .filter_map(|name| name.strip_prefix(&prefix).map(str::to_string))
        .filter(|value| !value.is_empty())
        .filter(|value| values_filter.map_or(true, |wanted| wanted.contains(value)))
        .collect();

    let mut files = Vec::new();
    for value in values {
        let partition = format!("{prefix}{value}");
        for name in entry_names(&root.join(&partition), EntryKind::File)? {
            if name.ends_with(DATA_SUFFIX) {
                files.push(format!("{partition}/{name}"));
            }
        }
    }
    Ok(files)
}

/// Existing `date=YYYYMMDD` partitions from `start` to `end` inclusive.
///
/// An inverted range is empty.
pub fn list_partitions_by_date(root: &Path, start: NaiveDate, end: NaiveDate) -> Result<Vec<String>> {
    let found: BTreeSet<String> = list_partition_dirs(root)?.into_iter().collect();

    let mut partitions = Vec::new();
    let mut day = start;
    while day <= end {
        let name = date_partition(day);
        if found.contains(&name) {
            partitions.push(name);
        }
        day = match day.checked_add_days(Days::new(1)) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(partitions)
}
