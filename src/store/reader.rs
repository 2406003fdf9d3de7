//! Read path over committed partitions.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{Days, NaiveDate};

use crate::app::Result;
use crate::domain::FeedItem;
use crate::store::partition::list_partitions_by_date;
use crate::store::shard;
use crate::store::SHARD_FILE;

/// Items of the named partitions, newest first.
///
/// Partitions without a committed shard are skipped.
pub fn read_partitions(
    dataset_dir: &Path,
    partitions: &[String],
    limit: Option<usize>,
) -> Result<Vec<FeedItem>> {
    let mut items = Vec::new();
    for partition in partitions {
        let path = dataset_dir.join(partition).join(SHARD_FILE);
        if path.is_file() {
            items.extend(shard::read_items(&path)?);
        }
    }

    items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    if let Some(limit) = limit {
        items.truncate(limit);
    }
    Ok(items)
}

/// Items committed between `start` and `end` inclusive, newest first.
pub fn read_items(
    dataset_dir: &Path,
    start: NaiveDate,
    end: NaiveDate,
    limit: Option<usize>,
) -> Result<Vec<FeedItem>> {
    let partitions = list_partitions_by_date(dataset_dir, start, end)?;
    read_partitions(dataset_dir, &partitions, limit)
}

/// First day of a `days`-long window ending at `today`.
pub fn lookback_start(today: NaiveDate, days: u32) -> NaiveDate {
    let back = u64::from(days.max(1) - 1);
    today.checked_sub_days(Days::new(back)).unwrap_or(NaiveDate::MIN)
}

/// Distinct stored ids below `max_id`, highest first.
///
/// Only the last `lookback_days` day partitions up to `today` are
/// consulted. No partitions means no ids.
pub fn last_ids(
    dataset_dir: &Path,
    limit: usize,
    max_id: Option<i64>,
    today: NaiveDate,
    lookback_days: u32,
) -> Result<Vec<i64>> {
    let partitions = list_partitions_by_date(dataset_dir, lookback_start(today, lookback_days), today)?;

    let mut ids = BTreeSet::new();
    for partition in &partitions {
        let path = dataset_dir.join(partition).join(SHARD_FILE);
        if !path.is_file() {
            continue;
        }
        ids.extend(
            shard::read_ids(&path)?
                .into_iter()
                .filter(|id| max_id.map_or(true, |max| *id < max)),
        );
    }

    Ok(ids.into_iter().rev().take(limit).collect())
}
