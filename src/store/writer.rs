use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use fs4::fs_std::FileExt;
use tracing::{debug, info, warn};

use crate::app::{FeedstashError, Result};
use crate::domain::FeedItem;
use crate::sink::{ItemSink, SinkSummary};
use crate::store::reader::last_ids;
use crate::store::schema::to_record_batch;
use crate::store::shard::{self, StagedShard};
use crate::store::staging::StagingBuffer;
use crate::store::Dataset;

/// Ids already committed to disk when a session opened.
///
/// Seeded once and never written to afterwards; rows added during the
/// session live in the staging buffer instead.
#[derive(Debug, Default)]
pub struct CommittedIds {
    ids: HashSet<i64>,
}

impl CommittedIds {
    pub fn load(dataset_dir: &Path, today: NaiveDate, lookback_ids: usize, lookback_days: u32) -> Result<Self> {
        let ids = last_ids(dataset_dir, lookback_ids, None, today, lookback_days)?;
        Ok(Self {
            ids: ids.into_iter().collect(),
        })
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Advisory lock held while a session is open on a partition.
///
/// An exclusive `flock` on a lock file beside the partition. The OS drops it
/// when the holder exits, so a crashed writer never leaves the partition
/// locked. The file itself stays on disk and only records the last holder's
/// pid.
#[derive(Debug)]
struct PartitionLock {
    _file: File,
}

impl PartitionLock {
    fn acquire(path: PathBuf) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        if let Err(e) = FileExt::try_lock_exclusive(&file) {
            if e.kind() == ErrorKind::WouldBlock {
                return Err(FeedstashError::PartitionLocked(path.display().to_string()));
            }
            return Err(e.into());
        }
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        Ok(Self { _file: file })
    }
}

/// Persistent sink bound to one day partition of a dataset.
pub struct WriterSession {
    dataset: Dataset,
    date: NaiveDate,
    committed: CommittedIds,
    staging: StagingBuffer,
    lock: Option<PartitionLock>,
    closed: bool,
}

impl WriterSession {
    /// Open a session on `date`'s partition.
    ///
    /// Fails with `PartitionLocked` while another session holds the same
    /// partition.
    pub fn open(dataset: Dataset, date: NaiveDate, lookback_ids: usize, lookback_days: u32) -> Result<Self> {
        let dir = dataset.dir();
        fs::create_dir_all(&dir)?;
        let lock = PartitionLock::acquire(dataset.lock_path(date))?;

        let committed = CommittedIds::load(&dir, date, lookback_ids, lookback_days)?;
        debug!(
            "Opened {} for {} with {} committed ids",
            dataset.name(),
            date,
            committed.len()
        );

        Ok(Self {
            dataset,
            date,
            committed,
            staging: StagingBuffer::in_memory()?,
            lock: Some(lock),
            closed: false,
        })
    }

    fn commit(&mut self) -> Result<SinkSummary> {
        let target = self.dataset.shard_path(self.date);
        let staged = self.staging.items()?;

        if staged.is_empty() {
            let total = if target.is_file() {
                shard::read_ids(&target)?.len()
            } else {
                0
            };
            info!("No new items for {}, {} left unchanged", self.dataset.name(), self.date);
            return Ok(SinkSummary { added: 0, total });
        }

        let mut rows: Vec<FeedItem> = if target.is_file() {
            shard::read_items(&target)?
        } else {
            Vec::new()
        };
        let existing: HashSet<i64> = rows.iter().map(|item| item.id).collect();
        let staged_count = staged.len();
        rows.extend(staged.into_iter().filter(|item| !existing.contains(&item.id)));
        let added = rows.len() - existing.len();
        if added < staged_count {
            warn!(
                "{} staged items were already committed beyond the lookback window",
                staged_count - added
            );
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let batch = to_record_batch(&rows)?;
        StagedShard::write(&target, &[batch])?.commit()?;

        let ids = shard::read_ids(&target)?;
        let unique = ids.iter().collect::<HashSet<_>>().len();
        info!(
            "Committed {} for {}: {} added, {} total, {} unique",
            self.dataset.name(),
            self.date,
            added,
            ids.len(),
            unique
        );
        if unique != ids.len() {
            warn!("{} holds duplicate ids", target.display());
        }

        Ok(SinkSummary {
            added,
            total: ids.len(),
        })
    }
}

impl ItemSink for WriterSession {
    fn add(&mut self, items: &[FeedItem]) -> Result<usize> {
        if self.closed {
            return Err(FeedstashError::SessionClosed(self.dataset.name()));
        }
        let fresh: Vec<FeedItem> = items
            .iter()
            .filter(|item| !self.committed.contains(item.id))
            .cloned()
            .collect();
        if fresh.is_empty() {
            return Ok(0);
        }
        self.staging.append(&fresh)
    }

    fn close(&mut self) -> Result<SinkSummary> {
        if self.closed {
            return Err(FeedstashError::SessionClosed(self.dataset.name()));
        }
        self.closed = true;
        let summary = self.commit();
        self.lock.take();
        summary
    }
}

impl Drop for WriterSession {
    fn drop(&mut self) {
        if !self.closed {
            warn!("Writer session for {} dropped without close", self.dataset.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::testing::item;
    use crate::store::reader::read_items;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
    }

    fn dataset(root: &Path) -> Dataset {
        Dataset::new(root, "example.social", "home")
    }

    fn open(root: &Path) -> WriterSession {
        WriterSession::open(dataset(root), day(), 2000, 1).unwrap()
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let items = vec![item(1, 10, "a"), item(2, 20, "b"), item(3, 30, "c")];

        let mut session = open(dir.path());
        assert_eq!(session.add(&items).unwrap(), 3);
        let summary = session.close().unwrap();
        assert_eq!(summary, SinkSummary { added: 3, total: 3 });

        let mut stored = read_items(&dataset(dir.path()).dir(), day(), day(), None).unwrap();
        stored.sort_by_key(|i| i.id);
        assert_eq!(stored, items);
    }

    #[test]
    fn test_known_ids_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = open(dir.path());
        session.add(&[item(1, 10, "a"), item(2, 20, "b")]).unwrap();
        session.close().unwrap();

        let mut session = open(dir.path());
        assert_eq!(session.add(&[item(2, 20, "b"), item(3, 30, "c")]).unwrap(), 1);
        // Repeats within the session are skipped as well.
        assert_eq!(session.add(&[item(3, 30, "c")]).unwrap(), 0);
        let summary = session.close().unwrap();
        assert_eq!(summary, SinkSummary { added: 1, total: 3 });
    }

    #[test]
    fn test_close_without_new_rows_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = open(dir.path());
        session.add(&[item(1, 10, "a")]).unwrap();
        session.close().unwrap();
        let path = dataset(dir.path()).shard_path(day());
        let before = fs::read(&path).unwrap();

        let mut session = open(dir.path());
        assert_eq!(session.add(&[item(1, 10, "a")]).unwrap(), 0);
        assert_eq!(session.close().unwrap(), SinkSummary { added: 0, total: 1 });
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_empty_session_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = open(dir.path());
        assert_eq!(session.close().unwrap(), SinkSummary::default());
        assert!(!dataset(dir.path()).shard_path(day()).exists());
    }

    #[test]
    fn test_second_session_on_partition_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = open(dir.path());

        let err = WriterSession::open(dataset(dir.path()), day(), 2000, 1).err().unwrap();
        assert!(matches!(err, FeedstashError::PartitionLocked(_)));

        // Another day of the same dataset is independent.
        let other_day = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let mut other = WriterSession::open(dataset(dir.path()), other_day, 2000, 1).unwrap();
        other.close().unwrap();

        first.close().unwrap();
        let mut again = open(dir.path());
        again.close().unwrap();
    }

    #[test]
    fn test_close_twice_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = open(dir.path());
        session.close().unwrap();
        assert!(matches!(session.close(), Err(FeedstashError::SessionClosed(_))));
        assert!(session.add(&[item(1, 1, "a")]).is_err());
    }

    #[test]
    fn test_lock_left_by_dead_writer_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let lock = dataset(dir.path()).lock_path(day());
        fs::create_dir_all(lock.parent().unwrap()).unwrap();
        // What a killed writer leaves behind: the file, but no live flock.
        fs::write(&lock, "4194303\n").unwrap();

        let mut session = open(dir.path());
        session.add(&[item(1, 10, "a")]).unwrap();
        assert_eq!(session.close().unwrap(), SinkSummary { added: 1, total: 1 });
        assert_eq!(fs::read_to_string(&lock).unwrap(), format!("{}\n", std::process::id()));

        let mut again = open(dir.path());
        again.close().unwrap();
    }

    #[test]
    fn test_dropped_session_releases_lock() {
        let dir = tempfile::tempdir().unwrap();
        drop(open(dir.path()));
        let mut session = open(dir.path());
        session.close().unwrap();
    }
}
