//! Date-partitioned, append-only item storage.
//!
//! Layout under the storage root:
//!
//! ```text
//! {root}/{server}/{feed}.parquet/date=YYYYMMDD/file-0.parquet
//! ```
//!
//! Each day partition holds a single shard, replaced atomically whenever a
//! writer session closes.

pub mod partition;
pub mod reader;
pub mod schema;
pub mod shard;
pub mod staging;
pub mod writer;

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

pub use partition::{
    date_partition, list_datasets, list_partition_dirs, list_partitions, list_partitions_by_date,
    list_servers, parse_date, DATA_SUFFIX, DATE_KEY,
};
pub use reader::{last_ids, read_items, read_partitions};
pub use writer::{CommittedIds, WriterSession};

/// Name of the one shard file in every partition.
pub const SHARD_FILE: &str = "file-0.parquet";

/// One feed of one server under a storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    root: PathBuf,
    server: String,
    feed: String,
}

impl Dataset {
    pub fn new(root: impl AsRef<Path>, server: &str, feed: &str) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            server: server.to_string(),
            feed: feed.to_string(),
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn feed(&self) -> &str {
        &self.feed
    }

    /// `server/feed`, for messages.
    pub fn name(&self) -> String {
        format!("{}/{}", self.server, self.feed)
    }

    pub fn dir(&self) -> PathBuf {
        self.root
            .join(&self.server)
            .join(format!("{}{}", self.feed, DATA_SUFFIX))
    }

    pub fn partition_dir(&self, date: NaiveDate) -> PathBuf {
        self.dir().join(date_partition(date))
    }

    pub fn shard_path(&self, date: NaiveDate) -> PathBuf {
        self.partition_dir(date).join(SHARD_FILE)
    }

    /// Lock file guarding `date`'s partition. It sits beside the partition
    /// so that holding it never makes an empty partition visible.
    pub fn lock_path(&self, date: NaiveDate) -> PathBuf {
        self.dir().join(format!(".{}.lock", date_partition(date)))
    }
}
