//! Parquet shard files and atomic replacement.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use arrow::array::{Array, Int64Array};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::{ArrowWriter, ProjectionMask};
use parquet::basic::Compression;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;

use crate::app::{FeedstashError, Result};
use crate::domain::FeedItem;
use crate::store::schema::{
    from_record_batch, item_schema, validate_schema, SCHEMA_VERSION, SCHEMA_VERSION_KEY,
};

fn open_validated(path: &Path) -> Result<ParquetRecordBatchReaderBuilder<File>> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    validate_schema(builder.schema(), &path.display().to_string())?;
    Ok(builder)
}

/// Read every row of a shard.
pub fn read_items(path: &Path) -> Result<Vec<FeedItem>> {
    let reader = open_validated(path)?.build()?;
    let mut items = Vec::new();
    for batch in reader {
        items.extend(from_record_batch(&batch?)?);
    }
    Ok(items)
}

/// Read only the `id` column of a shard.
pub fn read_ids(path: &Path) -> Result<Vec<i64>> {
    let builder = open_validated(path)?;
    let mask = ProjectionMask::roots(builder.parquet_schema(), [0]);
    let reader = builder.with_projection(mask).build()?;

    let mut ids = Vec::new();
    for batch in reader {
        let batch = batch?;
        let column = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| FeedstashError::Schema(format!("{}: id column", path.display())))?;
        ids.extend(column.values().iter().copied());
    }
    Ok(ids)
}

/// A fully written shard waiting to be renamed over its target.
///
/// The temporary file lives next to the target so the rename stays on one
/// filesystem. Dropping an uncommitted shard removes the temporary file and
/// leaves the target as it was.
#[derive(Debug)]
pub struct StagedShard {
    tmp_path: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedShard {
    pub fn write(target: &Path, batches: &[RecordBatch]) -> Result<Self> {
        let dir = target
            .parent()
            .ok_or_else(|| FeedstashError::Other(format!("{} has no parent", target.display())))?;
        let name = target
            .file_name()
            .ok_or_else(|| FeedstashError::Other(format!("{} has no file name", target.display())))?;

        let staged = Self {
            tmp_path: dir.join(format!(".{}.tmp", name.to_string_lossy())),
            target: target.to_path_buf(),
            committed: false,
        };

        let file = File::create(&staged.tmp_path)?;
        let sync_handle = file.try_clone()?;

        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .set_key_value_metadata(Some(vec![KeyValue {
                key: SCHEMA_VERSION_KEY.to_string(),
                value: Some(SCHEMA_VERSION.to_string()),
            }]))
            .build();

        let mut writer = ArrowWriter::try_new(file, item_schema(), Some(props))?;
        for batch in batches {
            writer.write(batch)?;
        }
        writer.close()?;
        sync_handle.sync_all()?;

        Ok(staged)
    }

    pub fn tmp_path(&self) -> &Path {
        &self.tmp_path
    }

    /// Rename the temporary file over the target.
    pub fn commit(mut self) -> Result<()> {
        fs::rename(&self.tmp_path, &self.target)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedShard {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}
