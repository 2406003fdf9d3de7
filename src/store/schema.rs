//! Explicit, versioned column layout for stored shards.
//!
//! The same declaration builds record batches on write and validates
//! shards on read; a shard written under another version is rejected
//! rather than reinterpreted.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Int64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use crate::app::{FeedstashError, Result};
use crate::domain::FeedItem;

pub const SCHEMA_VERSION_KEY: &str = "feedstash.schema.version";
pub const SCHEMA_VERSION: &str = "1";

/// Column name, type and nullability, in storage order.
fn columns() -> [(&'static str, DataType, bool); 13] {
    [
        ("id", DataType::Int64, false),
        ("account_handle", DataType::Utf8, false),
        ("avatar_url", DataType::Utf8, false),
        ("created_at", DataType::Int64, false),
        ("url", DataType::Utf8, false),
        ("reply_count", DataType::UInt64, false),
        ("reshare_count", DataType::UInt64, false),
        ("favorite_count", DataType::UInt64, false),
        ("content", DataType::Utf8, false),
        ("in_reply_to_id", DataType::Int64, true),
        ("media_attachments", DataType::Utf8, true),
        ("source_account_handle", DataType::Utf8, true),
        ("source_created_at", DataType::Int64, true),
    ]
}

pub fn item_schema() -> SchemaRef {
    let fields: Vec<Field> = columns()
        .into_iter()
        .map(|(name, data_type, nullable)| Field::new(name, data_type, nullable))
        .collect();
    let metadata = HashMap::from([(
        SCHEMA_VERSION_KEY.to_string(),
        SCHEMA_VERSION.to_string(),
    )]);
    Arc::new(Schema::new_with_metadata(fields, metadata))
}

/// Check a shard's schema against the declared one.
pub fn validate_schema(schema: &Schema, origin: &str) -> Result<()> {
    match schema.metadata().get(SCHEMA_VERSION_KEY) {
        Some(version) if version == SCHEMA_VERSION => {}
        Some(version) => {
            return Err(FeedstashError::Schema(format!(
                "{origin}: schema version {version}, expected {SCHEMA_VERSION}"
            )))
        }
        None => {
            return Err(FeedstashError::Schema(format!(
                "{origin}: missing {SCHEMA_VERSION_KEY}"
            )))
        }
    }

    let expected = columns();
    if schema.fields().len() != expected.len() {
        return Err(FeedstashError::Schema(format!(
            "{origin}: {} columns, expected {}",
            schema.fields().len(),
            expected.len()
        )));
    }

    for (field, (name, data_type, _)) in schema.fields().iter().zip(expected.iter()) {
        if field.name().as_str() != *name || field.data_type() != data_type {
            return Err(FeedstashError::Schema(format!(
                "{origin}: column {} {:?}, expected {} {:?}",
                field.name(),
                field.data_type(),
                name,
                data_type
            )));
        }
    }

    Ok(())
}

pub fn to_record_batch(items: &[FeedItem]) -> Result<RecordBatch> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from_iter_values(items.iter().map(|i| i.id))),
        Arc::new(StringArray::from_iter_values(
            items.iter().map(|i| i.account_handle.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            items.iter().map(|i| i.avatar_url.as_str()),
        )),
        Arc::new(Int64Array::from_iter_values(items.iter().map(|i| i.created_at))),
        Arc::new(StringArray::from_iter_values(items.iter().map(|i| i.url.as_str()))),
        Arc::new(UInt64Array::from_iter_values(items.iter().map(|i| i.reply_count))),
        Arc::new(UInt64Array::from_iter_values(items.iter().map(|i| i.reshare_count))),
        Arc::new(UInt64Array::from_iter_values(items.iter().map(|i| i.favorite_count))),
        Arc::new(StringArray::from_iter_values(items.iter().map(|i| i.content.as_str()))),
        Arc::new(Int64Array::from(
            items.iter().map(|i| i.in_reply_to_id).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            items
                .iter()
                .map(|i| i.media_attachments.as_deref())
                .collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            items
                .iter()
                .map(|i| i.source_account_handle.as_deref())
                .collect::<Vec<_>>(),
        )),
        Arc::new(Int64Array::from(
            items.iter().map(|i| i.source_created_at).collect::<Vec<_>>(),
        )),
    ];

    Ok(RecordBatch::try_new(item_schema(), columns)?)
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| FeedstashError::Schema(format!("column {name} missing or mistyped")))
}

fn opt_i64(array: &Int64Array, row: usize) -> Option<i64> {
    (!array.is_null(row)).then(|| array.value(row))
}

fn opt_string(array: &StringArray, row: usize) -> Option<String> {
    (!array.is_null(row)).then(|| array.value(row).to_string())
}

pub fn from_record_batch(batch: &RecordBatch) -> Result<Vec<FeedItem>> {
    let id = column::<Int64Array>(batch, "id")?;
    let account_handle = column::<StringArray>(batch, "account_handle")?;
    let avatar_url = column::<StringArray>(batch, "avatar_url")?;
    let created_at = column::<Int64Array>(batch, "created_at")?;
    let url = column::<StringArray>(batch, "url")?;
    let reply_count = column::<UInt64Array>(batch, "reply_count")?;
    let reshare_count = column::<UInt64Array>(batch, "reshare_count")?;
    let favorite_count = column::<UInt64Array>(batch, "favorite_count")?;
    let content = column::<StringArray>(batch, "content")?;
    let in_reply_to_id = column::<Int64Array>(batch, "in_reply_to_id")?;
    let media_attachments = column::<StringArray>(batch, "media_attachments")?;
    let source_account_handle = column::<StringArray>(batch, "source_account_handle")?;
    let source_created_at = column::<Int64Array>(batch, "source_created_at")?;

    Ok((0..batch.num_rows())
        .map(|row| FeedItem {
            id: id.value(row),
            account_handle: account_handle.value(row).to_string(),
            avatar_url: avatar_url.value(row).to_string(),
            created_at: created_at.value(row),
            url: url.value(row).to_string(),
            reply_count: reply_count.value(row),
            reshare_count: reshare_count.value(row),
            favorite_count: favorite_count.value(row),
            content: content.value(row).to_string(),
            in_reply_to_id: opt_i64(in_reply_to_id, row),
            media_attachments: opt_string(media_attachments, row),
            source_account_handle: opt_string(source_account_handle, row),
            source_created_at: opt_i64(source_created_at, row),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::testing::item;

    #[test]
    fn test_batch_carries_version() {
        let batch = to_record_batch(&[item(1, 10, "a")]).unwrap();
        assert_eq!(batch.num_rows(), 1);
        assert!(validate_schema(&batch.schema(), "batch").is_ok());
    }

    #[test]
    fn test_nullable_columns_survive_conversion() {
        let mut reshare = item(2, 20, "b");
        reshare.source_account_handle = Some("bob".into());
        reshare.source_created_at = Some(30);
        reshare.in_reply_to_id = Some(1);
        reshare.media_attachments = Some("[]".into());
        let items = vec![item(1, 10, "a"), reshare];

        let batch = to_record_batch(&items).unwrap();
        assert_eq!(from_record_batch(&batch).unwrap(), items);
    }

    #[test]
    fn test_rejects_unversioned_schema() {
        let schema = Schema::new(vec![Field::new("id", DataType::Int64, false)]);
        let err = validate_schema(&schema, "legacy.parquet").unwrap_err();
        assert!(err.to_string().contains("legacy.parquet"));
    }

    #[test]
    fn test_rejects_other_version() {
        let schema = item_schema();
        let other = Schema::new_with_metadata(
            schema.fields().clone(),
            HashMap::from([(SCHEMA_VERSION_KEY.to_string(), "2".to_string())]),
        );
        assert!(validate_schema(&other, "x").is_err());
    }

    #[test]
    fn test_rejects_mistyped_column() {
        let mut fields: Vec<Field> = item_schema()
            .fields()
            .iter()
            .map(|f| f.as_ref().clone())
            .collect();
        fields[3] = Field::new("created_at", DataType::Utf8, false);
        let schema = Schema::new_with_metadata(
            fields,
            HashMap::from([(SCHEMA_VERSION_KEY.to_string(), SCHEMA_VERSION.to_string())]),
        );
        assert!(validate_schema(&schema, "x").is_err());
    }
}
