use rusqlite::{params, Connection, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::Result;
use crate::domain::FeedItem;

/// Write-ahead buffer for a writer session.
///
/// Rows land in an in-memory SQLite table whose unique `id` column makes a
/// repeated id a no-op. Each `append` is one transaction, so a batch is
/// staged whole or not at all.
pub struct StagingBuffer {
    conn: Connection,
}

impl StagingBuffer {
    pub fn in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        Self::run_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    fn run_migrations(conn: &mut Connection) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-staging/up.sql"
        ))]);
        migrations.to_latest(conn)?;
        Ok(())
    }

    /// Stage a batch and return how many rows were new.
    pub fn append(&mut self, items: &[FeedItem]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO staged_items (
                    id, account_handle, avatar_url, created_at, url,
                    reply_count, reshare_count, favorite_count, content,
                    in_reply_to_id, media_attachments, source_account_handle, source_created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;
            for item in items {
                inserted += stmt.execute(params![
                    item.id,
                    item.account_handle,
                    item.avatar_url,
                    item.created_at,
                    item.url,
                    item.reply_count as i64,
                    item.reshare_count as i64,
                    item.favorite_count as i64,
                    item.content,
                    item.in_reply_to_id,
                    item.media_attachments,
                    item.source_account_handle,
                    item.source_created_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM staged_items", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Every staged row in arrival order.
    pub fn items(&self) -> Result<Vec<FeedItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, account_handle, avatar_url, created_at, url,
                    reply_count, reshare_count, favorite_count, content,
                    in_reply_to_id, media_attachments, source_account_handle, source_created_at
             FROM staged_items ORDER BY seq",
        )?;
        let items = stmt
            .query_map([], Self::row_to_item)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn row_to_item(row: &Row<'_>) -> rusqlite::Result<FeedItem> {
        Ok(FeedItem {
            id: row.get(0)?,
            account_handle: row.get(1)?,
            avatar_url: row.get(2)?,
            created_at: row.get(3)?,
            url: row.get(4)?,
            reply_count: row.get::<_, i64>(5)? as u64,
            reshare_count: row.get::<_, i64>(6)? as u64,
            favorite_count: row.get::<_, i64>(7)? as u64,
            content: row.get(8)?,
            in_reply_to_id: row.get(9)?,
            media_attachments: row.get(10)?,
            source_account_handle: row.get(11)?,
            source_created_at: row.get(12)?,
        })
    }
}
