use std::collections::HashSet;
use std::io::Write;

use chrono::DateTime;

use crate::app::Result;
use crate::domain::FeedItem;

/// Counters reported when a sink is closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkSummary {
    /// New items the sink took over its lifetime.
    pub added: usize,
    /// Rows in the destination after closing.
    pub total: usize,
}

/// Destination for fetched items.
///
/// `add` returns how many of the given items were new to the sink; the
/// fetcher treats a short count as overlap with earlier data. `close` must
/// be called exactly once.
pub trait ItemSink {
    fn add(&mut self, items: &[FeedItem]) -> Result<usize>;
    fn close(&mut self) -> Result<SinkSummary>;
}

/// Transient sink that prints each previously unseen item.
pub struct PrintSink<W: Write> {
    out: W,
    seen: HashSet<i64>,
    closed: bool,
}

impl<W: Write> PrintSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            seen: HashSet::new(),
            closed: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ItemSink for PrintSink<W> {
    fn add(&mut self, items: &[FeedItem]) -> Result<usize> {
        let mut added = 0;
        for item in items {
            if !self.seen.insert(item.id) {
                continue;
            }
            let when = DateTime::from_timestamp(item.created_at, 0)
                .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
                .unwrap_or_default();
            writeln!(self.out, "{} {} {}", item.id, when, item.account_handle)?;
            added += 1;
        }
        Ok(added)
    }

    fn close(&mut self) -> Result<SinkSummary> {
        if self.closed {
            return Err(crate::app::FeedstashError::SessionClosed("print sink".into()));
        }
        self.closed = true;
        self.out.flush()?;
        Ok(SinkSummary {
            added: self.seen.len(),
            total: self.seen.len(),
        })
    }
}
