pub mod dedup;
pub mod score;

pub use dedup::dedup;
pub use score::{age_handicap, rank, score};

use crate::domain::FeedItem;

/// Dedup then rank: what a "popular" view shows.
pub fn popular(items: Vec<FeedItem>, now: i64) -> Vec<FeedItem> {
    rank(dedup(items), now)
}
