//! # Feedstash
//!
//! Archives social-network timelines into date-partitioned parquet files
//! and serves them back over HTTP.
//!
//! ## Architecture
//!
//! ```text
//! Fetcher → FeedItem → WriterSession → partitions on disk → Reader → Ranking
//!                                               ↘ HTTP file server
//! ```
//!
//! - [`fetcher`]: rate-limit-aware cursor pagination over the remote API
//! - [`store`]: append-only, atomically replaced day partitions
//! - [`ranking`]: repost dedup and age-decayed engagement score
//! - [`server`]: listing API and byte-range file server
//!
//! ## Quick Start
//!
//! ```bash
//! # Store the newest 200 items of the home timeline
//! FEEDSTASH_TOKEN=... feedstash fetch --server mastodon.social --limit 200
//!
//! # Print what was stored, most popular first
//! feedstash show --server mastodon.social --popular
//!
//! # Serve ~/.feedstash/db and ~/.feedstash/html on port 5000
//! feedstash serve
//! ```

/// Application context and error handling.
pub mod app;

/// Command-line interface using clap.
///
/// - `fetch` - Fetch new items into today's partition
/// - `show` - Print stored items
/// - `partitions` - List stored partitions
/// - `serve` - Run the HTTP server
pub mod cli;

/// Configuration loaded from `<home>/config.toml`.
pub mod config;

/// Core domain models.
///
/// - [`FeedItem`](domain::FeedItem): one stored item, reshares normalized
///   to their original
/// - [`FetchCursor`](domain::FetchCursor): pagination state of one fetch
pub mod domain;

/// Pagination fetch loop.
///
/// - [`PageSource`](fetcher::PageSource): async trait for a single GET
/// - [`HttpPageSource`](fetcher::HttpPageSource): reqwest implementation
/// - [`fetch`](fetcher::fetch): the loop itself
pub mod fetcher;

/// Repost deduplication and popularity ranking.
pub mod ranking;

/// HTTP server built on axum.
pub mod server;

/// Destinations for fetched items.
pub mod sink;

/// Partitioned parquet storage.
///
/// - [`WriterSession`](store::WriterSession): single-writer append session
/// - [`Dataset`](store::Dataset): on-disk layout of one feed
pub mod store;
