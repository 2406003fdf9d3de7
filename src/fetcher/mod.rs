pub mod http_fetcher;
pub mod paginate;
pub mod rate_limit;

use async_trait::async_trait;
use reqwest::header::HeaderMap;

use crate::app::Result;

pub use http_fetcher::HttpPageSource;
pub use paginate::{fetch, FetchReport, FetchRequest, FetchSettings, StopReason};
pub use rate_limit::{next_max_id, RateLimit};

/// One raw response from the remote feed API.
#[derive(Debug, Clone)]
pub struct PageResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Performs a single authenticated GET.
///
/// Only transport failures are errors; any HTTP status comes back as a
/// response for the caller to judge.
#[async_trait]
pub trait PageSource {
    async fn get(&self, url: &str, token: &str, query: &[(String, String)]) -> Result<PageResponse>;
}
