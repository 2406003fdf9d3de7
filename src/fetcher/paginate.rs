//! Rate-limit-aware cursor pagination.
//!
//! Pages are walked newest first. The loop stops at the first of:
//! rate-limit budget spent, request budget spent, a page with no valid
//! items, a page the sink only partly accepted once repeated ids are
//! collapsed (overlap with stored data),
//! or a response without a `max_id` cursor. The sink is closed exactly
//! once whichever way the loop ends.

use std::fmt;

use tracing::{debug, error, warn};

use crate::app::Result;
use crate::config::FetchConfig;
use crate::domain::{calculate_request_limits, parse_page, FeedItem, FetchCursor};
use crate::fetcher::{next_max_id, PageSource, RateLimit};
use crate::sink::{ItemSink, SinkSummary};

/// Server-side assumptions passed in from configuration.
#[derive(Debug, Clone, Copy)]
pub struct FetchSettings {
    pub items_per_request: usize,
    pub initial_rate_limit: u64,
}

impl From<&FetchConfig> for FetchSettings {
    fn from(config: &FetchConfig) -> Self {
        Self {
            items_per_request: config.items_per_request,
            initial_rate_limit: config.initial_rate_limit,
        }
    }
}

/// What to fetch and how much of it.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub base_url: String,
    pub token: String,
    pub max_items: usize,
    /// Extra query parameters sent with every page, e.g. `min_id`.
    pub params: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    RateLimitExhausted,
    RequestBudgetExhausted,
    EmptyPage,
    /// The sink accepted fewer items than the page held.
    Overlap,
    NoNextCursor,
    HttpStatus { status: u16, body: String },
    MalformedBody(String),
}

impl StopReason {
    /// Whether the loop ended on a failed response rather than running out.
    pub fn is_failure(&self) -> bool {
        matches!(self, StopReason::HttpStatus { .. } | StopReason::MalformedBody(_))
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::RateLimitExhausted => write!(f, "rate limit exhausted"),
            StopReason::RequestBudgetExhausted => write!(f, "request budget exhausted"),
            StopReason::EmptyPage => write!(f, "no valid items in page"),
            StopReason::Overlap => write!(f, "reached previously stored items"),
            StopReason::NoNextCursor => write!(f, "no next page"),
            StopReason::HttpStatus { status, body } => write!(f, "HTTP {status}: {body}"),
            StopReason::MalformedBody(reason) => write!(f, "can't parse response body: {reason}"),
        }
    }
}

/// Counters for one fetch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    pub requests: usize,
    /// Raw objects received, parsable or not.
    pub received: usize,
    pub valid: usize,
    /// Items the sink accepted as new.
    pub added: usize,
    pub stop: StopReason,
    pub summary: SinkSummary,
}

struct LoopOutcome {
    requests: usize,
    received: usize,
    valid: usize,
    added: usize,
    stop: StopReason,
}

/// Walk the feed at `request.base_url` into `sink`.
///
/// HTTP failures end the loop and show up in [`FetchReport::stop`];
/// transport and sink errors are returned after the sink is closed.
pub async fn fetch<P, S>(
    source: &P,
    sink: &mut S,
    request: &FetchRequest,
    settings: FetchSettings,
) -> Result<FetchReport>
where
    P: PageSource + ?Sized,
    S: ItemSink + ?Sized,
{
    let outcome = run(source, sink, request, settings).await;
    let closed = sink.close();

    match (outcome, closed) {
        (Ok(outcome), Ok(summary)) => Ok(FetchReport {
            requests: outcome.requests,
            received: outcome.received,
            valid: outcome.valid,
            added: outcome.added,
            stop: outcome.stop,
            summary,
        }),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), closed) => {
            if let Err(close_err) = closed {
                warn!("Closing sink after failed fetch also failed: {}", close_err);
            }
            Err(e)
        }
    }
}

async fn run<P, S>(
    source: &P,
    sink: &mut S,
    request: &FetchRequest,
    settings: FetchSettings,
) -> Result<LoopOutcome>
where
    P: PageSource + ?Sized,
    S: ItemSink + ?Sized,
{
    let limits = calculate_request_limits(request.max_items, settings.items_per_request);
    let mut cursor = FetchCursor::new(settings.initial_rate_limit, limits);
    let mut outcome = LoopOutcome {
        requests: 0,
        received: 0,
        valid: 0,
        added: 0,
        stop: StopReason::RequestBudgetExhausted,
    };

    loop {
        if !cursor.can_request() {
            outcome.stop = if cursor.rate_limit_remaining == 0 {
                StopReason::RateLimitExhausted
            } else {
                StopReason::RequestBudgetExhausted
            };
            break;
        }
        cursor.requests_remaining -= 1;

        let mut query = request.params.clone();
        query.push(("limit".to_string(), limits.page_size.to_string()));
        if let Some(max_id) = &cursor.next_max_id {
            query.push(("max_id".to_string(), max_id.clone()));
        }

        debug!("GET {} {:?}", request.base_url, query);
        let response = source.get(&request.base_url, &request.token, &query).await?;
        outcome.requests += 1;

        if response.status != 200 {
            let body = String::from_utf8_lossy(&response.body).into_owned();
            error!("HTTP {} from {}: {}", response.status, request.base_url, body);
            outcome.stop = StopReason::HttpStatus {
                status: response.status,
                body,
            };
            break;
        }

        cursor.rate_limit_remaining = match RateLimit::from_headers(&response.headers) {
            Some(rate_limit) => rate_limit.remaining,
            None => {
                warn!("Response carries no valid rate limit headers, stopping after this page");
                0
            }
        };
        debug!(
            "rate_limit_remaining={},requests_remaining={}",
            cursor.rate_limit_remaining, cursor.requests_remaining
        );

        let page = match parse_page(&response.body) {
            Ok(page) => page,
            Err(e) => {
                outcome.stop = StopReason::MalformedBody(e.to_string());
                break;
            }
        };
        outcome.received += page.received;
        outcome.valid += page.items.len();
        debug!("received={},valid={}", page.received, page.items.len());

        if page.items.is_empty() {
            outcome.stop = StopReason::EmptyPage;
            break;
        }

        let mut items = page.items;
        items.sort_by_key(|item| item.id);
        let items = collapse_repeated_ids(items);
        let added = sink.add(&items)?;
        outcome.added += added;

        if added < items.len() {
            debug!("End of new items reached");
            outcome.stop = StopReason::Overlap;
            break;
        }

        match next_max_id(&response.headers) {
            Some(max_id) => cursor.next_max_id = Some(max_id),
            None => {
                debug!("Link header has no max_id cursor");
                outcome.stop = StopReason::NoNextCursor;
                break;
            }
        }
    }

    Ok(outcome)
}

/// Keep one item per id from an id-sorted page, the later copy winning.
///
/// A reshare carries its original's id, so a post and its boost can share
/// a page. Left in, the repeat would look like overlap with stored data.
fn collapse_repeated_ids(items: Vec<FeedItem>) -> Vec<FeedItem> {
    let mut unique: Vec<FeedItem> = Vec::with_capacity(items.len());
    for item in items {
        match unique.last_mut() {
            Some(last) if last.id == item.id => *last = item,
            _ => unique.push(item),
        }
    }
    unique
}
