use std::io::{self, Write};

use chrono::{DateTime, NaiveDate, Utc};
use url::Url;

use crate::app::{AppContext, FeedstashError, Result};
use crate::cli::{FeedTarget, FetchArgs, FetchMode, ShowArgs, TOKEN_ENV};
use crate::domain::FeedItem;
use crate::fetcher::{fetch, FetchRequest};
use crate::ranking::{popular, score};
use crate::server;
use crate::sink::PrintSink;
use crate::store::{
    last_ids, list_partition_dirs, list_partitions, list_partitions_by_date, read_partitions,
    WriterSession, DATE_KEY,
};

/// Characters of content shown per item.
const PREVIEW_CHARS: usize = 600;

pub fn timeline_url(server: &str, feed: &str) -> String {
    format!("https://{server}/api/v1/timelines/{feed}")
}

fn resolve_token(explicit: Option<&str>) -> Result<String> {
    explicit
        .map(String::from)
        .or_else(|| std::env::var(TOKEN_ENV).ok())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            FeedstashError::Config(format!("no access token, pass --token or set {TOKEN_ENV}"))
        })
}

pub async fn fetch_feed(ctx: &AppContext, args: &FetchArgs) -> Result<()> {
    let token = resolve_token(args.token.as_deref())?;
    let base_url = args
        .base_url
        .clone()
        .unwrap_or_else(|| timeline_url(&args.target.server, &args.target.feed));
    Url::parse(&base_url)?;

    let storage = &ctx.config.storage;
    let dataset = ctx.dataset(&args.target.server, &args.target.feed);
    let today = Utc::now().date_naive();

    let mut params = vec![("local".to_string(), "false".to_string())];
    if args.mode == FetchMode::Fill {
        let newest = last_ids(&dataset.dir(), 1, None, today, storage.lookback_days)?;
        if let Some(id) = newest.first() {
            params.push(("min_id".to_string(), id.to_string()));
        }
    }

    let request = FetchRequest {
        base_url,
        token,
        max_items: args.limit,
        params,
    };
    let source = ctx.page_source()?;
    let settings = ctx.fetch_settings();

    let report = if args.print {
        let mut sink = PrintSink::new(io::stdout());
        fetch(&source, &mut sink, &request, settings).await?
    } else {
        let mut session = WriterSession::open(dataset, today, storage.lookback_ids, storage.lookback_days)?;
        fetch(&source, &mut session, &request, settings).await?
    };

    tracing::debug!(
        "{} requests, {} received, {} valid, stopped: {}",
        report.requests,
        report.received,
        report.valid,
        report.stop
    );
    println!(
        "items_total={},items_added={}",
        report.summary.total, report.summary.added
    );

    if report.stop.is_failure() {
        return Err(FeedstashError::Other(format!(
            "fetch from {} stopped: {}",
            request.base_url, report.stop
        )));
    }
    Ok(())
}

/// Stored partition names of a feed, optionally limited to a date range.
fn date_partitions(dir: &std::path::Path, range: Option<(NaiveDate, NaiveDate)>) -> Result<Vec<String>> {
    match range {
        Some((from, to)) => list_partitions_by_date(dir, from, to),
        None => Ok(list_partition_dirs(dir)?
            .into_iter()
            .filter(|name| name.starts_with(&format!("{DATE_KEY}=")))
            .collect()),
    }
}

fn format_timestamp(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn write_item(out: &mut impl Write, item: &FeedItem, score: Option<f64>) -> io::Result<()> {
    let preview: String = item.display_content().chars().take(PREVIEW_CHARS).collect();
    match score {
        Some(score) => writeln!(
            out,
            "{} {} (score {:.1})",
            format_timestamp(item.created_at),
            item.account_handle,
            score
        )?,
        None => writeln!(out, "{} {}", format_timestamp(item.created_at), item.account_handle)?,
    }
    if let Some(by) = &item.source_account_handle {
        writeln!(out, "reshared by {by}")?;
    }
    writeln!(out, "{preview}\n")
}

pub fn show_items(ctx: &AppContext, args: &ShowArgs) -> Result<()> {
    let dataset = ctx.dataset(&args.target.server, &args.target.feed);
    let dir = dataset.dir();
    let range = args.from.zip(args.to);
    let partitions = date_partitions(&dir, range)?;

    let mut out = io::stdout().lock();
    if args.popular {
        let now = Utc::now().timestamp();
        let items = read_partitions(&dir, &partitions, None)?;
        for item in popular(items, now).iter().take(args.limit) {
            write_item(&mut out, item, Some(score(item, now)))?;
        }
    } else {
        let items = read_partitions(&dir, &partitions, Some(args.limit))?;
        if items.is_empty() {
            eprintln!("No items stored for {}", dataset.name());
        }
        for item in &items {
            write_item(&mut out, item, None)?;
        }
    }
    Ok(())
}

pub fn list_feed_partitions(
    ctx: &AppContext,
    target: &FeedTarget,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<()> {
    let dir = ctx.dataset(&target.server, &target.feed).dir();
    let lines = match from.zip(to) {
        Some((from, to)) => list_partitions_by_date(&dir, from, to)?,
        None => list_partitions(&dir, DATE_KEY, None)?,
    };
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

pub async fn serve(ctx: &AppContext, bind: Option<&str>) -> Result<()> {
    let bind = bind.unwrap_or(&ctx.config.server.bind);
    server::serve(ctx.server_state(), bind).await
}
