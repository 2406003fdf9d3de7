use chrono::DateTime;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One stored feed item.
///
/// For a reshare, `id`, `url`, `created_at`, content and engagement counts
/// come from the reshared item; `source_account_handle` and
/// `source_created_at` record who reshared it and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: i64,
    pub account_handle: String,
    pub avatar_url: String,
    pub created_at: i64,
    pub url: String,
    pub reply_count: u64,
    pub reshare_count: u64,
    pub favorite_count: u64,
    pub content: String,
    pub in_reply_to_id: Option<i64>,
    pub media_attachments: Option<String>,
    pub source_account_handle: Option<String>,
    pub source_created_at: Option<i64>,
}

impl FeedItem {
    pub fn is_reshare(&self) -> bool {
        self.source_account_handle.is_some()
    }

    /// Hex SHA-256 of the content, used to spot reposted copies.
    pub fn content_digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.content.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Content with markup stripped and entities decoded, for terminal output.
    pub fn display_content(&self) -> String {
        let mut text = String::with_capacity(self.content.len());
        let mut in_tag = false;
        for c in self.content.chars() {
            match c {
                '<' => in_tag = true,
                '>' if in_tag => {
                    in_tag = false;
                    text.push(' ');
                }
                _ if !in_tag => text.push(c),
                _ => {}
            }
        }
        let decoded = html_escape::decode_html_entities(&text);
        decoded.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Ids arrive as JSON strings from most servers but some send numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl RawId {
    fn value(&self) -> Option<i64> {
        match self {
            RawId::Text(s) => s.parse().ok(),
            RawId::Number(n) => Some(*n),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    acct: String,
    #[serde(default)]
    avatar: String,
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    id: RawId,
    created_at: String,
    account: RawAccount,
    url: Option<String>,
    #[serde(default)]
    replies_count: u64,
    #[serde(default)]
    reblogs_count: u64,
    #[serde(default)]
    favourites_count: u64,
    #[serde(default)]
    content: String,
    in_reply_to_id: Option<RawId>,
    #[serde(default)]
    media_attachments: Vec<serde_json::Value>,
    reblog: Option<Box<RawStatus>>,
}

fn parse_timestamp(s: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.timestamp())
}

impl RawStatus {
    fn into_item(mut self) -> Option<FeedItem> {
        let (original, source_account_handle, source_created_at) = match self.reblog.take() {
            Some(inner) => {
                let reshared_at = parse_timestamp(&self.created_at)?;
                (*inner, Some(self.account.acct), Some(reshared_at))
            }
            None => (self, None, None),
        };

        let media_attachments = if original.media_attachments.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&original.media_attachments).ok()?)
        };

        Some(FeedItem {
            id: original.id.value()?,
            account_handle: original.account.acct,
            avatar_url: original.account.avatar,
            created_at: parse_timestamp(&original.created_at)?,
            url: original.url.unwrap_or_default(),
            reply_count: original.replies_count,
            reshare_count: original.reblogs_count,
            favorite_count: original.favourites_count,
            content: original.content,
            in_reply_to_id: original.in_reply_to_id.and_then(|id| id.value()),
            media_attachments,
            source_account_handle,
            source_created_at,
        })
    }
}

/// Parse one raw API object; `None` when it doesn't fit the item shape.
pub fn parse_item(value: serde_json::Value) -> Option<FeedItem> {
    serde_json::from_value::<RawStatus>(value)
        .ok()
        .and_then(RawStatus::into_item)
}

/// A decoded page: how many raw objects arrived and which of them parsed.
#[derive(Debug, Default)]
pub struct ParsedPage {
    pub received: usize,
    pub items: Vec<FeedItem>,
}

/// Parse a response body that must be a JSON array.
///
/// A body that isn't an array is an error; individual malformed entries
/// are dropped and only show up in the `received` count.
pub fn parse_page(body: &[u8]) -> serde_json::Result<ParsedPage> {
    let raw: Vec<serde_json::Value> = serde_json::from_slice(body)?;
    let received = raw.len();
    let items = raw.into_iter().filter_map(parse_item).collect();
    Ok(ParsedPage { received, items })
}
