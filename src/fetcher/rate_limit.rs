use reqwest::header::{HeaderMap, LINK};
use url::Url;

pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const LIMIT_HEADER: &str = "x-ratelimit-limit";

/// Rate-limit state reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub remaining: u64,
    pub limit: u64,
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

impl RateLimit {
    /// `None` when either header is missing or not a number.
    ///
    /// `HeaderMap` lookups are case-insensitive.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        Some(Self {
            remaining: header_u64(headers, REMAINING_HEADER)?,
            limit: header_u64(headers, LIMIT_HEADER)?,
        })
    }
}

/// The `max_id` cursor of the next-page link.
///
/// Only the first URI reference of the `Link` header is considered, which
/// is where servers put `rel="next"`.
pub fn next_max_id(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    let first = link.split(';').next()?.trim();
    let target = first.trim_start_matches('<').trim_end_matches('>');
    let url = Url::parse(target).ok()?;

    url.query_pairs()
        .find(|(key, _)| key == "max_id")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_rate_limit_parsed() {
        let map = headers(&[("X-RateLimit-Remaining", "299"), ("X-RateLimit-Limit", "300")]);
        assert_eq!(
            RateLimit::from_headers(&map),
            Some(RateLimit { remaining: 299, limit: 300 })
        );
    }

    #[test]
    fn test_rate_limit_missing_or_malformed() {
        assert_eq!(RateLimit::from_headers(&HeaderMap::new()), None);

        let map = headers(&[("x-ratelimit-remaining", "lots"), ("x-ratelimit-limit", "300")]);
        assert_eq!(RateLimit::from_headers(&map), None);

        let map = headers(&[("x-ratelimit-remaining", "10")]);
        assert_eq!(RateLimit::from_headers(&map), None);
    }

    #[test]
    fn test_next_max_id_from_first_link() {
        let map = headers(&[(
            "link",
            "<https://example.social/api/v1/timelines/home?limit=40&max_id=111>; rel=\"next\", \
             <https://example.social/api/v1/timelines/home?min_id=222>; rel=\"prev\"",
        )]);
        assert_eq!(next_max_id(&map).as_deref(), Some("111"));
    }

    #[test]
    fn test_next_max_id_absent() {
        assert_eq!(next_max_id(&HeaderMap::new()), None);

        let map = headers(&[("link", "<https://example.social/api?min_id=5>; rel=\"prev\"")]);
        assert_eq!(next_max_id(&map), None);

        let map = headers(&[("link", "not a link")]);
        assert_eq!(next_max_id(&map), None);
    }
}
