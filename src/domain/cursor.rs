/// Page size and request budget for one fetch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLimits {
    pub page_size: usize,
    pub max_requests: usize,
}

/// Split `max_items` into pages of at most `per_request` items.
///
/// Follow-up pages inherit the first request's `limit`, so once more than
/// one page is needed the first page must already ask for the full cap.
pub fn calculate_request_limits(max_items: usize, per_request: usize) -> RequestLimits {
    let per_request = per_request.max(1);
    if max_items > per_request {
        RequestLimits {
            page_size: per_request,
            max_requests: max_items.div_ceil(per_request),
        }
    } else {
        RequestLimits {
            page_size: max_items,
            max_requests: 1,
        }
    }
}

/// Ephemeral pagination state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCursor {
    /// `max_id` taken from the previous response's next link.
    pub next_max_id: Option<String>,
    pub rate_limit_remaining: u64,
    pub requests_remaining: usize,
}

impl FetchCursor {
    pub fn new(initial_rate_limit: u64, limits: RequestLimits) -> Self {
        Self {
            next_max_id: None,
            rate_limit_remaining: initial_rate_limit,
            requests_remaining: limits.max_requests,
        }
    }

    pub fn can_request(&self) -> bool {
        self.rate_limit_remaining > 0 && self.requests_remaining > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_page_when_under_cap() {
        for n in [1, 10, 39, 40] {
            let limits = calculate_request_limits(n, 40);
            assert_eq!(limits.page_size, n);
            assert_eq!(limits.max_requests, 1);
        }
    }

    #[test]
    fn test_multiple_pages_round_up() {
        let limits = calculate_request_limits(41, 40);
        assert_eq!(limits, RequestLimits { page_size: 40, max_requests: 2 });

        let limits = calculate_request_limits(80, 40);
        assert_eq!(limits, RequestLimits { page_size: 40, max_requests: 2 });

        let limits = calculate_request_limits(401, 40);
        assert_eq!(limits, RequestLimits { page_size: 40, max_requests: 11 });
    }

    #[test]
    fn test_page_size_never_exceeds_cap() {
        for n in 1..500 {
            let limits = calculate_request_limits(n, 40);
            assert_eq!(limits.page_size, n.min(40));
            assert!(limits.page_size * limits.max_requests >= n);
        }
    }

    #[test]
    fn test_cursor_budget() {
        let mut cursor = FetchCursor::new(300, calculate_request_limits(80, 40));
        assert!(cursor.can_request());
        cursor.requests_remaining = 0;
        assert!(!cursor.can_request());

        let mut cursor = FetchCursor::new(300, calculate_request_limits(80, 40));
        cursor.rate_limit_remaining = 0;
        assert!(!cursor.can_request());
    }
}
