pub mod cursor;
pub mod item;

pub use cursor::{calculate_request_limits, FetchCursor, RequestLimits};
pub use item::{parse_item, parse_page, FeedItem, ParsedPage};
