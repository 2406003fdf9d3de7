//! `Range` request header parsing.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("malformed range: {0}")]
    Malformed(String),
    #[error("range {0} not satisfiable")]
    Unsatisfiable(String),
}

/// Inclusive byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Never zero: `end` is inclusive.
    pub fn byte_count(&self) -> u64 {
        self.end - self.start + 1
    }
}

fn parse_number(s: &str, spec: &str) -> Result<u64, RangeError> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return Err(RangeError::Malformed(spec.to_string()));
    }
    s.parse().map_err(|_| RangeError::Malformed(spec.to_string()))
}

/// Resolve one `N-M`, `N-` or `-N` spec against a file of `size` bytes.
fn parse_spec(spec: &str, size: u64) -> Result<ByteRange, RangeError> {
    let (first, last) = spec
        .split_once('-')
        .ok_or_else(|| RangeError::Malformed(spec.to_string()))?;

    let (start, end) = match (first.is_empty(), last.is_empty()) {
        (true, true) => return Err(RangeError::Malformed(spec.to_string())),
        // Suffix: the last N bytes.
        (true, false) => {
            let suffix = parse_number(last, spec)?;
            if suffix == 0 || suffix > size {
                return Err(RangeError::Unsatisfiable(spec.to_string()));
            }
            (size - suffix, size - 1)
        }
        (false, true) => (parse_number(first, spec)?, size.saturating_sub(1)),
        (false, false) => {
            let start = parse_number(first, spec)?;
            let end = parse_number(last, spec)?;
            if end < start {
                return Err(RangeError::Malformed(spec.to_string()));
            }
            (start, end.min(size.saturating_sub(1)))
        }
    };

    if start >= size {
        return Err(RangeError::Unsatisfiable(spec.to_string()));
    }
    Ok(ByteRange { start, end })
}

/// Parse a `bytes=...` header into every listed range, in order.
///
/// Callers serve only the first; multipart responses are not produced.
pub fn parse_range_header(header: &str, size: u64) -> Result<Vec<ByteRange>, RangeError> {
    let (unit, specs) = header
        .trim()
        .split_once('=')
        .ok_or_else(|| RangeError::Malformed(header.to_string()))?;
    if !unit.trim().eq_ignore_ascii_case("bytes") {
        return Err(RangeError::Malformed(format!("unsupported unit {}", unit.trim())));
    }

    specs
        .split(',')
        .map(str::trim)
        .map(|spec| parse_spec(spec, size))
        .collect()
}
