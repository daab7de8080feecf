//! # Cache Utilities
//!
//! Expiry computation from HTTP caching headers.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Extracts the `max-age` directive from a `Cache-Control` value.
///
/// Returns `None` when the directive is absent or its value is not a
/// non-negative integer.
pub fn parse_max_age(cache_control: &str) -> Option<u64> {
    cache_control.split(',').find_map(|directive| {
        let (name, value) = directive.trim().split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("max-age") {
            return None;
        }
        value.trim().trim_matches('"').parse::<u64>().ok()
    })
}

/// `now + max-age` when the header carries a usable directive, otherwise
/// `now + default_max_age`.
pub fn compute_expiry(
    cache_control: Option<&str>,
    default_max_age: Duration,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let ttl = cache_control
        .and_then(parse_max_age)
        .map(Duration::from_secs)
        .unwrap_or(default_max_age);

    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
