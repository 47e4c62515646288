//! Server-reported rate-limit quota
//!
//! The API reports the caller's quota on every response through
//! `X-RateLimit-*` headers. [`RateLimitInfo`] is the parsed, immutable form.
//! Parsing is all-or-nothing for the primary counters: if any of
//! limit/remaining/reset is missing or unparseable the whole record is absent.

use serde::{Deserialize, Serialize};

/// Header carrying the request quota for the current window
pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
/// Header carrying the requests left in the current window
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
/// Header carrying the window reset time (seconds since epoch)
pub const HEADER_RESET: &str = "x-ratelimit-reset";
/// Daily quota
pub const HEADER_DAILY_LIMIT: &str = "x-ratelimit-daily-limit";
/// Daily requests left
pub const HEADER_DAILY_REMAINING: &str = "x-ratelimit-daily-remaining";
/// Daily reset time (seconds since epoch)
pub const HEADER_DAILY_RESET: &str = "x-ratelimit-daily-reset";

/// Quota counters for the calling credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitInfo {
    /// Requests allowed in the current window
    pub limit: u64,
    /// Requests left in the current window
    pub remaining: u64,
    /// Window reset, seconds since the Unix epoch
    pub reset: i64,
    /// Requests allowed per day
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_limit: Option<u64>,
    /// Requests left today
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_remaining: Option<u64>,
    /// Daily reset, seconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_reset: Option<i64>,
}

impl RateLimitInfo {
    /// Create a record with only the primary window counters
    pub fn new(limit: u64, remaining: u64, reset: i64) -> Self {
        Self {
            limit,
            remaining,
            reset,
            daily_limit: None,
            daily_remaining: None,
            daily_reset: None,
        }
    }

    /// Parse from response headers through a case-insensitive lookup
    ///
    /// `lookup` receives lowercase header names. Returns `None` unless all of
    /// limit, remaining and reset are present and numeric; the daily fields
    /// are picked up independently when present.
    pub fn from_header_lookup<'a, F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let limit = parse_header::<u64>(lookup(HEADER_LIMIT))?;
        let remaining = parse_header::<u64>(lookup(HEADER_REMAINING))?;
        let reset = parse_header::<i64>(lookup(HEADER_RESET))?;

        Some(Self {
            limit,
            remaining,
            reset,
            daily_limit: parse_header(lookup(HEADER_DAILY_LIMIT)),
            daily_remaining: parse_header(lookup(HEADER_DAILY_REMAINING)),
            daily_reset: parse_header(lookup(HEADER_DAILY_RESET)),
        })
    }

    /// No requests left in the current window
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Seconds until the window resets, relative to `now` (epoch seconds)
    pub fn seconds_until_reset(&self, now: i64) -> u64 {
        (self.reset - now).max(0) as u64
    }
}

fn parse_header<T: std::str::FromStr>(value: Option<&str>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}
