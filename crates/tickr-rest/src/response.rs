//! Response inspection: rate-limit headers and HTTP failure mapping

use std::collections::HashMap;

use reqwest::header::HeaderMap;
use serde_json::Value;
use tickr_types::{RateLimitInfo, SdkError};

use crate::transport::HttpResponse;

/// Header carrying the server retry hint on 429 responses
pub const RETRY_AFTER_HEADER: &str = "retry-after";

/// Retry hint assumed when a 429 carries no usable `Retry-After`
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Parse `X-RateLimit-*` headers
///
/// `None` unless limit, remaining and reset are all present and numeric.
pub fn parse_rate_limit_headers(headers: &HeaderMap) -> Option<RateLimitInfo> {
    RateLimitInfo::from_header_lookup(|name| headers.get(name).and_then(|v| v.to_str().ok()))
}

/// Build the error for a non-2xx response
///
/// | status | code |
/// |---|---|
/// | 400 | `validation` (details from the body) |
/// | 401 | `auth` |
/// | 404 | `not_found` |
/// | 429 | `rate_limit` |
/// | 5xx | `server` |
/// | other | `unknown` |
///
/// A body that is empty or not JSON is treated as absent.
pub fn error_from_response(response: &HttpResponse) -> SdkError {
    let body: Option<Value> = serde_json::from_str(&response.body).ok();
    let body = body.as_ref().and_then(Value::as_object);

    let message = body
        .and_then(|b| b.get("message"))
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .or_else(|| {
            Some(response.status_text.trim())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("Request failed with status {}", response.status));

    let status = response.status;
    let mut error = match status {
        400 => {
            let details = body
                .and_then(|b| b.get("details"))
                .and_then(Value::as_object)
                .map(|d| d.iter().map(|(k, v)| (k.clone(), v.clone())).collect::<HashMap<_, _>>());
            SdkError::validation(message, details)
        }
        401 => SdkError::auth(message),
        404 => SdkError::not_found(message),
        429 => {
            let retry_after = response
                .header(RETRY_AFTER_HEADER)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);

            let info = parse_rate_limit_headers(&response.headers).unwrap_or_else(|| {
                let limit = body
                    .and_then(|b| b.get("limit"))
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                let reset = i64::try_from(retry_after)
                    .ok()
                    .and_then(|secs| chrono::Utc::now().timestamp().checked_add(secs))
                    .unwrap_or(i64::MAX);
                RateLimitInfo::new(limit, 0, reset)
            });

            SdkError::rate_limited(message, retry_after, Some(info))
        }
        500..=599 => SdkError::server(message),
        _ => SdkError::new(message),
    }
    .with_status(status);

    if let Some(id) = body
        .and_then(|b| b.get("correlationId"))
        .and_then(Value::as_str)
    {
        error = error.with_correlation_id(id);
    }

    error
}
