//! Error types for the Tickr SDK
//!
//! Every failure surfaced to callers is an [`SdkError`]. The error carries a
//! fixed [`ErrorCode`] discriminator instead of a hierarchy of error types, so
//! call sites branch on `error.code()` and retry logic asks
//! [`SdkError::is_retryable`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rate_limit::RateLimitInfo;

/// Boxed underlying error kept as the `source` of an [`SdkError`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error taxonomy shared by the REST pipeline and the streaming session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Missing or rejected credentials (HTTP 401)
    Auth,
    /// Resource does not exist (HTTP 404)
    NotFound,
    /// Request parameters rejected (HTTP 400)
    Validation,
    /// Server-side throttling (HTTP 429)
    RateLimit,
    /// The request deadline expired
    Timeout,
    /// Transport failure: DNS, connect, reset, unreadable body
    Network,
    /// Server failure (HTTP 5xx)
    Server,
    /// Anything not classified above
    #[default]
    Unknown,
}

impl ErrorCode {
    /// Wire name of the code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::RateLimit => "rate_limit",
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::Server => "server",
            Self::Unknown => "unknown",
        }
    }

    /// Codes that are retried without looking at the HTTP status
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::Network | Self::Timeout | Self::Server
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCode {
    type Err = UnknownErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auth" => Ok(Self::Auth),
            "not_found" => Ok(Self::NotFound),
            "validation" => Ok(Self::Validation),
            "rate_limit" => Ok(Self::RateLimit),
            "timeout" => Ok(Self::Timeout),
            "network" => Ok(Self::Network),
            "server" => Ok(Self::Server),
            "unknown" => Ok(Self::Unknown),
            other => Err(UnknownErrorCode(other.to_string())),
        }
    }
}

/// Returned when parsing an unrecognised error code name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown error code: {0}")]
pub struct UnknownErrorCode(pub String);

/// The single error type returned by every SDK operation
///
/// Construction never performs I/O and never fails. Only the optional fields
/// relevant to the code are populated: `retry_after_seconds` only accompanies
/// [`ErrorCode::RateLimit`], `timeout_ms` only [`ErrorCode::Timeout`], and so on.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SdkError {
    message: String,
    code: ErrorCode,
    status: Option<u16>,
    correlation_id: Option<String>,
    rate_limit_info: Option<RateLimitInfo>,
    retry_after_seconds: Option<u64>,
    details: Option<HashMap<String, serde_json::Value>>,
    timeout_ms: Option<u64>,
    #[source]
    cause: Option<BoxError>,
}

impl SdkError {
    /// Create an error with code [`ErrorCode::Unknown`]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: ErrorCode::Unknown,
            status: None,
            correlation_id: None,
            rate_limit_info: None,
            retry_after_seconds: None,
            details: None,
            timeout_ms: None,
            cause: None,
        }
    }

    /// Credentials missing or rejected
    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(message).with_code(ErrorCode::Auth)
    }

    /// Resource not found
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message).with_code(ErrorCode::NotFound)
    }

    /// Request rejected as invalid, with optional field-level details
    pub fn validation(
        message: impl Into<String>,
        details: Option<HashMap<String, serde_json::Value>>,
    ) -> Self {
        let mut err = Self::new(message).with_code(ErrorCode::Validation);
        err.details = details;
        err
    }

    /// Throttled by the server
    pub fn rate_limited(
        message: impl Into<String>,
        retry_after_seconds: u64,
        rate_limit_info: Option<RateLimitInfo>,
    ) -> Self {
        let mut err = Self::new(message).with_code(ErrorCode::RateLimit);
        err.retry_after_seconds = Some(retry_after_seconds);
        err.rate_limit_info = rate_limit_info;
        err
    }

    /// The request deadline expired
    pub fn timeout(timeout: Duration) -> Self {
        let timeout_ms = timeout.as_millis() as u64;
        let mut err = Self::new(format!("Request timed out after {}ms", timeout_ms))
            .with_code(ErrorCode::Timeout);
        err.timeout_ms = Some(timeout_ms);
        err
    }

    /// Transport-level failure
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(message).with_code(ErrorCode::Network)
    }

    /// Server-side failure
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(message).with_code(ErrorCode::Server)
    }

    /// Set the error code
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = code;
        self
    }

    /// Attach the HTTP status that produced this error
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach the server-side correlation id
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Keep the underlying error as `source()`
    pub fn with_cause(mut self, cause: impl Into<BoxError>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Human-readable message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Error classification
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// HTTP status, when the error came from a response
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Correlation id reported by the server
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Quota counters attached to a rate-limit error
    pub fn rate_limit_info(&self) -> Option<&RateLimitInfo> {
        self.rate_limit_info.as_ref()
    }

    /// Server retry hint in seconds (rate-limit errors only)
    pub fn retry_after_seconds(&self) -> Option<u64> {
        self.retry_after_seconds
    }

    /// Server retry hint as a duration
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after_seconds.map(Duration::from_secs)
    }

    /// Validation details returned by the server
    pub fn details(&self) -> Option<&HashMap<String, serde_json::Value>> {
        self.details.as_ref()
    }

    /// Configured deadline that expired (timeout errors only)
    pub fn timeout_ms(&self) -> Option<u64> {
        self.timeout_ms
    }

    /// Returns true if retrying the same request may succeed
    ///
    /// Transient codes are always retryable. An unclassified error falls back
    /// to its HTTP status: 408, 429 and any 5xx are retryable.
    pub fn is_retryable(&self) -> bool {
        if self.code.is_transient() {
            return true;
        }
        if self.code == ErrorCode::Unknown {
            if let Some(status) = self.status {
                return status == 408 || status == 429 || status >= 500;
            }
        }
        false
    }

    /// Returns true if this is a rate-limit error
    pub fn is_rate_limit(&self) -> bool {
        self.code == ErrorCode::RateLimit
    }

    /// Returns true if `err` is an [`SdkError`]
    pub fn is_sdk_error(err: &(dyn std::error::Error + 'static)) -> bool {
        err.downcast_ref::<SdkError>().is_some()
    }

    /// Walk the `source()` chain and return the first [`SdkError`] found
    pub fn find_in_chain<'a>(
        err: &'a (dyn std::error::Error + 'static),
    ) -> Option<&'a SdkError> {
        let mut current = Some(err);
        while let Some(e) = current {
            if let Some(sdk) = e.downcast_ref::<SdkError>() {
                return Some(sdk);
            }
            current = e.source();
        }
        None
    }
}

/// Free-function form of [`SdkError::is_retryable`]
pub fn is_retryable(err: &SdkError) -> bool {
    err.is_retryable()
}

/// Result type alias for SDK operations
pub type SdkResult<T> = Result<T, SdkError>;
