//! API key handling
//!
//! The key is held in a `secrecy` box: it is zeroized on drop and its
//! `Debug` output is redacted, so it cannot leak through logs or error values.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::Arc;

/// Environment variable read by `from_env` constructors
pub const API_KEY_ENV: &str = "TICKR_API_KEY";

/// API key for the pricing service
#[derive(Clone)]
pub struct ApiKey(Arc<SecretString>);

impl ApiKey {
    /// Wrap a key
    pub fn new(key: impl Into<String>) -> Self {
        Self(Arc::new(SecretString::from(key.into())))
    }

    /// Read the key from `TICKR_API_KEY`
    pub fn from_env() -> Option<Self> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(Self::new)
    }

    /// `Bearer <key>` header value
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0.expose_secret())
    }

    /// True if the key is empty or whitespace
    pub fn is_blank(&self) -> bool {
        self.0.expose_secret().trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}
