//! Shared types for the Tickr cryptocurrency pricing API
//!
//! This crate provides the core type definitions used across the Tickr SDK.
//! It has no networking dependencies and can be used independently.
//!
//! # Key Types
//!
//! - [`SdkError`], [`ErrorCode`] - The single error type and its taxonomy
//! - [`RateLimitInfo`] - Server-reported quota counters
//! - [`Symbol`], [`Channel`] - Trading pairs and streaming channel names
//! - [`ServerMessage`], [`ClientMessage`] - Streaming wire messages
//! - [`Exchange`], [`Market`], [`Ticker`], [`Ohlcv`] - REST resource records
//! - [`ApiKey`] - Redacted credential wrapper

pub mod credentials;
pub mod error;
pub mod messages;
pub mod models;
pub mod rate_limit;
pub mod symbol;

// Re-export commonly used types
pub use credentials::*;
pub use error::*;
pub use messages::*;
pub use models::*;
pub use rate_limit::*;
pub use symbol::*;

// Re-export rust_decimal for users
pub use rust_decimal::Decimal;
