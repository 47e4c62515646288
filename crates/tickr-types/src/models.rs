//! Resource records returned by the REST API
//!
//! Plain data carriers. Fields the API may omit are optional so a sparse
//! response still deserializes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exchange {
    /// Exchange id used in paths and channels (e.g. `binance`)
    pub id: String,
    /// Display name
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub countries: Vec<String>,
    /// Whether live data is currently collected
    #[serde(default)]
    pub active: Option<bool>,
}

/// Tradable market on an exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    /// Normalized `BASE/QUOTE` symbol
    pub symbol: String,
    pub base: String,
    pub quote: String,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    /// Price precision in decimal places
    #[serde(default)]
    pub price_precision: Option<u32>,
    /// Amount precision in decimal places
    #[serde(default)]
    pub amount_precision: Option<u32>,
}

/// Ticker snapshot returned by the REST API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker {
    pub exchange: String,
    /// Normalized `BASE/QUOTE` symbol
    pub symbol: String,
    #[serde(default)]
    pub last: Option<Decimal>,
    #[serde(default)]
    pub bid: Option<Decimal>,
    #[serde(default)]
    pub ask: Option<Decimal>,
    #[serde(default)]
    pub high: Option<Decimal>,
    #[serde(default)]
    pub low: Option<Decimal>,
    #[serde(default)]
    pub volume: Option<Decimal>,
    #[serde(default)]
    pub quote_volume: Option<Decimal>,
    #[serde(default)]
    pub change: Option<Decimal>,
    #[serde(default)]
    pub percentage: Option<Decimal>,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// OHLCV candle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ohlcv {
    /// Candle open time, milliseconds since the Unix epoch
    pub timestamp: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Ohlcv {
    /// True when the candle closed above its open
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// High minus low
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }
}

/// Service health report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    /// `ok` when the service is healthy
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
    /// Server time, milliseconds since the Unix epoch
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

/// Candle interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "1w")]
    W1,
}

impl Timeframe {
    /// Query-string form (`1m`, `1h`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::M30 => "30m",
            Self::H1 => "1h",
            Self::H4 => "4h",
            Self::D1 => "1d",
            Self::W1 => "1w",
        }
    }

    /// Interval length in minutes
    pub fn as_minutes(&self) -> u32 {
        match self {
            Self::M1 => 1,
            Self::M5 => 5,
            Self::M15 => 15,
            Self::M30 => 30,
            Self::H1 => 60,
            Self::H4 => 240,
            Self::D1 => 1440,
            Self::W1 => 10080,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
