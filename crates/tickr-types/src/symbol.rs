//! Trading pair symbols and streaming channel names
//!
//! Symbols are normalized as `BASE/QUOTE`. Paths and channel names can't
//! carry a slash, so they use a dash instead (`BTC/USDT` <-> `BTC-USDT`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Convert a normalized symbol to its URL/channel form (`BTC/USDT` -> `BTC-USDT`)
pub fn symbol_to_url(symbol: &str) -> String {
    symbol.replace('/', "-")
}

/// Convert a URL/channel symbol back to normalized form (`BTC-USDT` -> `BTC/USDT`)
pub fn symbol_from_url(symbol: &str) -> String {
    symbol.replace('-', "/")
}

/// Trading pair symbol in `BASE/QUOTE` form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Create a symbol without validation
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the symbol as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base currency (`BTC` in `BTC/USDT`)
    pub fn base(&self) -> Option<&str> {
        self.0.split('/').next()
    }

    /// Quote currency (`USDT` in `BTC/USDT`)
    pub fn quote(&self) -> Option<&str> {
        self.0.split('/').nth(1)
    }

    /// URL/channel form of this symbol
    pub fn to_url(&self) -> String {
        symbol_to_url(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = SymbolParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [base, quote] if !base.is_empty() && !quote.is_empty() => Ok(Self(s.to_string())),
            [_, _] => Err(SymbolParseError::EmptyPart(s.to_string())),
            [_] => Err(SymbolParseError::MissingSlash(s.to_string())),
            _ => Err(SymbolParseError::InvalidFormat(s.to_string())),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Error parsing a symbol or channel name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolParseError {
    #[error("symbol must contain '/': {0}")]
    MissingSlash(String),

    #[error("invalid symbol format: {0}")]
    InvalidFormat(String),

    #[error("symbol has empty base or quote: {0}")]
    EmptyPart(String),

    #[error("invalid channel name: {0}")]
    InvalidChannel(String),
}

/// Streaming channel identifier
///
/// `ticker:{exchange}:{BASE-QUOTE}` for one pair, `ticker:{exchange}` for
/// every pair on the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Ticker updates for one pair, or the whole exchange when `symbol` is `None`
    Ticker {
        exchange: String,
        /// Normalized `BASE/QUOTE` symbol
        symbol: Option<String>,
    },
}

impl Channel {
    /// Ticker channel for a single pair
    pub fn ticker(exchange: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self::Ticker {
            exchange: exchange.into(),
            symbol: Some(symbol.into()),
        }
    }

    /// Ticker channel for every pair on an exchange
    pub fn exchange_tickers(exchange: impl Into<String>) -> Self {
        Self::Ticker {
            exchange: exchange.into(),
            symbol: None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ticker {
                exchange,
                symbol: Some(symbol),
            } => write!(f, "ticker:{}:{}", exchange, symbol_to_url(symbol)),
            Self::Ticker {
                exchange,
                symbol: None,
            } => write!(f, "ticker:{}", exchange),
        }
    }
}

impl FromStr for Channel {
    type Err = SymbolParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("ticker"), Some(exchange), None) if !exchange.is_empty() => {
                Ok(Self::exchange_tickers(exchange))
            }
            (Some("ticker"), Some(exchange), Some(symbol))
                if !exchange.is_empty() && !symbol.is_empty() =>
            {
                Ok(Self::ticker(exchange, symbol_from_url(symbol)))
            }
            _ => Err(SymbolParseError::InvalidChannel(s.to_string())),
        }
    }
}

impl From<Channel> for String {
    fn from(channel: Channel) -> Self {
        channel.to_string()
    }
}

/// Channel name for one pair's tickers (`ticker:binance:BTC-USDT`)
pub fn ticker_channel(exchange: &str, symbol: &str) -> String {
    Channel::ticker(exchange, symbol).to_string()
}

/// Channel name for every ticker on an exchange (`ticker:binance`)
pub fn exchange_ticker_channel(exchange: &str) -> String {
    Channel::exchange_tickers(exchange).to_string()
}
