//! Wire messages for the streaming API
//!
//! Every frame is a JSON object with a `type` discriminator.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// Server -> client
// ============================================================================

/// Message received from the streaming server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Handshake: the session is ready for subscriptions
    Connected {
        /// Plan tier of the credential
        #[serde(default)]
        tier: String,
        /// Connection limits for this tier
        #[serde(default)]
        limits: ConnectionLimits,
    },
    /// Live ticker update
    Ticker(TickerUpdate),
    /// Subscription confirmed
    Subscribed { channel: String },
    /// Unsubscription confirmed
    Unsubscribed { channel: String },
    /// Application-level error; the connection stays open
    Error {
        #[serde(default, deserialize_with = "string_or_number")]
        code: String,
        #[serde(default)]
        message: String,
    },
    /// Heartbeat acknowledgement
    Pong {
        #[serde(default)]
        timestamp: Option<i64>,
    },
}

impl ServerMessage {
    /// Parse a text frame
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Limits announced in the handshake
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionLimits {
    /// Maximum concurrent channel subscriptions
    #[serde(default)]
    pub max_subscriptions: Option<u32>,
}

/// Ticker update for one pair on one exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerUpdate {
    /// Exchange id (e.g. `binance`)
    pub exchange: String,
    /// Normalized `BASE/QUOTE` symbol
    pub symbol: String,
    /// Price statistics
    pub data: TickData,
    /// Server timestamp, milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// Price statistics carried by a ticker update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickData {
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
    pub open: Option<Decimal>,
    /// Base-currency volume over 24h
    #[serde(default)]
    pub volume: Option<Decimal>,
    /// Quote-currency volume over 24h
    #[serde(default)]
    pub quote_volume: Option<Decimal>,
    /// Absolute change over 24h
    #[serde(default)]
    pub change: Option<Decimal>,
    /// Percentage change over 24h
    #[serde(default)]
    pub percentage: Option<Decimal>,
}

impl TickData {
    /// Bid/ask spread, when both sides are known
    pub fn spread(&self) -> Option<Decimal> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

// ============================================================================
// Client -> server
// ============================================================================

/// Message sent to the streaming server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Subscribe to channels
    Subscribe { channels: Vec<String> },
    /// Unsubscribe from channels
    Unsubscribe { channels: Vec<String> },
    /// Heartbeat
    Ping,
}

impl ClientMessage {
    /// Serialize to a text frame
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_handshake() {
        let msg = ServerMessage::parse(
            r#"{"type":"connected","tier":"pro","limits":{"maxSubscriptions":250}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ServerMessage::Connected {
                tier: "pro".into(),
                limits: ConnectionLimits {
                    max_subscriptions: Some(250)
                },
            }
        );
    }

    #[test]
    fn test_parse_ticker() {
        let msg = ServerMessage::parse(
            r#"{
                "type": "ticker",
                "exchange": "binance",
                "symbol": "BTC/USDT",
                "data": {"last": 64250.5, "bid": "64250.1", "ask": 64251, "quoteVolume": 1200.25},
                "timestamp": 1718000000000
            }"#,
        )
        .unwrap();

        let ServerMessage::Ticker(update) = msg else {
            panic!("expected ticker");
        };
        assert_eq!(update.exchange, "binance");
        assert_eq!(update.data.last, Some(dec!(64250.5)));
        assert_eq!(update.data.quote_volume, Some(dec!(1200.25)));
        assert_eq!(update.data.spread(), Some(dec!(0.9)));
        assert_eq!(update.timestamp, 1_718_000_000_000);
    }

    #[test]
    fn test_parse_error_with_numeric_code() {
        let msg = ServerMessage::parse(r#"{"type":"error","code":4003,"message":"bad channel"}"#)
            .unwrap();
        assert_eq!(
            msg,
            ServerMessage::Error {
                code: "4003".into(),
                message: "bad channel".into()
            }
        );
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(ServerMessage::parse(r#"{"type":"book","data":[]}"#).is_err());
        assert!(ServerMessage::parse("not json").is_err());
    }

    #[test]
    fn test_client_message_wire_format() {
        let sub = ClientMessage::Subscribe {
            channels: vec!["ticker:binance:BTC-USDT".into()],
        };
        assert_eq!(
            sub.to_json().unwrap(),
            r#"{"type":"subscribe","channels":["ticker:binance:BTC-USDT"]}"#
        );
        assert_eq!(ClientMessage::Ping.to_json().unwrap(), r#"{"type":"ping"}"#);
    }
}
