//! Channel subscription bookkeeping
//!
//! A channel is *pending* from the moment it is requested until the server
//! confirms it, then *active*. When the connection drops, active channels go
//! back to pending so they are re-sent after the next handshake.

use std::collections::BTreeSet;

/// Pending and confirmed channel sets
#[derive(Debug, Default, Clone)]
pub struct SubscriptionTracker {
    pending: BTreeSet<String>,
    active: BTreeSet<String>,
}

impl SubscriptionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record channels as requested
    ///
    /// A channel that is already active stays active and is also pending until
    /// the server confirms the new request.
    pub fn request<I, S>(&mut self, channels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending.extend(channels.into_iter().map(Into::into));
    }

    /// Server confirmed `channel`
    ///
    /// Returns false, leaving the sets untouched, unless the channel was pending.
    pub fn confirm(&mut self, channel: &str) -> bool {
        if self.pending.remove(channel) {
            self.active.insert(channel.to_string());
            true
        } else {
            false
        }
    }

    /// Drop channels from both sets
    pub fn remove<'a, I>(&mut self, channels: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for channel in channels {
            self.pending.remove(channel);
            self.active.remove(channel);
        }
    }

    /// Connection lost: everything active must be re-sent
    pub fn requeue_active(&mut self) {
        let active = std::mem::take(&mut self.active);
        self.pending.extend(active);
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.active.clear();
    }

    /// Requested but not yet confirmed, in sorted order
    pub fn pending(&self) -> Vec<String> {
        self.pending.iter().cloned().collect()
    }

    /// Confirmed by the server, in sorted order
    pub fn active(&self) -> Vec<String> {
        self.active.iter().cloned().collect()
    }

    pub fn is_pending(&self, channel: &str) -> bool {
        self.pending.contains(channel)
    }

    pub fn is_active(&self, channel: &str) -> bool {
        self.active.contains(channel)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_then_confirm() {
        let mut subs = SubscriptionTracker::new();
        subs.request(["ticker:binance:BTC-USDT", "ticker:kraken"]);
        assert_eq!(subs.pending().len(), 2);
        assert!(subs.active().is_empty());

        assert!(subs.confirm("ticker:kraken"));
        assert!(subs.is_active("ticker:kraken"));
        assert!(!subs.is_pending("ticker:kraken"));
        assert_eq!(subs.pending(), vec!["ticker:binance:BTC-USDT".to_string()]);
    }

    #[test]
    fn test_unrequested_confirmation_is_ignored() {
        let mut subs = SubscriptionTracker::new();
        assert!(!subs.confirm("ticker:binance"));
        assert!(subs.active().is_empty());

        // Duplicate confirmation
        subs.request(["ticker:kraken"]);
        assert!(subs.confirm("ticker:kraken"));
        assert!(!subs.confirm("ticker:kraken"));
        assert!(subs.is_active("ticker:kraken"));
    }

    #[test]
    fn test_remove_clears_both_sets() {
        let mut subs = SubscriptionTracker::new();
        subs.request(["a", "b"]);
        subs.confirm("a");
        subs.remove(["a", "b"]);
        assert!(subs.pending().is_empty());
        assert!(subs.active().is_empty());
    }

    #[test]
    fn test_requeue_moves_active_to_pending() {
        let mut subs = SubscriptionTracker::new();
        subs.request(["a", "b"]);
        subs.confirm("a");
        subs.requeue_active();
        assert_eq!(subs.pending(), vec!["a".to_string(), "b".to_string()]);
        assert!(subs.active().is_empty());
    }

    #[test]
    fn test_rerequest_of_active_channel() {
        let mut subs = SubscriptionTracker::new();
        subs.request(["a"]);
        subs.confirm("a");
        subs.request(["a"]);
        assert!(subs.is_active("a"));
        assert!(subs.is_pending("a"));

        assert!(subs.confirm("a"));
        assert!(!subs.has_pending());
    }
}
