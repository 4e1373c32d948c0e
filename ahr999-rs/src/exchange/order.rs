//! Order identifiers and acknowledgements

use crate::data::TradingPair;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Caller-chosen idempotency token sent with every market buy.
///
/// Derived from (pair, venue, date) so a retry, or a re-run later the same day,
/// presents the same token. Venues only reject a duplicate while the first
/// order is open, so re-placement is preceded by a lookup of the token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientOrderId(String);

impl ClientOrderId {
    /// Deterministic 32-character alphanumeric id, accepted by all supported venues
    pub fn for_run(pair: &TradingPair, venue: &str, date: NaiveDate) -> Self {
        let key = format!("ahr999:{}:{}:{}", pair, venue.to_lowercase(), date);
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).simple().to_string())
    }

    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Venue confirmation of an accepted market buy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    /// Venue-assigned order id
    pub order_id: String,
    /// Token the order was placed with
    pub client_order_id: ClientOrderId,
    /// True when the order was found by its token instead of being placed
    /// by this call
    pub recovered: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_order_id_is_deterministic() {
        let pair = TradingPair::new("BTC", "USDT");
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let a = ClientOrderId::for_run(&pair, "binance", date);
        let b = ClientOrderId::for_run(&pair, "Binance", date);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_client_order_id_differs_per_venue_and_day() {
        let pair = TradingPair::new("BTC", "USDT");
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let next = date.succ_opt().unwrap();
        assert_ne!(
            ClientOrderId::for_run(&pair, "binance", date),
            ClientOrderId::for_run(&pair, "okx", date)
        );
        assert_ne!(
            ClientOrderId::for_run(&pair, "binance", date),
            ClientOrderId::for_run(&pair, "binance", next)
        );
    }
}
