//! The capability surface every trading venue implements

use crate::data::{PricePoint, TradingPair};
use crate::error::{DcaError, Result};
use crate::exchange::{ClientOrderId, OrderAck};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// A trading venue.
///
/// Read operations are side-effect free and safe to retry. `place_market_buy`
/// is the only write; implementations must forward `client_order_id` so a
/// retried call cannot produce a second fill.
#[async_trait]
pub trait Venue: Send + Sync {
    /// Lowercase venue name used in records and logs
    fn name(&self) -> &str;

    /// Daily closes with `start <= date <= end`, in any order
    async fn fetch_daily_prices(
        &self,
        pair: &TradingPair,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>>;

    /// Last traded price
    async fn get_current_price(&self, pair: &TradingPair) -> Result<f64>;

    /// Free (unlocked) balance of `currency`
    async fn get_available_balance(&self, currency: &str) -> Result<Decimal>;

    /// Market buy spending `quote_amount` of the pair's quote currency
    async fn place_market_buy(
        &self,
        pair: &TradingPair,
        quote_amount: Decimal,
        client_order_id: &ClientOrderId,
    ) -> Result<OrderAck>;

    /// Order previously placed with `client_order_id`, if the venue has one.
    ///
    /// Filled market orders are no longer open, so venues accept their token
    /// again; callers look up before re-placing.
    async fn find_order(
        &self,
        pair: &TradingPair,
        client_order_id: &ClientOrderId,
    ) -> Result<Option<OrderAck>>;
}

/// Supported venues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VenueKind {
    Binance,
    Okx,
    Bitget,
}

impl VenueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VenueKind::Binance => "binance",
            VenueKind::Okx => "okx",
            VenueKind::Bitget => "bitget",
        }
    }

    /// Whether API credentials need a passphrase
    pub fn needs_passphrase(&self) -> bool {
        matches!(self, VenueKind::Okx | VenueKind::Bitget)
    }
}

impl fmt::Display for VenueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VenueKind {
    type Err = DcaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "binance" | "binance_spot" => Ok(Self::Binance),
            "okx" | "okex" | "okx_spot" => Ok(Self::Okx),
            "bitget" | "bitget_spot" => Ok(Self::Bitget),
            other => Err(DcaError::Config(format!("Unsupported venue: {}", other))),
        }
    }
}

/// API key material for a venue
#[derive(Clone, Default)]
pub struct VenueCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: Option<String>,
}

impl VenueCredentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            passphrase: None,
        }
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn is_complete(&self, kind: VenueKind) -> bool {
        let has_passphrase = self.passphrase.as_deref().is_some_and(|p| !p.is_empty());
        !self.api_key.is_empty()
            && !self.api_secret.is_empty()
            && (!kind.needs_passphrase() || has_passphrase)
    }
}

impl fmt::Debug for VenueCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VenueCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "***"))
            .finish()
    }
}

/// HTTP client settings shared by the REST venues
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Override of the venue's production endpoint
    pub base_url: Option<String>,
    pub timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl HttpSettings {
    pub(crate) fn client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| DcaError::Config(format!("failed to build HTTP client: {}", e)))
    }

    pub(crate) fn base_url_or(&self, default: &str) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }
}
