//! Read-only venue check run before enabling live trading

use crate::data::TradingPair;
use crate::exchange::Venue;
use rust_decimal::Decimal;
use tracing::{info, warn};

/// Outcome of probing one venue; never places an order
#[derive(Debug, Clone)]
pub struct ConnectivityReport {
    pub venue: String,
    pub price: std::result::Result<f64, String>,
    pub balance: std::result::Result<Decimal, String>,
}

impl ConnectivityReport {
    pub fn is_healthy(&self) -> bool {
        self.price.is_ok() && self.balance.is_ok()
    }
}

/// Fetch the current price and the quote balance
pub async fn check_connectivity(venue: &dyn Venue, pair: &TradingPair) -> ConnectivityReport {
    let price = venue
        .get_current_price(pair)
        .await
        .map_err(|e| e.to_string());
    let balance = venue
        .get_available_balance(&pair.quote)
        .await
        .map_err(|e| e.to_string());

    let report = ConnectivityReport {
        venue: venue.name().to_string(),
        price,
        balance,
    };
    if report.is_healthy() {
        info!("✅ {} reachable", report.venue);
    } else {
        warn!("⚠️ {} connectivity check failed: {:?}", report.venue, report);
    }
    report
}
