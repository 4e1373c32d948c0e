//! Venue construction from configuration

use crate::error::{DcaError, Result};
use crate::exchange::{
    BinanceVenue, BitgetVenue, HttpSettings, OkxVenue, Venue, VenueCredentials, VenueKind,
};
use std::sync::Arc;
use tracing::info;

/// Build a trading-enabled adapter.
///
/// Incomplete credentials are a configuration error: an OKX or Bitget key
/// without its passphrase fails here rather than on the first signed call.
pub fn build_venue(
    kind: VenueKind,
    credentials: VenueCredentials,
    http: HttpSettings,
) -> Result<Arc<dyn Venue>> {
    if !credentials.is_complete(kind) {
        let needed = if kind.needs_passphrase() {
            "api key, secret and passphrase"
        } else {
            "api key and secret"
        };
        return Err(DcaError::Config(format!("{} requires {}", kind, needed)));
    }

    let venue: Arc<dyn Venue> = match kind {
        VenueKind::Binance => Arc::new(BinanceVenue::new(credentials, http)?),
        VenueKind::Okx => Arc::new(OkxVenue::new(credentials, http)?),
        VenueKind::Bitget => Arc::new(BitgetVenue::new(credentials, http)?),
    };
    info!("✅ {} venue initialized", kind);
    Ok(venue)
}

/// Build an adapter limited to public market data
pub fn build_market_data_venue(kind: VenueKind, http: HttpSettings) -> Result<Arc<dyn Venue>> {
    let venue: Arc<dyn Venue> = match kind {
        VenueKind::Binance => Arc::new(BinanceVenue::public(http)?),
        VenueKind::Okx => Arc::new(OkxVenue::public(http)?),
        VenueKind::Bitget => Arc::new(BitgetVenue::public(http)?),
    };
    Ok(venue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_venue_names() {
        let creds = VenueCredentials::new("key", "secret").with_passphrase("pass");
        for kind in [VenueKind::Binance, VenueKind::Okx, VenueKind::Bitget] {
            let venue = build_venue(kind, creds.clone(), HttpSettings::default()).unwrap();
            assert_eq!(venue.name(), kind.as_str());
        }
    }

    #[test]
    fn test_missing_passphrase_rejected() {
        let result = build_venue(
            VenueKind::Okx,
            VenueCredentials::new("key", "secret"),
            HttpSettings::default(),
        );
        assert!(matches!(result, Err(DcaError::Config(_))));
    }

    #[test]
    fn test_market_data_venue_needs_no_credentials() {
        let venue = build_market_data_venue(VenueKind::Bitget, HttpSettings::default()).unwrap();
        assert_eq!(venue.name(), "bitget");
    }
}
