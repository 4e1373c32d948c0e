use crate::state::{AppState, HandlerResult};
use ahr999_rs::exchange::{build_venue, check_connectivity, VenueKind};
use anyhow::{anyhow, bail};

/// Check one configured venue: ticker and quote balance, no orders
pub async fn handle_test_venue(state: &AppState, name: &str) -> HandlerResult {
    let kind: VenueKind = name.parse()?;
    let settings = state.config.venue(kind).ok_or_else(|| {
        anyhow!(
            "{} is not configured; AHR_VENUES is {}",
            kind,
            state.config.venue_names().join(",")
        )
    })?;
    tracing::info!("Testing connectivity to {}", kind);

    let venue = build_venue(kind, settings.credentials.clone(), settings.http.clone())?;
    let pair = state.config.symbol();
    let report = check_connectivity(venue.as_ref(), pair).await;

    println!("🔌 {} connectivity", report.venue);
    match &report.price {
        Ok(price) => println!("  ✅ {} price: {}", pair, price),
        Err(e) => println!("  ❌ {} price: {}", pair, e),
    }
    match &report.balance {
        Ok(balance) => println!("  ✅ free {}: {}", pair.quote, balance),
        Err(e) => println!("  ❌ free {}: {}", pair.quote, e),
    }

    if !report.is_healthy() {
        bail!("{} failed the connectivity check", report.venue);
    }
    Ok(())
}
