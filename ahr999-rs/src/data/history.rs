//! Daily price history fetching and validation

use crate::config::RetryPolicy;
use crate::data::{PriceSeries, SeriesDefect, TradingPair};
use crate::error::{DcaError, Result};
use crate::exchange::Venue;
use crate::execution::Shutdown;
use chrono::{Duration, NaiveDate};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fetches daily closes from a venue's public market data.
///
/// Every series it returns ends at the most recent fully closed day
/// (`as_of - 1`) and its newest `n` points are consecutive. A defective
/// response is re-fetched under the retry policy, then reported as
/// [`DcaError::DataUnavailable`].
pub struct PriceHistoryProvider {
    venue: Arc<dyn Venue>,
    retry: RetryPolicy,
}

impl PriceHistoryProvider {
    pub fn new(venue: Arc<dyn Venue>, retry: RetryPolicy) -> Self {
        Self { venue, retry }
    }

    pub fn venue_name(&self) -> &str {
        self.venue.name()
    }

    /// Exactly `n` consecutive closes ending the day before `as_of`, oldest first
    pub async fn trailing_window(
        &self,
        pair: &TradingPair,
        n: usize,
        as_of: NaiveDate,
        shutdown: &Shutdown,
    ) -> Result<PriceSeries> {
        let end = last_closed_day(as_of);
        let start = i64::try_from(n.saturating_sub(1))
            .ok()
            .and_then(Duration::try_days)
            .and_then(|back| end.checked_sub_signed(back))
            .ok_or_else(|| DcaError::DataUnavailable(format!("{} day window before {} is out of range", n, end)))?;
        let series = self.fetch_validated(pair, start, end, n, shutdown).await?;
        Ok(series.tail(n))
    }

    /// Every close from `since` to the day before `as_of`; the newest `n` are
    /// guaranteed consecutive, older history may have holes
    pub async fn history_since(
        &self,
        pair: &TradingPair,
        since: NaiveDate,
        n: usize,
        as_of: NaiveDate,
        shutdown: &Shutdown,
    ) -> Result<PriceSeries> {
        let end = last_closed_day(as_of);
        if since > end {
            return Err(DcaError::DataUnavailable(format!(
                "history start {} is after {}",
                since, end
            )));
        }
        self.fetch_validated(pair, since, end, n, shutdown).await
    }

    async fn fetch_validated(
        &self,
        pair: &TradingPair,
        start: NaiveDate,
        end: NaiveDate,
        n: usize,
        shutdown: &Shutdown,
    ) -> Result<PriceSeries> {
        let attempts = self.retry.attempts();
        let venue = self.venue.name();
        let mut attempt = 1;

        loop {
            debug!("fetching {} closes {}..={} from {} (attempt {})", pair, start, end, venue, attempt);
            let failure = match self.venue.fetch_daily_prices(pair, start, end).await {
                Ok(points) => {
                    let mut series = PriceSeries::from_unordered(points);
                    series.truncate_after(end);
                    match series.check_window(n, end) {
                        Ok(()) => {
                            info!(
                                "📊 Loaded {} daily closes for {} from {} ({} to {})",
                                series.len(),
                                pair,
                                venue,
                                series.first().map(|p| p.date).unwrap_or(start),
                                end
                            );
                            return Ok(series);
                        }
                        Err(defect) => Failure::Defect(defect),
                    }
                }
                Err(e) if e.is_retryable() => Failure::Transient(e),
                Err(e) => return Err(e),
            };

            if attempt >= attempts {
                return Err(match failure {
                    Failure::Transient(e) => e,
                    Failure::Defect(defect) => DcaError::DataUnavailable(format!(
                        "{} history from {} unusable after {} attempts: {}",
                        pair, venue, attempt, defect
                    )),
                });
            }

            let delay = self.retry.delay_after(attempt);
            warn!(
                "⚠️ {} history from {} rejected (attempt {}/{}): {} - refetching in {:?}",
                pair, venue, attempt, attempts, failure, delay
            );
            shutdown.sleep(delay).await?;
            attempt += 1;
        }
    }
}

/// Most recent fully closed day relative to a run on `as_of`
pub fn last_closed_day(as_of: NaiveDate) -> NaiveDate {
    as_of - Duration::days(1)
}

enum Failure {
    Transient(DcaError),
    Defect(SeriesDefect),
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Failure::Transient(e) => write!(f, "{}", e),
            Failure::Defect(d) => write!(f, "{}", d),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PricePoint;
    use crate::exchange::{ClientOrderId, OrderAck};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::Mutex;

    /// Replays one scripted response per call
    struct ScriptedVenue {
        responses: Mutex<Vec<Result<Vec<PricePoint>>>>,
        calls: Mutex<Vec<(NaiveDate, NaiveDate)>>,
    }

    impl ScriptedVenue {
        fn new(mut responses: Vec<Result<Vec<PricePoint>>>) -> Arc<Self> {
            responses.reverse();
            Arc::new(Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(NaiveDate, NaiveDate)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Venue for ScriptedVenue {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn fetch_daily_prices(
            &self,
            _pair: &TradingPair,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<PricePoint>> {
            self.calls.lock().unwrap().push((start, end));
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(DcaError::Network("script exhausted".into())))
        }

        async fn get_current_price(&self, _pair: &TradingPair) -> Result<f64> {
            unreachable!()
        }

        async fn get_available_balance(&self, _currency: &str) -> Result<Decimal> {
            unreachable!()
        }

        async fn place_market_buy(
            &self,
            _pair: &TradingPair,
            _quote_amount: Decimal,
            _client_order_id: &ClientOrderId,
        ) -> Result<OrderAck> {
            unreachable!()
        }

        async fn find_order(
            &self,
            _pair: &TradingPair,
            _client_order_id: &ClientOrderId,
        ) -> Result<Option<OrderAck>> {
            unreachable!()
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn closes(days: impl IntoIterator<Item = u32>) -> Vec<PricePoint> {
        days.into_iter().map(|d| PricePoint::new(day(d), 100.0 + d as f64)).collect()
    }

    fn pair() -> TradingPair {
        TradingPair::new("BTC", "USDT")
    }

    #[tokio::test]
    async fn test_window_ends_yesterday() {
        // Venue also returns today's unfinished candle; it must be dropped
        let venue = ScriptedVenue::new(vec![Ok(closes((1..=11).rev()))]);
        let provider = PriceHistoryProvider::new(venue.clone(), RetryPolicy::immediate(3));

        let series = provider
            .trailing_window(&pair(), 5, day(11), &Shutdown::never())
            .await
            .unwrap();

        assert_eq!(series.len(), 5);
        assert_eq!(series.first().unwrap().date, day(6));
        assert_eq!(series.last().unwrap().date, day(10));
        assert_eq!(venue.calls(), vec![(day(6), day(10))]);
    }

    #[tokio::test]
    async fn test_gap_is_refetched() {
        let mut with_gap = closes(1..=10);
        with_gap.retain(|p| p.date != day(8));
        let venue = ScriptedVenue::new(vec![Ok(with_gap), Ok(closes(1..=10))]);
        let provider = PriceHistoryProvider::new(venue.clone(), RetryPolicy::immediate(3));

        let series = provider
            .trailing_window(&pair(), 5, day(11), &Shutdown::never())
            .await
            .unwrap();

        assert_eq!(series.len(), 5);
        assert_eq!(venue.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_short_history_is_data_unavailable() {
        let venue = ScriptedVenue::new(vec![Ok(closes(8..=10)), Ok(closes(8..=10))]);
        let provider = PriceHistoryProvider::new(venue.clone(), RetryPolicy::immediate(2));

        let err = provider
            .trailing_window(&pair(), 5, day(11), &Shutdown::never())
            .await
            .unwrap_err();

        assert!(matches!(err, DcaError::DataUnavailable(_)));
        assert_eq!(venue.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_network_exhaustion_stays_network() {
        let venue = ScriptedVenue::new(vec![
            Err(DcaError::Network("timeout".into())),
            Err(DcaError::Network("timeout".into())),
            Err(DcaError::Network("timeout".into())),
        ]);
        let provider = PriceHistoryProvider::new(venue.clone(), RetryPolicy::immediate(3));

        let err = provider
            .trailing_window(&pair(), 5, day(11), &Shutdown::never())
            .await
            .unwrap_err();

        assert!(matches!(err, DcaError::Network(_)));
        assert_eq!(venue.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_venue_error_not_retried() {
        let venue = ScriptedVenue::new(vec![Err(DcaError::Venue {
            venue: "scripted".into(),
            reason: "symbol not listed".into(),
        })]);
        let provider = PriceHistoryProvider::new(venue.clone(), RetryPolicy::immediate(3));

        let err = provider
            .trailing_window(&pair(), 5, day(11), &Shutdown::never())
            .await
            .unwrap_err();

        assert!(matches!(err, DcaError::Venue { .. }));
        assert_eq!(venue.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_window_is_an_error() {
        let venue = ScriptedVenue::new(vec![]);
        let provider = PriceHistoryProvider::new(venue.clone(), RetryPolicy::immediate(1));

        let err = provider
            .trailing_window(&pair(), usize::MAX, day(11), &Shutdown::never())
            .await
            .unwrap_err();

        assert!(matches!(err, DcaError::DataUnavailable(_)));
        assert!(venue.calls().is_empty());
    }

    #[tokio::test]
    async fn test_full_history_tolerates_old_holes() {
        let mut points = closes(1..=10);
        points.retain(|p| p.date != day(2));
        let venue = ScriptedVenue::new(vec![Ok(points)]);
        let provider = PriceHistoryProvider::new(venue.clone(), RetryPolicy::immediate(1));

        let series = provider
            .history_since(&pair(), day(1), 5, day(11), &Shutdown::never())
            .await
            .unwrap();

        assert_eq!(series.len(), 9);
        assert_eq!(venue.calls(), vec![(day(1), day(10))]);
    }
}
