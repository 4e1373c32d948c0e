//! Daily execution pipeline

use crate::config::PipelineConfig;
use crate::data::PriceHistoryProvider;
use crate::error::{DcaError, Result};
use crate::exchange::{ClientOrderId, OrderAck, Venue};
use crate::execution::{
    with_retry, ExecutionRecord, ExecutionStatus, RecordContext, RecordStore, Shutdown,
};
use crate::indicators::{IndicatorCalculator, IndicatorSnapshot};
use crate::scheduler::{Clock, SystemClock};
use crate::strategy::{Action, Decision, DecisionPolicy};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    FetchingHistory,
    Computing,
    Deciding,
    Executing,
    Skipped,
    DryRunLogged,
    Recorded,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What happened on one venue during a run
#[derive(Debug, Clone)]
pub struct VenueOutcome {
    pub record: ExecutionRecord,
    /// False for "already run" skips and for records the store refused
    pub persisted: bool,
}

impl VenueOutcome {
    pub fn venue(&self) -> &str {
        &self.record.venue
    }

    pub fn status(&self) -> ExecutionStatus {
        self.record.status
    }
}

/// Result of one pipeline run, for printing and for the scheduler
#[derive(Debug, Clone)]
pub struct RunReport {
    pub date: NaiveDate,
    pub snapshot: Option<IndicatorSnapshot>,
    pub decision: Option<Decision>,
    pub outcomes: Vec<VenueOutcome>,
}

impl RunReport {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            snapshot: None,
            decision: None,
            outcomes: Vec::new(),
        }
    }

    pub fn count(&self, status: ExecutionStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status() == status).count()
    }

    pub fn has_failures(&self) -> bool {
        self.count(ExecutionStatus::Failed) > 0
    }
}

/// A failed buy; carries the token once an order may have been sent
struct BuyError {
    error: DcaError,
    client_order_id: Option<ClientOrderId>,
}

impl From<DcaError> for BuyError {
    fn from(error: DcaError) -> Self {
        Self {
            error,
            client_order_id: None,
        }
    }
}

/// Orchestrates one asset across its venues.
///
/// The snapshot is computed once per run from the market-data venue and the
/// decision is then executed on every trading venue that has not already
/// settled the day. Runs never overlap: a second `run` while one is in flight
/// returns immediately with unpersisted skips.
pub struct ExecutionPipeline {
    config: PipelineConfig,
    calculator: IndicatorCalculator,
    policy: DecisionPolicy,
    history: PriceHistoryProvider,
    market_data: Arc<dyn Venue>,
    venues: Vec<Arc<dyn Venue>>,
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    run_lock: Mutex<()>,
}

impl ExecutionPipeline {
    pub fn new(
        config: PipelineConfig,
        market_data: Arc<dyn Venue>,
        venues: Vec<Arc<dyn Venue>>,
        store: Arc<dyn RecordStore>,
    ) -> Result<Self> {
        config.validate()?;
        if venues.is_empty() {
            return Err(DcaError::Config("no trading venues configured".to_string()));
        }

        Ok(Self {
            calculator: IndicatorCalculator::from_config(&config.strategy),
            policy: DecisionPolicy::from_config(&config.strategy)?,
            history: PriceHistoryProvider::new(market_data.clone(), config.retry.clone()),
            market_data,
            venues,
            store,
            config,
            clock: Arc::new(SystemClock),
            run_lock: Mutex::new(()),
        })
    }

    /// Replace the wall clock used to tell which daily candles have closed
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn venue_names(&self) -> Vec<String> {
        self.venues.iter().map(|v| v.name().to_string()).collect()
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    fn enter(&self, phase: Phase) {
        debug!("{} run phase → {}", self.config.strategy.symbol, phase);
    }

    /// Today's indicator from live market data; read-only
    pub async fn current_snapshot(&self, date: NaiveDate, shutdown: &Shutdown) -> Result<IndicatorSnapshot> {
        let strategy = &self.config.strategy;
        let pair = &strategy.symbol;
        // Daily candles close at 00:00 UTC; ahead of UTC the local date's
        // previous candle is still open
        let as_of = date.min(self.clock.now().date_naive());

        self.enter(Phase::FetchingHistory);
        let history = if self.calculator.needs_full_history() {
            self.history
                .history_since(pair, strategy.genesis_date, strategy.window_days, as_of, shutdown)
                .await?
        } else {
            self.history
                .trailing_window(pair, strategy.window_days, as_of, shutdown)
                .await?
        };

        let market = self.market_data.as_ref();
        let price = with_retry(&self.config.retry, shutdown, "current price", move |_| {
            market.get_current_price(pair)
        })
        .await?;

        self.enter(Phase::Computing);
        let snapshot = self.calculator.compute(date, price, &history)?;
        info!(
            "📈 AHR999 {} on {}: {:.4} (price {:.2}, cost basis {:.2}, fitted {:.2}, {})",
            pair,
            date,
            snapshot.index,
            snapshot.current_price,
            snapshot.cost_basis,
            snapshot.fitted_price,
            snapshot.fit_mode
        );
        Ok(snapshot)
    }

    /// Snapshot plus the decision a run would take, without touching venues' balances or orders
    pub async fn preview(&self, date: NaiveDate, shutdown: &Shutdown) -> Result<(IndicatorSnapshot, Decision)> {
        let snapshot = self.current_snapshot(date, shutdown).await?;
        let decision = self.policy.decide(&snapshot);
        Ok((snapshot, decision))
    }

    /// Whether `venue` already settled `date` in the current mode
    fn already_done(&self, venue: &str, date: NaiveDate) -> Result<bool> {
        let pair = &self.config.strategy.symbol;
        Ok(self.store.records_for(date)?.iter().any(|r| {
            r.venue == venue && &r.asset == pair && r.dry_run == self.config.dry_run && r.consumes_day()
        }))
    }

    /// True once every venue has settled `date`
    pub fn has_run(&self, date: NaiveDate) -> Result<bool> {
        for venue in &self.venues {
            if !self.already_done(venue.name(), date)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn context<'a>(
        &'a self,
        date: NaiveDate,
        venue: &'a str,
        snapshot: Option<&'a IndicatorSnapshot>,
    ) -> RecordContext<'a> {
        RecordContext {
            date,
            venue,
            pair: &self.config.strategy.symbol,
            snapshot,
            dry_run: self.config.dry_run,
        }
    }

    fn persist(&self, record: ExecutionRecord) -> VenueOutcome {
        match self.store.append(&record) {
            Ok(()) => VenueOutcome {
                record,
                persisted: true,
            },
            Err(e) => {
                error!(
                    "❌ Failed to persist {} record for {} on {}: {}",
                    record.status, record.venue, record.date, e
                );
                VenueOutcome {
                    record,
                    persisted: false,
                }
            }
        }
    }

    /// Run the whole pipeline for `date`. Every venue ends with exactly one
    /// outcome; failures are recorded, not returned.
    pub async fn run(&self, date: NaiveDate, shutdown: &Shutdown) -> RunReport {
        let mut report = RunReport::new(date);
        let Ok(_running) = self.run_lock.try_lock() else {
            warn!("⚠️ A run is already in flight, skipping {}", date);
            for venue in &self.venues {
                report.outcomes.push(VenueOutcome {
                    record: self.context(date, venue.name(), None).skipped("run in flight"),
                    persisted: false,
                });
            }
            return report;
        };

        let pair = &self.config.strategy.symbol;
        info!(
            "🚀 Starting AHR999 run for {} on {} (venues: {}, dry run: {})",
            pair,
            date,
            self.venue_names().join(", "),
            self.config.dry_run
        );
        self.enter(Phase::Idle);

        let mut pending = Vec::new();
        for venue in &self.venues {
            match self.already_done(venue.name(), date) {
                Ok(false) => pending.push(venue.clone()),
                Ok(true) => {
                    info!("⏭️ {} already settled {} on {}, skipping", venue.name(), pair, date);
                    report.outcomes.push(VenueOutcome {
                        record: self.context(date, venue.name(), None).skipped("already run"),
                        persisted: false,
                    });
                }
                Err(e) => {
                    error!("❌ Cannot read execution records for {}: {}", venue.name(), e);
                    let record = self
                        .context(date, venue.name(), None)
                        .failed(Decimal::ZERO, &e, "record store unreadable");
                    report.outcomes.push(self.persist(record));
                }
            }
        }
        if pending.is_empty() {
            self.enter(Phase::Skipped);
            return report;
        }

        let snapshot = match self.current_snapshot(date, shutdown).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.enter(Phase::Failed);
                error!("❌ AHR999 computation for {} on {} failed: {}", pair, date, e);
                for venue in &pending {
                    let record = self
                        .context(date, venue.name(), None)
                        .failed(Decimal::ZERO, &e, "indicator unavailable");
                    report.outcomes.push(self.persist(record));
                }
                return report;
            }
        };

        self.enter(Phase::Deciding);
        let decision = self.policy.decide(&snapshot);
        info!("🎯 Decision for {}: {} ({})", date, decision.tier, decision.reason);

        for venue in &pending {
            let outcome = self.execute_on(venue.as_ref(), &snapshot, &decision, shutdown).await;
            report.outcomes.push(outcome);
        }

        info!(
            "✅ Run for {} on {} finished: {} executed, {} dry run, {} skipped, {} failed",
            pair,
            date,
            report.count(ExecutionStatus::Executed),
            report.count(ExecutionStatus::DryRun),
            report.count(ExecutionStatus::Skipped),
            report.count(ExecutionStatus::Failed)
        );
        report.snapshot = Some(snapshot);
        report.decision = Some(decision);
        report
    }

    async fn execute_on(
        &self,
        venue: &dyn Venue,
        snapshot: &IndicatorSnapshot,
        decision: &Decision,
        shutdown: &Shutdown,
    ) -> VenueOutcome {
        let context = self.context(decision.date, venue.name(), Some(snapshot));
        let record = match decision.action {
            Action::Skip => {
                self.enter(Phase::Skipped);
                info!("⏸️ {}: holding, {}", venue.name(), decision.reason);
                context.skipped(&decision.reason)
            }
            Action::Buy(amount) => match self.buy(venue, amount, &context, decision, shutdown).await {
                Ok(record) => record,
                Err(BuyError { error, client_order_id }) => {
                    self.enter(Phase::Failed);
                    error!("❌ {} buy of {} failed ({}): {}", venue.name(), amount, error.kind(), error);
                    let mut record = context.failed(amount, &error, &decision.reason);
                    record.client_order_id = client_order_id;
                    record
                }
            },
        };
        self.persist(record)
    }

    async fn buy(
        &self,
        venue: &dyn Venue,
        amount: Decimal,
        context: &RecordContext<'_>,
        decision: &Decision,
        shutdown: &Shutdown,
    ) -> std::result::Result<ExecutionRecord, BuyError> {
        if shutdown.is_triggered() {
            return Err(DcaError::Cancelled("shutdown requested before execution".to_string()).into());
        }
        let pair = &self.config.strategy.symbol;
        let quote = pair.quote.as_str();
        let client_order_id = ClientOrderId::for_run(pair, venue.name(), decision.date);
        let token = &client_order_id;
        let sent = |error: DcaError| BuyError {
            error,
            client_order_id: Some(client_order_id.clone()),
        };

        if !self.config.dry_run && self.attempted_before(venue.name(), decision.date) {
            let found = with_retry(
                &self.config.retry,
                shutdown,
                &format!("{} order lookup", venue.name()),
                move |_| venue.find_order(pair, token),
            )
            .await
            .map_err(sent)?;
            if let Some(ack) = found {
                return Ok(self.filled(venue.name(), amount, context, decision, &ack));
            }
            debug!("{} has no order {} yet, placing it", venue.name(), token);
        }

        let balance = with_retry(
            &self.config.retry,
            shutdown,
            &format!("{} balance", venue.name()),
            move |_| venue.get_available_balance(quote),
        )
        .await?;
        info!("💵 {} free {}: {}", venue.name(), quote, balance);
        self.check_balance(venue.name(), balance, amount)?;

        if self.config.dry_run {
            self.enter(Phase::DryRunLogged);
            info!(
                "🧪 [DRY RUN] Would buy {} on {} with {} {}",
                pair,
                venue.name(),
                amount,
                quote
            );
            return Ok(context.dry_run(amount, &decision.reason));
        }

        self.enter(Phase::Executing);
        let ack = with_retry(
            &self.config.retry,
            shutdown,
            &format!("{} market buy", venue.name()),
            move |attempt| async move {
                // The previous attempt may have filled without its ack reaching us
                if attempt > 1 {
                    if let Some(ack) = venue.find_order(pair, token).await? {
                        return Ok(ack);
                    }
                }
                venue.place_market_buy(pair, amount, token).await
            },
        )
        .await
        .map_err(sent)?;

        Ok(self.filled(venue.name(), amount, context, decision, &ack))
    }

    fn filled(
        &self,
        venue: &str,
        amount: Decimal,
        context: &RecordContext<'_>,
        decision: &Decision,
        ack: &OrderAck,
    ) -> ExecutionRecord {
        self.enter(Phase::Recorded);
        if ack.recovered {
            info!("♻️ {} order {} recovered from an earlier attempt", venue, ack.order_id);
        }
        info!(
            "✅ Bought {} on {} for {} {} (order {})",
            self.config.strategy.symbol, venue, amount, self.config.strategy.symbol.quote, ack.order_id
        );
        context.executed(amount, ack, &decision.reason)
    }

    /// Whether a live order for (venue, date) may already have been sent by an
    /// earlier run that ended without an ack. Unreadable records count as yes.
    fn attempted_before(&self, venue: &str, date: NaiveDate) -> bool {
        let pair = &self.config.strategy.symbol;
        match self.store.records_for(date) {
            Ok(records) => records.iter().any(|r| {
                r.venue == venue
                    && &r.asset == pair
                    && !r.dry_run
                    && r.status == ExecutionStatus::Failed
                    && r.client_order_id.is_some()
            }),
            Err(_) => true,
        }
    }

    fn check_balance(&self, venue: &str, balance: Decimal, amount: Decimal) -> Result<()> {
        let quote = &self.config.strategy.symbol.quote;
        let minimum = self.config.strategy.min_balance;
        if balance < amount {
            return Err(DcaError::InsufficientBalance {
                venue: venue.to_string(),
                required: amount,
                detail: format!("free {} {}", balance, quote),
            });
        }
        if balance < minimum {
            return Err(DcaError::InsufficientBalance {
                venue: venue.to_string(),
                required: minimum,
                detail: format!("free {} {} is below the minimum balance", balance, quote),
            });
        }
        Ok(())
    }
}
