//! Shared fixtures for the integration tests

#![allow(dead_code)]

use ahr999_rs::prelude::*;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// In-memory venue with scripted behaviour and call counters
pub struct MockVenue {
    name: String,
    history: Vec<PricePoint>,
    price: f64,
    balance: Decimal,
    history_error: Option<DcaError>,
    balance_error: Option<DcaError>,
    order_error: Option<DcaError>,
    history_gate: Option<Arc<Notify>>,
    order_gate: Option<(Arc<Notify>, Arc<Notify>)>,
    lost_acks: AtomicU32,
    pub history_calls: AtomicU32,
    pub price_calls: AtomicU32,
    pub balance_calls: AtomicU32,
    pub order_calls: AtomicU32,
    pub lookup_calls: AtomicU32,
    pub orders: Mutex<Vec<(Decimal, ClientOrderId)>>,
    pub history_ranges: Mutex<Vec<(NaiveDate, NaiveDate)>>,
    /// Orders the venue actually filled, keyed by token
    pub fills: Mutex<Vec<(String, ClientOrderId)>>,
}

impl MockVenue {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            history: Vec::new(),
            price: 0.0,
            balance: Decimal::from(10_000),
            history_error: None,
            balance_error: None,
            order_error: None,
            history_gate: None,
            order_gate: None,
            lost_acks: AtomicU32::new(0),
            history_calls: AtomicU32::new(0),
            price_calls: AtomicU32::new(0),
            balance_calls: AtomicU32::new(0),
            order_calls: AtomicU32::new(0),
            lookup_calls: AtomicU32::new(0),
            orders: Mutex::new(Vec::new()),
            history_ranges: Mutex::new(Vec::new()),
            fills: Mutex::new(Vec::new()),
        }
    }

    pub fn with_market(mut self, history: Vec<PricePoint>, price: f64) -> Self {
        self.history = history;
        self.price = price;
        self
    }

    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = balance;
        self
    }

    pub fn failing_history(mut self, error: DcaError) -> Self {
        self.history_error = Some(error);
        self
    }

    pub fn failing_balance(mut self, error: DcaError) -> Self {
        self.balance_error = Some(error);
        self
    }

    pub fn failing_orders(mut self, error: DcaError) -> Self {
        self.order_error = Some(error);
        self
    }

    /// History fetches wait until the gate is notified
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.history_gate = Some(gate);
        self
    }

    /// The first `n` orders fill but the caller only sees a timeout
    pub fn losing_acks(self, n: u32) -> Self {
        self.lost_acks.store(n, Ordering::SeqCst);
        self
    }

    /// Order placement notifies `entered`, then waits until `release` is notified
    pub fn gated_orders(mut self, entered: Arc<Notify>, release: Arc<Notify>) -> Self {
        self.order_gate = Some((entered, release));
        self
    }

    pub fn lookups(&self) -> u32 {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    pub fn filled(&self) -> usize {
        self.fills.lock().unwrap().len()
    }

    pub fn orders_placed(&self) -> u32 {
        self.order_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Venue for MockVenue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_daily_prices(
        &self,
        _pair: &TradingPair,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.history_ranges.lock().unwrap().push((start, end));
        if let Some(gate) = &self.history_gate {
            gate.notified().await;
        }
        if let Some(e) = &self.history_error {
            return Err(e.clone());
        }
        Ok(self
            .history
            .iter()
            .filter(|p| p.date >= start && p.date <= end)
            .copied()
            .collect())
    }

    async fn get_current_price(&self, _pair: &TradingPair) -> Result<f64> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.price)
    }

    async fn get_available_balance(&self, _currency: &str) -> Result<Decimal> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        match &self.balance_error {
            Some(e) => Err(e.clone()),
            None => Ok(self.balance),
        }
    }

    async fn place_market_buy(
        &self,
        _pair: &TradingPair,
        quote_amount: Decimal,
        client_order_id: &ClientOrderId,
    ) -> Result<OrderAck> {
        let n = self.order_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.orders
            .lock()
            .unwrap()
            .push((quote_amount, client_order_id.clone()));
        if let Some((entered, release)) = &self.order_gate {
            entered.notify_one();
            release.notified().await;
        }
        if let Some(e) = &self.order_error {
            return Err(e.clone());
        }

        let order_id = format!("{}-{}", self.name, n);
        self.fills
            .lock()
            .unwrap()
            .push((order_id.clone(), client_order_id.clone()));
        let lost = self
            .lost_acks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if lost {
            return Err(DcaError::Network("read timed out".into()));
        }
        Ok(OrderAck {
            order_id,
            client_order_id: client_order_id.clone(),
            recovered: false,
        })
    }

    async fn find_order(
        &self,
        _pair: &TradingPair,
        client_order_id: &ClientOrderId,
    ) -> Result<Option<OrderAck>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .fills
            .lock()
            .unwrap()
            .iter()
            .find(|(_, id)| id == client_order_id)
            .map(|(order_id, id)| OrderAck {
                order_id: order_id.clone(),
                client_order_id: id.clone(),
                recovered: true,
            }))
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Fixed past run date so the history window never depends on today
pub fn run_date() -> NaiveDate {
    date(2024, 6, 1)
}

/// `days` daily closes ending the day before `run_date` on an exact
/// log-linear trend: the newest `window` closes have geometric mean `cost`
/// and the trend passes through `fitted` on `run_date`
pub fn shaped_history(
    run_date: NaiveDate,
    days: usize,
    window: usize,
    cost: f64,
    fitted: f64,
) -> Vec<PricePoint> {
    let slope = (fitted / cost).ln() / ((window as f64 + 1.0) / 2.0);
    (1..=days as i64)
        .map(|back| PricePoint::new(run_date - Duration::days(back), fitted * (-slope * back as f64).exp()))
        .collect()
}

/// Market venue whose run-date snapshot is (price, cost basis, fitted price)
pub fn market(name: &str, price: f64, cost: f64, fitted: f64) -> MockVenue {
    MockVenue::new(name).with_market(shaped_history(run_date(), 400, 200, cost, fitted), price)
}

pub fn config(dry_run: bool) -> PipelineConfig {
    PipelineConfig {
        strategy: StrategyConfig::default(),
        retry: RetryPolicy::immediate(3),
        dry_run,
    }
}

pub fn pipeline(
    config: PipelineConfig,
    market_data: Arc<MockVenue>,
    venues: Vec<Arc<MockVenue>>,
    store: Arc<dyn RecordStore>,
) -> ExecutionPipeline {
    let venues: Vec<Arc<dyn Venue>> = venues.into_iter().map(|v| v as Arc<dyn Venue>).collect();
    ExecutionPipeline::new(config, market_data, venues, store).unwrap()
}
