//! Execution records
//!
//! One record per (date, venue) attempt outcome. Records are never mutated;
//! a later attempt on the same day appends a new one.

use crate::data::TradingPair;
use crate::error::DcaError;
use crate::exchange::{ClientOrderId, OrderAck};
use crate::indicators::IndicatorSnapshot;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Order accepted by the venue
    Executed,
    /// Decision was to hold, or the day was already done
    Skipped,
    /// Buy decided but not placed
    DryRun,
    Failed,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Executed => "executed",
            ExecutionStatus::Skipped => "skipped",
            ExecutionStatus::DryRun => "dry_run",
            ExecutionStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub date: NaiveDate,
    pub venue: String,
    pub asset: TradingPair,
    /// Quote amount the decision asked for; zero when holding
    pub requested_amount: Decimal,
    pub status: ExecutionStatus,
    pub order_id: Option<String>,
    pub client_order_id: Option<ClientOrderId>,
    /// Human-readable cause of a failure
    pub error: Option<String>,
    /// Machine label of the failure (`network`, `venue_rejected`, ...)
    pub error_kind: Option<String>,
    /// Failure that leaves the day open for another attempt
    #[serde(default)]
    pub retryable: bool,
    pub reason: String,
    pub index: Option<f64>,
    pub price: Option<f64>,
    #[serde(default)]
    pub dry_run: bool,
    pub recorded_at: DateTime<Utc>,
}

impl ExecutionRecord {
    /// Whether this record settles (date, venue) for runs in the same mode
    pub fn consumes_day(&self) -> bool {
        match self.status {
            ExecutionStatus::Failed => !self.retryable,
            _ => true,
        }
    }

    /// Base amount bought, estimated from the price at decision time
    pub fn estimated_base_quantity(&self) -> Option<Decimal> {
        if self.status != ExecutionStatus::Executed && self.status != ExecutionStatus::DryRun {
            return None;
        }
        let price = Decimal::from_f64(self.price?).filter(|p| *p > Decimal::ZERO)?;
        Some((self.requested_amount / price).round_dp(8))
    }
}

/// Shared fields of every record written during one run on one venue
#[derive(Debug, Clone)]
pub struct RecordContext<'a> {
    pub date: NaiveDate,
    pub venue: &'a str,
    pub pair: &'a TradingPair,
    pub snapshot: Option<&'a IndicatorSnapshot>,
    pub dry_run: bool,
}

impl<'a> RecordContext<'a> {
    fn base(&self, status: ExecutionStatus, amount: Decimal, reason: String) -> ExecutionRecord {
        ExecutionRecord {
            date: self.date,
            venue: self.venue.to_string(),
            asset: self.pair.clone(),
            requested_amount: amount,
            status,
            order_id: None,
            client_order_id: None,
            error: None,
            error_kind: None,
            retryable: false,
            reason,
            index: self.snapshot.map(|s| s.index),
            price: self.snapshot.map(|s| s.current_price),
            dry_run: self.dry_run,
            recorded_at: Utc::now(),
        }
    }

    pub fn executed(&self, amount: Decimal, ack: &OrderAck, reason: &str) -> ExecutionRecord {
        let mut record = self.base(ExecutionStatus::Executed, amount, reason.to_string());
        record.order_id = Some(ack.order_id.clone());
        record.client_order_id = Some(ack.client_order_id.clone());
        record
    }

    pub fn skipped(&self, reason: &str) -> ExecutionRecord {
        self.base(ExecutionStatus::Skipped, Decimal::ZERO, reason.to_string())
    }

    pub fn dry_run(&self, amount: Decimal, reason: &str) -> ExecutionRecord {
        self.base(ExecutionStatus::DryRun, amount, reason.to_string())
    }

    pub fn failed(&self, amount: Decimal, error: &DcaError, reason: &str) -> ExecutionRecord {
        let mut record = self.base(ExecutionStatus::Failed, amount, reason.to_string());
        record.error = Some(error.to_string());
        record.error_kind = Some(error.kind().to_string());
        record.retryable = !error.consumes_day();
        record
    }
}
