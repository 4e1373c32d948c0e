//! Daily close data structures

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily close
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Calendar day (UTC) the candle belongs to
    pub date: NaiveDate,
    /// Closing price in quote currency
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }

    /// Positive and finite
    pub fn is_valid(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }
}

/// Why a series cannot be used as a computation window
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesDefect {
    /// Fewer points than required
    TooShort { have: usize, need: usize },
    /// Two neighbours more than one day apart
    Gap { after: NaiveDate, next: NaiveDate },
    /// The newest point is not the expected day
    Stale { last: NaiveDate, expected: NaiveDate },
}

impl std::fmt::Display for SeriesDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeriesDefect::TooShort { have, need } => {
                write!(f, "have {} daily closes, need {}", have, need)
            }
            SeriesDefect::Gap { after, next } => {
                write!(f, "gap between {} and {}", after, next)
            }
            SeriesDefect::Stale { last, expected } => {
                write!(f, "latest close is {} but expected {}", last, expected)
            }
        }
    }
}

/// Ordered collection of daily closes, oldest first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Create new empty series
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Build from raw venue output: sorts by date and keeps the last close per day
    pub fn from_unordered(mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.date);
        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.date == point.date => *last = point,
                _ => deduped.push(point),
            }
        }
        Self { points: deduped }
    }

    /// Get number of points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if series is empty
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get all points
    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    /// Get first (oldest) point
    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    /// Get last (newest) point
    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// Get close prices as vector
    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    /// Drop everything after `date`
    pub fn truncate_after(&mut self, date: NaiveDate) {
        self.points.retain(|p| p.date <= date);
    }

    /// The newest `n` points as their own series
    pub fn tail(&self, n: usize) -> PriceSeries {
        let start = self.points.len().saturating_sub(n);
        Self {
            points: self.points[start..].to_vec(),
        }
    }

    /// First pair of neighbours more than one calendar day apart
    pub fn find_gap(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.points
            .windows(2)
            .find(|w| (w[1].date - w[0].date).num_days() > 1)
            .map(|w| (w[0].date, w[1].date))
    }

    /// Check that this is exactly `n` consecutive days ending at `end`
    pub fn check_window(&self, n: usize, end: NaiveDate) -> Result<(), SeriesDefect> {
        if self.points.len() < n {
            return Err(SeriesDefect::TooShort {
                have: self.points.len(),
                need: n,
            });
        }
        if let Some(last) = self.last() {
            if last.date != end {
                return Err(SeriesDefect::Stale {
                    last: last.date,
                    expected: end,
                });
            }
        }
        if let Some((after, next)) = self.tail(n).find_gap() {
            return Err(SeriesDefect::Gap { after, next });
        }
        Ok(())
    }
}

impl From<Vec<PricePoint>> for PriceSeries {
    fn from(points: Vec<PricePoint>) -> Self {
        Self::from_unordered(points)
    }
}
