//! AHR999 index
//!
//! `index = (price / cost_basis) * (price / fitted_price)` where the cost basis
//! is the geometric mean of the trailing window and the fitted price comes
//! from the configured trend model evaluated at the run date.

use crate::config::{FitMode, StrategyConfig};
use crate::data::PriceSeries;
use crate::error::{DcaError, Result};
use crate::indicators::{geometric_mean, LogLinearFit};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Power-law coefficients of the classic AHR999 valuation
const POWER_LAW_SLOPE: f64 = 5.84;
const POWER_LAW_OFFSET: f64 = 17.01;

/// One day's indicator value with its inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub date: NaiveDate,
    pub current_price: f64,
    pub cost_basis: f64,
    pub fitted_price: f64,
    pub index: f64,
    pub fit_mode: FitMode,
}

impl IndicatorSnapshot {
    /// Combine already computed inputs; rejects anything that would make the
    /// index non-finite
    pub fn from_parts(
        date: NaiveDate,
        current_price: f64,
        cost_basis: f64,
        fitted_price: f64,
        fit_mode: FitMode,
    ) -> Result<Self> {
        for (name, value) in [
            ("current price", current_price),
            ("cost basis", cost_basis),
            ("fitted price", fitted_price),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(DcaError::Computation(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )));
            }
        }

        let index = (current_price / cost_basis) * (current_price / fitted_price);
        if !index.is_finite() {
            return Err(DcaError::Computation(format!(
                "index overflowed for price {} / cost {} / fitted {}",
                current_price, cost_basis, fitted_price
            )));
        }

        Ok(Self {
            date,
            current_price,
            cost_basis,
            fitted_price,
            index,
            fit_mode,
        })
    }

    /// Price relative to the cost basis
    pub fn cost_ratio(&self) -> f64 {
        self.current_price / self.cost_basis
    }

    /// Price relative to the trend
    pub fn trend_ratio(&self) -> f64 {
        self.current_price / self.fitted_price
    }
}

/// Computes [`IndicatorSnapshot`]s; pure, no I/O
#[derive(Debug, Clone)]
pub struct IndicatorCalculator {
    window_days: usize,
    genesis_date: NaiveDate,
    fit_mode: FitMode,
}

impl IndicatorCalculator {
    pub fn new(window_days: usize, genesis_date: NaiveDate, fit_mode: FitMode) -> Self {
        Self {
            window_days,
            genesis_date,
            fit_mode,
        }
    }

    pub fn from_config(config: &StrategyConfig) -> Self {
        Self::new(config.window_days, config.genesis_date, config.fit_mode)
    }

    pub fn fit_mode(&self) -> FitMode {
        self.fit_mode
    }

    pub fn window_days(&self) -> usize {
        self.window_days
    }

    /// Whether the trend fit needs the history back to the genesis anchor
    pub fn needs_full_history(&self) -> bool {
        self.fit_mode == FitMode::FullHistory
    }

    /// Snapshot for `date` at `current_price`.
    ///
    /// `history` must end with the trailing window; for
    /// [`FitMode::FullHistory`] everything before it feeds the trend fit too.
    pub fn compute(
        &self,
        date: NaiveDate,
        current_price: f64,
        history: &PriceSeries,
    ) -> Result<IndicatorSnapshot> {
        let window = history.tail(self.window_days);
        if window.len() < self.window_days {
            return Err(DcaError::Computation(format!(
                "trailing window has {} closes, need {}",
                window.len(),
                self.window_days
            )));
        }
        if let Some((after, next)) = window.find_gap() {
            return Err(DcaError::Computation(format!(
                "trailing window is missing days between {} and {}",
                after, next
            )));
        }

        let cost_basis = geometric_mean(&window.closes(), self.window_days)?;
        let fitted_price = match self.fit_mode {
            FitMode::FullHistory => self.fitted_from(history, date)?,
            FitMode::Trailing => self.fitted_from(&window, date)?,
            FitMode::PowerLaw => self.power_law_price(date)?,
        };
        debug!(
            "{} cost basis {:.2} fitted {:.2} ({})",
            date, cost_basis, fitted_price, self.fit_mode
        );

        IndicatorSnapshot::from_parts(date, current_price, cost_basis, fitted_price, self.fit_mode)
    }

    fn days_since_genesis(&self, date: NaiveDate) -> f64 {
        (date - self.genesis_date).num_days() as f64
    }

    fn fitted_from(&self, series: &PriceSeries, date: NaiveDate) -> Result<f64> {
        let samples: Vec<(f64, f64)> = series
            .points()
            .iter()
            .map(|p| (self.days_since_genesis(p.date), p.close))
            .collect();
        let fit = LogLinearFit::fit(&samples)?;
        debug!(
            "trend fit over {} closes: slope {:.6}/day, r² {:.4}",
            fit.samples, fit.slope, fit.r_squared
        );
        Ok(fit.price_at(self.days_since_genesis(date)))
    }

    fn power_law_price(&self, date: NaiveDate) -> Result<f64> {
        let age = self.days_since_genesis(date);
        if age < 1.0 {
            return Err(DcaError::Computation(format!(
                "{} is not after the genesis date {}",
                date, self.genesis_date
            )));
        }
        Ok(10f64.powf(POWER_LAW_SLOPE * age.log10() - POWER_LAW_OFFSET))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PricePoint;
    use chrono::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Closes for `days` days ending the day before `run_date`, shaped so the
    /// trailing geometric mean is `cost` and the log-linear trend hits
    /// `fitted` on `run_date`
    fn shaped_history(run_date: NaiveDate, days: usize, window: usize, cost: f64, fitted: f64) -> PriceSeries {
        let mean_offset = (window as f64 + 1.0) / 2.0;
        let slope = (fitted / cost).ln() / mean_offset;
        let points = (1..=days as i64)
            .map(|back| {
                PricePoint::new(run_date - Duration::days(back), fitted * (-slope * back as f64).exp())
            })
            .collect();
        PriceSeries::from_unordered(points)
    }

    #[test]
    fn test_index_formula() {
        let snap = IndicatorSnapshot::from_parts(date(2024, 1, 1), 20000.0, 30000.0, 25000.0, FitMode::Trailing)
            .unwrap();
        assert!((snap.index - 0.5333333).abs() < 1e-6);
        assert!((snap.cost_ratio() - 2.0 / 3.0).abs() < 1e-12);
        assert!((snap.trend_ratio() - 0.8).abs() < 1e-12);

        let snap = IndicatorSnapshot::from_parts(date(2024, 1, 1), 10000.0, 30000.0, 40000.0, FitMode::Trailing)
            .unwrap();
        assert!((snap.index - 0.0833333).abs() < 1e-6);

        let snap = IndicatorSnapshot::from_parts(date(2024, 1, 1), 40000.0, 20000.0, 20000.0, FitMode::Trailing)
            .unwrap();
        assert!((snap.index - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_non_positive_parts_rejected() {
        for (price, cost, fitted) in [(0.0, 1.0, 1.0), (1.0, 0.0, 1.0), (1.0, 1.0, -2.0), (f64::NAN, 1.0, 1.0)] {
            let result = IndicatorSnapshot::from_parts(date(2024, 1, 1), price, cost, fitted, FitMode::Trailing);
            assert!(matches!(result, Err(DcaError::Computation(_))));
        }
    }

    #[test]
    fn test_trailing_fit_reproduces_shape() {
        let run = date(2024, 6, 1);
        let history = shaped_history(run, 200, 200, 30000.0, 25000.0);
        let calc = IndicatorCalculator::new(200, date(2009, 1, 3), FitMode::Trailing);

        let snap = calc.compute(run, 20000.0, &history).unwrap();
        assert!((snap.cost_basis - 30000.0).abs() < 1e-3);
        assert!((snap.fitted_price - 25000.0).abs() < 1e-3);
        assert!((snap.index - 0.5333333).abs() < 1e-6);
    }

    #[test]
    fn test_full_history_fit_uses_older_points() {
        let run = date(2024, 6, 1);
        let calc = IndicatorCalculator::new(200, date(2009, 1, 3), FitMode::FullHistory);

        // Same trailing window, but a long flat prefix drags the trend fit
        let mut points = shaped_history(run, 200, 200, 30000.0, 25000.0).points().to_vec();
        let first = points[0].date;
        points.extend((1..=800).map(|back| PricePoint::new(first - Duration::days(back), 30000.0)));
        let history = PriceSeries::from_unordered(points);

        let trailing = IndicatorCalculator::new(200, date(2009, 1, 3), FitMode::Trailing)
            .compute(run, 20000.0, &history)
            .unwrap();
        let full = calc.compute(run, 20000.0, &history).unwrap();

        assert!((full.cost_basis - trailing.cost_basis).abs() < 1e-6);
        assert!((full.fitted_price - trailing.fitted_price).abs() > 100.0);
    }

    #[test]
    fn test_power_law_price() {
        let calc = IndicatorCalculator::new(3, date(2009, 1, 3), FitMode::PowerLaw);
        let run = date(2024, 1, 3);
        let age = (run - date(2009, 1, 3)).num_days() as f64;
        let expected = 10f64.powf(5.84 * age.log10() - 17.01);

        let history = PriceSeries::from_unordered(vec![
            PricePoint::new(date(2023, 12, 31), 40000.0),
            PricePoint::new(date(2024, 1, 1), 40000.0),
            PricePoint::new(date(2024, 1, 2), 40000.0),
        ]);
        let snap = calc.compute(run, 40000.0, &history).unwrap();
        assert!((snap.fitted_price - expected).abs() < 1e-6);
        // Around 37k at the start of 2024
        assert!(snap.fitted_price > 30000.0 && snap.fitted_price < 45000.0);
    }

    #[test]
    fn test_bad_windows_are_computation_errors() {
        let run = date(2024, 6, 1);
        let calc = IndicatorCalculator::new(5, date(2009, 1, 3), FitMode::Trailing);

        let short = shaped_history(run, 4, 5, 100.0, 100.0);
        assert!(matches!(calc.compute(run, 100.0, &short), Err(DcaError::Computation(_))));

        let mut points = shaped_history(run, 5, 5, 100.0, 100.0).points().to_vec();
        points[2].close = 0.0;
        let zero = PriceSeries::from_unordered(points);
        assert!(matches!(calc.compute(run, 100.0, &zero), Err(DcaError::Computation(_))));

        let mut points = shaped_history(run, 6, 5, 100.0, 100.0).points().to_vec();
        points.remove(3);
        let gappy = PriceSeries::from_unordered(points);
        assert!(matches!(calc.compute(run, 100.0, &gappy), Err(DcaError::Computation(_))));
    }
}
