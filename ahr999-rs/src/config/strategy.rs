//! Strategy configuration

use crate::data::TradingPair;
use crate::error::{DcaError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the fitted (trend) price is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FitMode {
    /// Log-linear OLS over every daily close the venue has since the genesis anchor
    FullHistory,
    /// Log-linear OLS over the trailing cost-basis window only
    Trailing,
    /// Fixed AHR999 power law: `10^(5.84 * log10(age_days) - 17.01)`
    PowerLaw,
}

impl FitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitMode::FullHistory => "full-history",
            FitMode::Trailing => "trailing",
            FitMode::PowerLaw => "power-law",
        }
    }
}

impl fmt::Display for FitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FitMode {
    type Err = DcaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "full-history" | "full_history" | "full" => Ok(Self::FullHistory),
            "trailing" | "window" => Ok(Self::Trailing),
            "power-law" | "power_law" | "ahr999" => Ok(Self::PowerLaw),
            other => Err(DcaError::Config(format!("unknown fit mode: {}", other))),
        }
    }
}

/// Longest cost-basis window accepted, about 27 years of daily closes
pub const MAX_WINDOW_DAYS: usize = 10_000;

/// Strategy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Traded pair (e.g., "BTC/USDT"); the quote currency funds the buys
    pub symbol: TradingPair,
    /// Trailing window length in days for the cost basis
    pub window_days: usize,
    /// Anchor date the trend fit counts days from
    pub genesis_date: NaiveDate,
    /// Fitted price model
    pub fit_mode: FitMode,
    /// Index strictly below this buys the bottom amount
    pub bottom_threshold: f64,
    /// Index strictly below this (and at/above bottom) buys the DCA amount
    pub dca_threshold: f64,
    /// Quote amount bought in the bottom tier
    pub bottom_amount: Decimal,
    /// Quote amount bought in the DCA tier
    pub dca_amount: Decimal,
    /// Free quote balance required before any buy is placed
    pub min_balance: Decimal,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            symbol: TradingPair::new("BTC", "USDT"),
            window_days: 200,
            genesis_date: NaiveDate::from_ymd_opt(2009, 1, 3).expect("valid genesis date"),
            fit_mode: FitMode::FullHistory,
            bottom_threshold: 0.45,
            dca_threshold: 1.0,
            bottom_amount: Decimal::from(200),
            dca_amount: Decimal::from(100),
            min_balance: Decimal::ZERO,
        }
    }
}

impl StrategyConfig {
    /// Reject configurations the decision policy cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.window_days < 2 {
            return Err(DcaError::Config(format!(
                "window_days must be at least 2, got {}",
                self.window_days
            )));
        }
        if self.window_days > MAX_WINDOW_DAYS {
            return Err(DcaError::Config(format!(
                "window_days must be at most {}, got {}",
                MAX_WINDOW_DAYS, self.window_days
            )));
        }
        if !self.bottom_threshold.is_finite() || !self.dca_threshold.is_finite() {
            return Err(DcaError::Config("thresholds must be finite".to_string()));
        }
        if self.bottom_threshold <= 0.0 || self.bottom_threshold >= self.dca_threshold {
            return Err(DcaError::Config(format!(
                "thresholds must satisfy 0 < bottom ({}) < dca ({})",
                self.bottom_threshold, self.dca_threshold
            )));
        }
        if self.dca_amount <= Decimal::ZERO {
            return Err(DcaError::Config(format!(
                "dca_amount must be positive, got {}",
                self.dca_amount
            )));
        }
        if self.bottom_amount < self.dca_amount {
            return Err(DcaError::Config(format!(
                "bottom_amount ({}) must be >= dca_amount ({})",
                self.bottom_amount, self.dca_amount
            )));
        }
        if self.min_balance < Decimal::ZERO {
            return Err(DcaError::Config("min_balance cannot be negative".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(StrategyConfig::default().validate().is_ok());
    }

    #[test]
    fn test_window_bounds() {
        for window_days in [0, 1, MAX_WINDOW_DAYS + 1, usize::MAX] {
            let config = StrategyConfig {
                window_days,
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(DcaError::Config(_))), "{}", window_days);
        }
        let longest = StrategyConfig {
            window_days: MAX_WINDOW_DAYS,
            ..Default::default()
        };
        assert!(longest.validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_amounts() {
        let config = StrategyConfig {
            bottom_amount: Decimal::from(50),
            dca_amount: Decimal::from(100),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DcaError::Config(_))));
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let config = StrategyConfig {
            bottom_threshold: 1.2,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fit_mode_parsing() {
        assert_eq!("full-history".parse::<FitMode>().unwrap(), FitMode::FullHistory);
        assert_eq!("TRAILING".parse::<FitMode>().unwrap(), FitMode::Trailing);
        assert_eq!("power_law".parse::<FitMode>().unwrap(), FitMode::PowerLaw);
        assert!("quadratic".parse::<FitMode>().is_err());
    }
}
