//! Threshold decision policy

use crate::config::StrategyConfig;
use crate::error::Result;
use crate::indicators::IndicatorSnapshot;
use chrono::NaiveDate;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which rule matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Deep undervaluation: buy the bottom amount
    Bottom,
    /// Regular accumulation: buy the DCA amount
    Dca,
    /// Index at or above the DCA threshold
    Hold,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Bottom => write!(f, "bottom"),
            Tier::Dca => write!(f, "dca"),
            Tier::Hold => write!(f, "hold"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "amount", rename_all = "snake_case")]
pub enum Action {
    /// Spend this much quote currency
    Buy(Decimal),
    Skip,
}

/// Today's decision; derived only from the snapshot and the policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub date: NaiveDate,
    pub action: Action,
    pub tier: Tier,
    pub reason: String,
}

impl Decision {
    pub fn amount(&self) -> Option<Decimal> {
        match self.action {
            Action::Buy(amount) => Some(amount),
            Action::Skip => None,
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self.action, Action::Buy(_))
    }

    /// Base quantity `amount / price` would buy, if this is a buy
    pub fn estimated_base_quantity(&self, price: f64) -> Option<Decimal> {
        let amount = self.amount()?;
        let price = Decimal::from_f64(price).filter(|p| !p.is_zero())?;
        Some((amount / price).round_dp(8))
    }
}

/// Half-open tiers, first match wins:
/// `index < bottom` → bottom amount, `bottom <= index < dca` → DCA amount,
/// otherwise skip.
#[derive(Debug, Clone)]
pub struct DecisionPolicy {
    bottom_threshold: f64,
    dca_threshold: f64,
    bottom_amount: Decimal,
    dca_amount: Decimal,
}

impl DecisionPolicy {
    pub fn from_config(config: &StrategyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            bottom_threshold: config.bottom_threshold,
            dca_threshold: config.dca_threshold,
            bottom_amount: config.bottom_amount,
            dca_amount: config.dca_amount,
        })
    }

    pub fn decide(&self, snapshot: &IndicatorSnapshot) -> Decision {
        let index = snapshot.index;
        let (action, tier, reason) = if index < self.bottom_threshold {
            (
                Action::Buy(self.bottom_amount),
                Tier::Bottom,
                format!("index {:.4} < {} (bottom zone)", index, self.bottom_threshold),
            )
        } else if index < self.dca_threshold {
            (
                Action::Buy(self.dca_amount),
                Tier::Dca,
                format!(
                    "{} <= index {:.4} < {} (DCA zone)",
                    self.bottom_threshold, index, self.dca_threshold
                ),
            )
        } else {
            (
                Action::Skip,
                Tier::Hold,
                format!("index {:.4} >= {} (above DCA zone)", index, self.dca_threshold),
            )
        };

        Decision {
            date: snapshot.date,
            action,
            tier,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FitMode;

    fn snapshot(index: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            current_price: 60000.0,
            cost_basis: 60000.0,
            fitted_price: 60000.0,
            index,
            fit_mode: FitMode::FullHistory,
        }
    }

    fn policy() -> DecisionPolicy {
        DecisionPolicy::from_config(&StrategyConfig::default()).unwrap()
    }

    #[test]
    fn test_boundaries_are_half_open() {
        let policy = policy();

        let at_bottom = policy.decide(&snapshot(0.45));
        assert_eq!(at_bottom.tier, Tier::Dca);
        assert_eq!(at_bottom.action, Action::Buy(Decimal::from(100)));

        let at_dca = policy.decide(&snapshot(1.0));
        assert_eq!(at_dca.tier, Tier::Hold);
        assert_eq!(at_dca.action, Action::Skip);
    }

    #[test]
    fn test_tiers() {
        let policy = policy();
        assert_eq!(policy.decide(&snapshot(0.0833)).action, Action::Buy(Decimal::from(200)));
        assert_eq!(policy.decide(&snapshot(0.4499999)).tier, Tier::Bottom);
        assert_eq!(policy.decide(&snapshot(0.5333)).action, Action::Buy(Decimal::from(100)));
        assert_eq!(policy.decide(&snapshot(0.9999999)).tier, Tier::Dca);
        assert_eq!(policy.decide(&snapshot(4.0)).action, Action::Skip);
    }

    #[test]
    fn test_custom_thresholds() {
        let config = StrategyConfig {
            bottom_threshold: 0.6,
            dca_threshold: 1.2,
            ..StrategyConfig::default()
        };
        let policy = DecisionPolicy::from_config(&config).unwrap();
        assert_eq!(policy.decide(&snapshot(0.5)).tier, Tier::Bottom);
        assert_eq!(policy.decide(&snapshot(1.1)).tier, Tier::Dca);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = StrategyConfig {
            bottom_threshold: 1.5,
            ..StrategyConfig::default()
        };
        assert!(DecisionPolicy::from_config(&config).is_err());
    }

    #[test]
    fn test_base_quantity_estimate() {
        let decision = policy().decide(&snapshot(0.5));
        assert_eq!(
            decision.estimated_base_quantity(50000.0),
            Some(Decimal::new(2, 3))
        );
        assert_eq!(policy().decide(&snapshot(2.0)).estimated_base_quantity(50000.0), None);
    }
}
