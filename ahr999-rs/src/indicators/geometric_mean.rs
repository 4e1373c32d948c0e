//! Rolling geometric mean
//!
//! `exp(SMA(ln x))` over a fixed period. Used as the trailing cost basis of a
//! periodic buyer: a halving and a doubling cancel out, which an arithmetic
//! mean would not do.

use crate::error::{DcaError, Result};
use crate::indicators::Indicator;
use ta::indicators::SimpleMovingAverage;
use ta::Next;

#[derive(Debug)]
pub struct GeometricMean {
    inner: SimpleMovingAverage,
    period: usize,
    update_count: usize,
    last_value: Option<f64>,
}

impl GeometricMean {
    pub fn new(period: usize) -> Result<Self> {
        let inner = SimpleMovingAverage::new(period)
            .map_err(|e| DcaError::Computation(format!("invalid geometric mean period {}: {:?}", period, e)))?;
        Ok(Self {
            inner,
            period,
            update_count: 0,
            last_value: None,
        })
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for GeometricMean {
    fn name(&self) -> &str {
        "GeometricMean"
    }

    /// Values must be positive; callers validate before feeding
    fn update(&mut self, value: f64) {
        let mean_log = self.inner.next(value.ln());
        self.update_count += 1;
        if self.update_count >= self.period {
            self.last_value = Some(mean_log.exp());
        }
    }

    fn value(&self) -> Option<f64> {
        self.last_value
    }

    fn is_ready(&self) -> bool {
        self.update_count >= self.period
    }
}

/// Geometric mean of the last `period` values
pub fn geometric_mean(values: &[f64], period: usize) -> Result<f64> {
    if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v <= 0.0) {
        return Err(DcaError::Computation(format!(
            "geometric mean needs positive finite values, got {}",
            bad
        )));
    }
    let mut gm = GeometricMean::new(period)?;
    for &value in values {
        gm.update(value);
    }
    gm.value().ok_or_else(|| {
        DcaError::Computation(format!(
            "{} over {} values needs {}",
            gm.name(),
            values.len(),
            gm.period()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometric_mean() {
        let value = geometric_mean(&[1.0, 4.0, 16.0], 3).unwrap();
        assert!((value - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_uses_trailing_period_only() {
        let value = geometric_mean(&[1000.0, 2.0, 8.0], 2).unwrap();
        assert!((value - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_symmetric_in_ratios() {
        // Halving then doubling ends where it started
        let value = geometric_mean(&[50.0, 200.0], 2).unwrap();
        assert!((value - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_not_ready_until_full() {
        let mut gm = GeometricMean::new(3).unwrap();
        gm.update(10.0);
        gm.update(10.0);
        assert!(!gm.is_ready());
        assert_eq!(gm.value(), None);
        gm.update(10.0);
        assert!(gm.is_ready());
    }

    #[test]
    fn test_short_input_names_period() {
        let err = geometric_mean(&[10.0, 10.0], 5).unwrap_err();
        assert_eq!(err.to_string(), "computation error: GeometricMean over 2 values needs 5");
    }

    #[test]
    fn test_rejects_non_positive() {
        assert!(matches!(
            geometric_mean(&[1.0, 0.0, 2.0], 3),
            Err(DcaError::Computation(_))
        ));
        assert!(geometric_mean(&[1.0, f64::NAN], 2).is_err());
        assert!(GeometricMean::new(0).is_err());
    }
}
