//! Log-linear trend fit: `ln(price) = a + b * x` by ordinary least squares

use crate::error::{DcaError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogLinearFit {
    pub intercept: f64,
    pub slope: f64,
    /// Coefficient of determination of the fit in log space
    pub r_squared: f64,
    pub samples: usize,
}

impl LogLinearFit {
    /// Fit over `(x, price)` samples; prices must be positive and finite
    pub fn fit(samples: &[(f64, f64)]) -> Result<Self> {
        if samples.len() < 2 {
            return Err(DcaError::Computation(format!(
                "trend fit needs at least 2 samples, got {}",
                samples.len()
            )));
        }
        if let Some((x, price)) = samples
            .iter()
            .find(|(x, p)| !x.is_finite() || !p.is_finite() || *p <= 0.0)
        {
            return Err(DcaError::Computation(format!(
                "invalid trend sample at x={}: {}",
                x, price
            )));
        }

        let n = samples.len() as f64;
        let mean_x = samples.iter().map(|(x, _)| x).sum::<f64>() / n;
        let mean_y = samples.iter().map(|(_, p)| p.ln()).sum::<f64>() / n;

        let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
        for (x, price) in samples {
            let dx = x - mean_x;
            let dy = price.ln() - mean_y;
            sxx += dx * dx;
            sxy += dx * dy;
            syy += dy * dy;
        }
        if sxx <= f64::EPSILON {
            return Err(DcaError::Computation(
                "degenerate trend fit: all samples share one x".to_string(),
            ));
        }

        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;
        let r_squared = if syy <= f64::EPSILON { 1.0 } else { (sxy * sxy) / (sxx * syy) };

        Ok(Self {
            intercept,
            slope,
            r_squared,
            samples: samples.len(),
        })
    }

    /// Model price at `x`
    pub fn price_at(&self, x: f64) -> f64 {
        (self.intercept + self.slope * x).exp()
    }
}
