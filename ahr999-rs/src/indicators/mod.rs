//! Indicator module
//!
//! Rolling statistics built on the `ta` crate, the log-linear trend fit, and
//! the AHR999 calculator that combines them.

pub mod ahr999;
pub mod geometric_mean;
pub mod regression;

pub use ahr999::*;
pub use geometric_mean::*;
pub use regression::*;

/// Streaming indicator fed one observation at a time
pub trait Indicator {
    /// Get the name of the indicator
    fn name(&self) -> &str;

    /// Update indicator with new value
    fn update(&mut self, value: f64);

    /// Get current indicator value
    fn value(&self) -> Option<f64>;

    /// Check if indicator is ready (has enough data)
    fn is_ready(&self) -> bool;
}
