//! Configuration module

pub mod retry;
pub mod schedule;
pub mod strategy;

pub use retry::*;
pub use schedule::*;
pub use strategy::*;

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Everything a pipeline run needs besides its venues and store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub strategy: StrategyConfig,
    pub retry: RetryPolicy,
    /// Record decisions without ever placing an order
    pub dry_run: bool,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        self.strategy.validate()
    }
}
