//! AHR999-RS: a daily dollar-cost-averaging engine driven by the AHR999 index
//!
//! Once per trading day the engine:
//! - fetches the asset's daily closes from a venue's public market data
//! - computes the AHR999 index from a geometric-mean cost basis and a fitted trend price
//! - maps the index onto a buy tier (bottom / DCA / skip)
//! - places an idempotent market buy on every configured venue, or records why it didn't
//!
//! # Features
//!
//! - **Data Management**: gap-checked daily price windows with bounded re-fetching
//! - **Indicators**: geometric mean, log-linear trend fit, AHR999 snapshot
//! - **Decision Policy**: half-open threshold tiers, first match wins
//! - **Venues**: Binance, OKX and Bitget behind a single [`exchange::Venue`] trait
//! - **Execution**: append-only record store, at-most-once per day per venue, dry run
//! - **Scheduling**: timezone-aware daily trigger with catch-up after downtime
//!
//! # Example
//!
//! ```no_run
//! use ahr999_rs::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run() -> ahr999_rs::Result<()> {
//! let venue: Arc<dyn Venue> = Arc::new(BinanceVenue::public(HttpSettings::default())?);
//! let store = Arc::new(MemoryRecordStore::new());
//! let pipeline = ExecutionPipeline::new(
//!     PipelineConfig::default(),
//!     venue.clone(),
//!     vec![venue],
//!     store,
//! )?;
//! let (_trigger, shutdown) = Shutdown::new();
//! let report = pipeline.run(chrono::Utc::now().date_naive(), &shutdown).await;
//! println!("{:?}", report.outcomes);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod exchange;
pub mod execution;
pub mod indicators;
pub mod scheduler;
pub mod strategy;

// Re-export commonly used types
pub mod prelude {
    pub use crate::config::*;
    pub use crate::data::*;
    pub use crate::error::*;
    pub use crate::exchange::*;
    pub use crate::execution::*;
    pub use crate::indicators::*;
    pub use crate::scheduler::*;
    pub use crate::strategy::*;
}

pub use error::{DcaError, Result};
