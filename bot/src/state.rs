use ahr999_rs::exchange::{build_market_data_venue, build_venue, Venue};
use ahr999_rs::execution::{ExecutionPipeline, JsonlRecordStore, RecordStore};
use ahr999_rs::scheduler::trading_date;
use anyhow::Context;
use chrono::{NaiveDate, Utc};
use shared::Config;
use std::sync::Arc;

pub type HandlerResult = Result<(), anyhow::Error>;

pub struct AppState {
    pub config: Config,
    pub market_data: Arc<dyn Venue>,
    pub store: Arc<dyn RecordStore>,
}

impl AppState {
    pub fn new() -> Result<Self, anyhow::Error> {
        let config = Config::from_env()?;
        let market_data = build_market_data_venue(config.market_data_venue, config.market_data_http.clone())
            .context("failed to build market data venue")?;
        let store = JsonlRecordStore::open(&config.records_path)
            .with_context(|| format!("failed to open {}", config.records_path.display()))?;
        tracing::info!(
            "AppState initialized: {} via {}, records at {}",
            config.symbol(),
            config.market_data_venue,
            store.path().display()
        );

        Ok(AppState {
            config,
            market_data,
            store: Arc::new(store),
        })
    }

    /// Trading-enabled adapters for every configured venue
    pub fn trading_venues(&self) -> Result<Vec<Arc<dyn Venue>>, anyhow::Error> {
        self.config.validate_trading()?;
        self.config
            .venues
            .iter()
            .map(|v| {
                build_venue(v.kind, v.credentials.clone(), v.http.clone())
                    .with_context(|| format!("failed to build {} venue", v.kind))
            })
            .collect()
    }

    /// Pipeline that trades on every configured venue
    pub fn trading_pipeline(&self, dry_run: bool) -> Result<ExecutionPipeline, anyhow::Error> {
        let mut pipeline_config = self.config.pipeline.clone();
        pipeline_config.dry_run |= dry_run;
        Ok(ExecutionPipeline::new(
            pipeline_config,
            self.market_data.clone(),
            self.trading_venues()?,
            self.store.clone(),
        )?)
    }

    /// Pipeline for read-only reports; the market data adapter stands in as
    /// its only venue, so no credentials are needed
    pub fn read_only_pipeline(&self) -> Result<ExecutionPipeline, anyhow::Error> {
        let mut pipeline_config = self.config.pipeline.clone();
        pipeline_config.dry_run = true;
        Ok(ExecutionPipeline::new(
            pipeline_config,
            self.market_data.clone(),
            vec![self.market_data.clone()],
            self.store.clone(),
        )?)
    }

    /// Trading day the schedule assigns to the current instant
    pub fn today(&self) -> NaiveDate {
        trading_date(Utc::now(), &self.config.schedule)
    }
}
