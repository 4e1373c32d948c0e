use ahr999_rs::config::{FitMode, PipelineConfig, RetryPolicy, ScheduleConfig, StrategyConfig};
use ahr999_rs::data::TradingPair;
use ahr999_rs::exchange::{HttpSettings, VenueCredentials, VenueKind};
use anyhow::{anyhow, bail, Context};
use chrono::NaiveDate;
use dotenv::dotenv;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// One trading venue as configured through the environment
#[derive(Debug, Clone)]
pub struct VenueSettings {
    pub kind: VenueKind,
    pub credentials: VenueCredentials,
    pub http: HttpSettings,
}

pub struct Config {
    pub pipeline: PipelineConfig,
    pub schedule: ScheduleConfig,
    /// Venues orders are placed on, in configured order
    pub venues: Vec<VenueSettings>,
    /// Venue whose public market data feeds the indicator
    pub market_data_venue: VenueKind,
    pub market_data_http: HttpSettings,
    pub records_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset and blank keys fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = StrategyConfig::default();

        let strategy = StrategyConfig {
            symbol: parse_or(&var, "AHR_SYMBOL", defaults.symbol.clone())?,
            window_days: parse_or(&var, "AHR_WINDOW_DAYS", defaults.window_days)?,
            genesis_date: match var("AHR_GENESIS_DATE") {
                Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .with_context(|| format!("AHR_GENESIS_DATE must be YYYY-MM-DD, got '{}'", raw))?,
                None => defaults.genesis_date,
            },
            fit_mode: parse_or::<FitMode, _>(&var, "AHR_FIT_MODE", defaults.fit_mode)?,
            bottom_threshold: parse_or(&var, "AHR_BOTTOM_THRESHOLD", defaults.bottom_threshold)?,
            dca_threshold: parse_or(&var, "AHR_DCA_THRESHOLD", defaults.dca_threshold)?,
            bottom_amount: parse_or::<Decimal, _>(&var, "AHR_BOTTOM_AMOUNT", defaults.bottom_amount)?,
            dca_amount: parse_or::<Decimal, _>(&var, "AHR_DCA_AMOUNT", defaults.dca_amount)?,
            min_balance: parse_or::<Decimal, _>(&var, "AHR_MIN_BALANCE", defaults.min_balance)?,
        };

        let retry_defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: parse_or(&var, "AHR_MAX_ATTEMPTS", retry_defaults.max_attempts)?,
            base_delay: Duration::from_millis(parse_or(
                &var,
                "AHR_BACKOFF_MS",
                retry_defaults.base_delay.as_millis() as u64,
            )?),
            max_delay: Duration::from_millis(parse_or(
                &var,
                "AHR_MAX_BACKOFF_MS",
                retry_defaults.max_delay.as_millis() as u64,
            )?),
        };

        let pipeline = PipelineConfig {
            strategy,
            retry,
            dry_run: parse_bool(&var, "AHR_DRY_RUN", false)?,
        };

        let schedule = ScheduleConfig::parse(
            &var("AHR_SCHEDULE_TIME").unwrap_or_else(|| "00:00".to_string()),
            &var("AHR_TIMEZONE").unwrap_or_else(|| "Asia/Shanghai".to_string()),
        )
        .context("invalid schedule")?;

        let timeout = Duration::from_secs(parse_or(&var, "AHR_HTTP_TIMEOUT_SECS", 10u64)?);

        let mut kinds: Vec<VenueKind> = Vec::new();
        for name in var("AHR_VENUES")
            .unwrap_or_else(|| "binance".to_string())
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
        {
            let kind = VenueKind::from_str(name)
                .context("invalid AHR_VENUES")?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        if kinds.is_empty() {
            bail!("AHR_VENUES must name at least one venue");
        }

        let venues = kinds
            .iter()
            .map(|kind| VenueSettings {
                kind: *kind,
                credentials: credentials_for(&var, *kind),
                http: http_for(&var, *kind, timeout),
            })
            .collect();

        let market_data_venue = match var("AHR_MARKET_DATA_VENUE") {
            Some(name) => VenueKind::from_str(&name)
                .context("invalid AHR_MARKET_DATA_VENUE")?,
            None => kinds[0],
        };

        let config = Config {
            pipeline,
            schedule,
            venues,
            market_data_venue,
            market_data_http: http_for(&var, market_data_venue, timeout),
            records_path: PathBuf::from(
                var("AHR_RECORDS_PATH").unwrap_or_else(|| "logs/execution_records.jsonl".to_string()),
            ),
        };
        config.validate()?;
        tracing::debug!(
            "Loaded config: {} on {:?}, market data from {}",
            config.pipeline.strategy.symbol,
            config.venue_names(),
            config.market_data_venue
        );
        Ok(config)
    }

    /// Strategy-level checks; independent of credentials
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.pipeline
            .validate()
            .context("invalid strategy configuration")?;
        if self.pipeline.retry.max_attempts == 0 {
            bail!("AHR_MAX_ATTEMPTS must be at least 1");
        }
        Ok(())
    }

    /// Every trading venue must carry complete API credentials
    pub fn validate_trading(&self) -> Result<(), anyhow::Error> {
        let missing: Vec<String> = self
            .venues
            .iter()
            .filter(|v| !v.credentials.is_complete(v.kind))
            .map(|v| v.kind.to_string())
            .collect();
        if !missing.is_empty() {
            bail!("missing API credentials for: {}", missing.join(", "));
        }
        Ok(())
    }

    pub fn venue_names(&self) -> Vec<String> {
        self.venues.iter().map(|v| v.kind.to_string()).collect()
    }

    pub fn venue(&self, kind: VenueKind) -> Option<&VenueSettings> {
        self.venues.iter().find(|v| v.kind == kind)
    }

    pub fn symbol(&self) -> &TradingPair {
        &self.pipeline.strategy.symbol
    }
}

fn parse_or<T, V>(var: &V, key: &str, default: T) -> Result<T, anyhow::Error>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    V: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow!("{} has invalid value '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}

fn parse_bool<V>(var: &V, key: &str, default: bool) -> Result<bool, anyhow::Error>
where
    V: Fn(&str) -> Option<String>,
{
    match var(key).map(|v| v.to_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => bail!("{} must be a boolean, got '{}'", key, v),
    }
}

fn env_prefix(kind: VenueKind) -> String {
    kind.as_str().to_uppercase()
}

fn credentials_for<V>(var: &V, kind: VenueKind) -> VenueCredentials
where
    V: Fn(&str) -> Option<String>,
{
    let prefix = env_prefix(kind);
    let credentials = VenueCredentials::new(
        var(&format!("{}_API_KEY", prefix)).unwrap_or_default(),
        var(&format!("{}_API_SECRET", prefix)).unwrap_or_default(),
    );
    match var(&format!("{}_PASSPHRASE", prefix)) {
        Some(passphrase) if kind.needs_passphrase() => credentials.with_passphrase(passphrase),
        _ => credentials,
    }
}

fn http_for<V>(var: &V, kind: VenueKind, timeout: Duration) -> HttpSettings
where
    V: Fn(&str) -> Option<String>,
{
    HttpSettings {
        base_url: var(&format!("{}_BASE_URL", env_prefix(kind))),
        timeout,
    }
}
