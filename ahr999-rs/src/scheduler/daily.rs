//! Daily trigger loop with catch-up after downtime

use crate::config::ScheduleConfig;
use crate::error::Result;
use crate::execution::{ExecutionPipeline, Shutdown};
use crate::scheduler::Clock;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Work the scheduler fires once per trading day
#[async_trait]
pub trait DailyJob: Send + Sync {
    /// Run for `date`; failures are the job's to record
    async fn run_for(&self, date: NaiveDate, shutdown: &Shutdown);

    /// Whether `date` is already settled
    fn has_run(&self, date: NaiveDate) -> Result<bool>;
}

#[async_trait]
impl DailyJob for ExecutionPipeline {
    async fn run_for(&self, date: NaiveDate, shutdown: &Shutdown) {
        self.run(date, shutdown).await;
    }

    fn has_run(&self, date: NaiveDate) -> Result<bool> {
        ExecutionPipeline::has_run(self, date)
    }
}

/// Trigger instant on local day `date`.
///
/// A time that falls into a DST gap moves forward to the first valid local
/// time; an ambiguous time takes the earlier instant.
pub fn trigger_on(date: NaiveDate, schedule: &ScheduleConfig) -> DateTime<Utc> {
    let local = date.and_time(schedule.at);
    for step in 0..=16 {
        let candidate = local + Duration::minutes(15 * step);
        if let Some(instant) = schedule.timezone.from_local_datetime(&candidate).earliest() {
            return instant.with_timezone(&Utc);
        }
    }
    Utc.from_utc_datetime(&local)
}

/// Local calendar day of an instant; the date a run is recorded under
pub fn trading_date(instant: DateTime<Utc>, schedule: &ScheduleConfig) -> NaiveDate {
    instant.with_timezone(&schedule.timezone).date_naive()
}

/// First trigger strictly after `now`
pub fn next_trigger(now: DateTime<Utc>, schedule: &ScheduleConfig) -> DateTime<Utc> {
    let today = trading_date(now, schedule);
    let candidate = trigger_on(today, schedule);
    if candidate > now {
        candidate
    } else {
        trigger_on(today + Duration::days(1), schedule)
    }
}

/// Most recent trigger at or before `now`
pub fn last_trigger(now: DateTime<Utc>, schedule: &ScheduleConfig) -> DateTime<Utc> {
    let today = trading_date(now, schedule);
    let candidate = trigger_on(today, schedule);
    if candidate <= now {
        candidate
    } else {
        trigger_on(today - Duration::days(1), schedule)
    }
}

pub struct DailyScheduler {
    job: Arc<dyn DailyJob>,
    schedule: ScheduleConfig,
    clock: Arc<dyn Clock>,
}

impl DailyScheduler {
    pub fn new(job: Arc<dyn DailyJob>, schedule: ScheduleConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            job,
            schedule,
            clock,
        }
    }

    pub fn next_trigger(&self) -> DateTime<Utc> {
        next_trigger(self.clock.now(), &self.schedule)
    }

    /// Run the most recent missed trigger, if its date has no settled record
    pub async fn catch_up(&self, shutdown: &Shutdown) -> Result<Option<NaiveDate>> {
        let last = last_trigger(self.clock.now(), &self.schedule);
        let date = trading_date(last, &self.schedule);
        if self.job.has_run(date)? {
            debug!("no catch-up needed, {} already settled", date);
            return Ok(None);
        }
        warn!("⏰ Missed the {} run scheduled at {}, catching up now", date, last);
        self.job.run_for(date, shutdown).await;
        Ok(Some(date))
    }

    /// Fire the job daily until `shutdown`. Never starts a run while one is in
    /// flight: each run is awaited before the next trigger is computed.
    pub async fn run(&self, shutdown: &Shutdown) -> Result<()> {
        info!(
            "⏰ Daily scheduler started: {} {}",
            self.schedule.at.format("%H:%M"),
            self.schedule.timezone
        );

        if let Err(e) = self.catch_up(shutdown).await {
            error!("❌ Catch-up check failed: {}", e);
        }

        let mut cursor = self.clock.now();
        while !shutdown.is_triggered() {
            let next = next_trigger(self.clock.now().max(cursor), &self.schedule);
            let date = trading_date(next, &self.schedule);
            let wait = (next - self.clock.now()).to_std().unwrap_or_default();
            info!(
                "⏳ Next run for {} at {} (in {}m)",
                date,
                next.with_timezone(&self.schedule.timezone),
                wait.as_secs() / 60
            );

            if shutdown.sleep(wait).await.is_err() {
                break;
            }
            cursor = next;
            self.job.run_for(date, shutdown).await;
        }

        info!("🛑 Daily scheduler stopped");
        Ok(())
    }
}
