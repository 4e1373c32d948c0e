use crate::commands::{format_record, shutdown_on_ctrl_c};
use crate::state::{AppState, HandlerResult};
use ahr999_rs::execution::{ExecutionStatus, RunReport};
use ahr999_rs::scheduler::{Clock, DailyScheduler, SystemClock};
use anyhow::bail;
use chrono::NaiveDate;
use std::sync::Arc;

fn print_report(report: &RunReport) {
    match (&report.snapshot, &report.decision) {
        (Some(snapshot), Some(decision)) => println!(
            "📊 {}: index {:.4} at {:.2}, {} → {}",
            report.date,
            snapshot.index,
            snapshot.current_price,
            decision.tier,
            decision
                .amount()
                .map(|a| format!("buy {}", a))
                .unwrap_or_else(|| "hold".to_string())
        ),
        _ => println!("📊 {}: no decision", report.date),
    }
    for outcome in &report.outcomes {
        let note = if outcome.persisted { "" } else { " (not persisted)" };
        println!("  {}{}", format_record(&outcome.record), note);
    }
    println!(
        "  executed {}, dry-run {}, skipped {}, failed {}",
        report.count(ExecutionStatus::Executed),
        report.count(ExecutionStatus::DryRun),
        report.count(ExecutionStatus::Skipped),
        report.count(ExecutionStatus::Failed)
    );
}

pub async fn handle_run_once(state: &AppState, dry_run: bool, date: Option<NaiveDate>) -> HandlerResult {
    let date = date.unwrap_or_else(|| state.today());
    let pipeline = state.trading_pipeline(dry_run)?;
    tracing::info!(
        "🚀 Running once for {} on {:?}{}",
        date,
        pipeline.venue_names(),
        if pipeline.config().dry_run { " (dry run)" } else { "" }
    );

    let report = pipeline.run(date, &shutdown_on_ctrl_c()).await;
    print_report(&report);

    if report.has_failures() {
        bail!("run for {} finished with failures", date);
    }
    Ok(())
}

pub async fn handle_daemon(state: &AppState, dry_run: bool) -> HandlerResult {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let pipeline = Arc::new(state.trading_pipeline(dry_run)?.with_clock(clock.clone()));
    tracing::info!(
        "🚀 Daemon starting for {} on {:?}{}",
        state.config.symbol(),
        pipeline.venue_names(),
        if pipeline.config().dry_run { " (dry run)" } else { "" }
    );

    let scheduler = DailyScheduler::new(pipeline, state.config.schedule, clock);
    scheduler.run(&shutdown_on_ctrl_c()).await?;
    Ok(())
}
