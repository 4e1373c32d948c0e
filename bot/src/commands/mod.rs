use ahr999_rs::execution::{ExecutionRecord, Shutdown};

pub mod history;
pub mod run;
pub mod show;
pub mod test_venue;
pub mod validate;
pub mod version;

pub use history::handle_history;
pub use run::{handle_daemon, handle_run_once};
pub use show::handle_show;
pub use test_venue::handle_test_venue;
pub use validate::handle_validate_config;
pub use version::handle_version;

/// Shutdown handle flipped by the first Ctrl-C
pub(crate) fn shutdown_on_ctrl_c() -> Shutdown {
    let (trigger, shutdown) = Shutdown::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("🛑 Ctrl-C received, stopping after the current step");
            trigger.trigger();
        }
    });
    shutdown
}

/// One line per record, as printed by `run-once` and `history`
pub(crate) fn format_record(record: &ExecutionRecord) -> String {
    let mut line = format!(
        "{} {:<8} {:<9} {:>10} {}",
        record.date,
        record.venue,
        record.status.to_string(),
        record.requested_amount,
        record.asset.quote
    );
    if record.dry_run {
        line.push_str(" [dry-run]");
    }
    if let Some(index) = record.index {
        line.push_str(&format!(" index={:.4}", index));
    }
    if let Some(quantity) = record.estimated_base_quantity() {
        line.push_str(&format!(" ≈{} {}", quantity, record.asset.base));
    }
    if let Some(order_id) = &record.order_id {
        line.push_str(&format!(" order={}", order_id));
    }
    match &record.error {
        Some(error) => line.push_str(&format!(" error={}", error)),
        None => line.push_str(&format!(" ({})", record.reason)),
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahr999_rs::data::TradingPair;
    use ahr999_rs::error::DcaError;
    use ahr999_rs::execution::RecordContext;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    #[test]
    fn test_format_failed_record_shows_error() {
        let pair = TradingPair::new("BTC", "USDT");
        let context = RecordContext {
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            venue: "okx",
            pair: &pair,
            snapshot: None,
            dry_run: false,
        };
        let record = context.failed(
            Decimal::from(100),
            &DcaError::Network("timed out".to_string()),
            "dca tier",
        );
        let line = format_record(&record);
        assert!(line.starts_with("2024-06-01 okx"));
        assert!(line.contains("failed"));
        assert!(line.contains("error=network error: timed out"));
    }

    #[test]
    fn test_format_dry_run_record_is_marked() {
        let pair = TradingPair::new("BTC", "USDT");
        let context = RecordContext {
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            venue: "binance",
            pair: &pair,
            snapshot: None,
            dry_run: true,
        };
        let line = format_record(&context.dry_run(Decimal::from(100), "dca tier"));
        assert!(line.contains("[dry-run]"));
        assert!(line.ends_with("(dca tier)"));
    }
}
