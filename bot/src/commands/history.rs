use crate::commands::format_record;
use crate::state::{AppState, HandlerResult};
use chrono::NaiveDate;

pub fn handle_history(state: &AppState, limit: usize, date: Option<NaiveDate>) -> HandlerResult {
    let records = match date {
        Some(date) => state.store.records_for(date)?,
        None => state.store.latest(limit)?,
    };

    if records.is_empty() {
        println!("No execution records yet");
        return Ok(());
    }
    for record in &records {
        println!("{}", format_record(record));
    }
    Ok(())
}
