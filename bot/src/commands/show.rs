use crate::commands::shutdown_on_ctrl_c;
use crate::state::{AppState, HandlerResult};
use chrono::NaiveDate;
use serde_json::json;

/// Read-only report of the day's index and what the policy would do
pub async fn handle_show(state: &AppState, date: Option<NaiveDate>, as_json: bool) -> HandlerResult {
    let date = date.unwrap_or_else(|| state.today());
    tracing::info!("Handling show for {} on {}", state.config.symbol(), date);

    let pipeline = state.read_only_pipeline()?;
    let (snapshot, decision) = pipeline.preview(date, &shutdown_on_ctrl_c()).await?;
    let pair = state.config.symbol();

    if as_json {
        let report = json!({
            "symbol": pair.to_string(),
            "snapshot": snapshot,
            "decision": decision,
            "estimated_base_quantity": decision
                .estimated_base_quantity(snapshot.current_price)
                .map(|q| q.to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("📊 AHR999 for {} on {}", pair, snapshot.date);
    println!("  price:        {:.2} {}", snapshot.current_price, pair.quote);
    println!(
        "  cost basis:   {:.2} (price/cost {:.4})",
        snapshot.cost_basis,
        snapshot.cost_ratio()
    );
    println!(
        "  fitted price: {:.2} (price/fitted {:.4}, {})",
        snapshot.fitted_price,
        snapshot.trend_ratio(),
        snapshot.fit_mode
    );
    println!("  index:        {:.4}", snapshot.index);
    println!("  tier:         {}", decision.tier);
    match decision.amount() {
        Some(amount) => {
            let quantity = decision
                .estimated_base_quantity(snapshot.current_price)
                .map(|q| format!(" (≈{} {})", q, pair.base))
                .unwrap_or_default();
            println!("  suggestion:   buy {} {}{}", amount, pair.quote, quantity);
        }
        None => println!("  suggestion:   hold"),
    }
    println!("  reason:       {}", decision.reason);
    Ok(())
}
