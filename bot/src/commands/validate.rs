use crate::state::HandlerResult;
use shared::Config;

/// Load the environment configuration and fail on anything a live run would trip over
pub fn handle_validate_config() -> HandlerResult {
    let config = Config::from_env()?;
    config.validate_trading()?;

    let strategy = &config.pipeline.strategy;
    println!("✅ Configuration is valid");
    println!("  symbol:        {}", strategy.symbol);
    println!("  venues:        {}", config.venue_names().join(", "));
    println!("  market data:   {}", config.market_data_venue);
    println!(
        "  index window:  {} days, fit {} (genesis {})",
        strategy.window_days, strategy.fit_mode, strategy.genesis_date
    );
    println!(
        "  tiers:         < {} buys {} {}, < {} buys {} {}",
        strategy.bottom_threshold,
        strategy.bottom_amount,
        strategy.symbol.quote,
        strategy.dca_threshold,
        strategy.dca_amount,
        strategy.symbol.quote
    );
    println!("  min balance:   {} {}", strategy.min_balance, strategy.symbol.quote);
    println!(
        "  schedule:      {} {}",
        config.schedule.at.format("%H:%M"),
        config.schedule.timezone
    );
    println!(
        "  retries:       {} attempts, backoff {:?}..{:?}",
        config.pipeline.retry.max_attempts,
        config.pipeline.retry.base_delay,
        config.pipeline.retry.max_delay
    );
    println!("  records:       {}", config.records_path.display());
    println!("  dry run:       {}", config.pipeline.dry_run);
    Ok(())
}
