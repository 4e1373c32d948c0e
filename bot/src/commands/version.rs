use crate::state::HandlerResult;
use chrono::{TimeZone, Utc};

pub fn handle_version() -> HandlerResult {
    let git_hash = option_env!("GIT_HASH").unwrap_or("unknown");
    let git_branch = option_env!("GIT_BRANCH").unwrap_or("unknown");
    let git_tag = option_env!("GIT_TAG").unwrap_or("unknown");
    let target_os = option_env!("BUILD_TARGET_OS").unwrap_or("unknown");
    let profile = option_env!("BUILD_PROFILE").unwrap_or("unknown");

    let build_time_raw = option_env!("BUILD_TIME").unwrap_or("unknown");
    let build_time_human = build_time_raw
        .parse::<i64>()
        .ok()
        .and_then(|epoch| Utc.timestamp_opt(epoch, 0).single())
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| build_time_raw.to_string());

    println!("ahr999 {}", env!("CARGO_PKG_VERSION"));
    println!("  commit:  {} ({})", git_hash, git_branch);
    println!("  tag:     {}", git_tag);
    println!("  built:   {} [{} / {}]", build_time_human, target_os, profile);
    Ok(())
}
