//! Shared REST plumbing for the venue adapters

use crate::error::{DcaError, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqwest::{RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;

/// A reply that reached the venue and came back as JSON
#[derive(Debug)]
pub(crate) enum Reply {
    Ok(Value),
    /// Non-2xx status; the body usually carries the venue's error code
    Rejected { status: StatusCode, body: Value },
}

/// Send a request, mapping transport trouble, throttling and 5xx to `Network`
pub(crate) async fn send(venue: &str, request: RequestBuilder) -> Result<Reply> {
    let response = request
        .send()
        .await
        .map_err(|e| DcaError::Network(format!("{}: {}", venue, e)))?;
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS
        || status.as_u16() == 418
        || status.is_server_error()
    {
        return Err(DcaError::Network(format!("{}: HTTP {}", venue, status)));
    }
    let text = response
        .text()
        .await
        .map_err(|e| DcaError::Network(format!("{}: {}", venue, e)))?;
    debug!("{} replied {}: {}", venue, status, abbreviate(&text));
    let body: Value = serde_json::from_str(&text).map_err(|e| DcaError::Venue {
        venue: venue.to_string(),
        reason: format!("unparseable response (HTTP {}): {}: {}", status, e, abbreviate(&text)),
    })?;
    if status.is_success() {
        Ok(Reply::Ok(body))
    } else {
        Ok(Reply::Rejected { status, body })
    }
}

fn abbreviate(text: &str) -> String {
    const LIMIT: usize = 300;
    if text.len() <= LIMIT {
        text.to_string()
    } else {
        let cut = (0..=LIMIT).rev().find(|i| text.is_char_boundary(*i)).unwrap_or(0);
        format!("{}...", &text[..cut])
    }
}

/// Venue numbers arrive as JSON strings ("64250.12") or plain numbers
pub(crate) fn f64_field(venue: &str, value: &Value, what: &str) -> Result<f64> {
    let parsed = match value {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed.ok_or_else(|| malformed(venue, what, value))
}

pub(crate) fn decimal_field(venue: &str, value: &Value, what: &str) -> Result<Decimal> {
    let parsed = match value {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    };
    parsed.ok_or_else(|| malformed(venue, what, value))
}

pub(crate) fn string_field(venue: &str, value: &Value, what: &str) -> Result<String> {
    match value {
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(malformed(venue, what, value)),
    }
}

pub(crate) fn millis_field(venue: &str, value: &Value, what: &str) -> Result<i64> {
    let parsed = match value {
        Value::String(s) => s.parse::<i64>().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    };
    parsed.ok_or_else(|| malformed(venue, what, value))
}

pub(crate) fn malformed(venue: &str, what: &str, value: &Value) -> DcaError {
    DcaError::Venue {
        venue: venue.to_string(),
        reason: format!("unexpected {} in response: {}", what, value),
    }
}

/// UTC calendar day of a candle open timestamp
pub(crate) fn date_from_millis(venue: &str, millis: i64) -> Result<NaiveDate> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| DcaError::Venue {
            venue: venue.to_string(),
            reason: format!("timestamp out of range: {}", millis),
        })
}

/// Milliseconds at 00:00 UTC of `date`
pub(crate) fn start_of_day_millis(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

pub(crate) const DAY_MILLIS: i64 = 86_400_000;

/// Decimal rendered without trailing zeros ("100", "12.5")
pub(crate) fn amount_string(amount: Decimal) -> String {
    amount.normalize().to_string()
}
