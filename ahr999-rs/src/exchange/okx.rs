//! OKX v5 REST adapter
//!
//! Private calls sign `timestamp + METHOD + requestPath + body` with a base64
//! HMAC-SHA256 and carry the passphrase in `OK-ACCESS-PASSPHRASE`.

use crate::data::{PricePoint, TradingPair};
use crate::error::{DcaError, Result};
use crate::exchange::http::{self, Reply, DAY_MILLIS};
use crate::exchange::signing::base64_signature;
use crate::exchange::{ClientOrderId, HttpSettings, OrderAck, Venue, VenueCredentials};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Method;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

const DEFAULT_BASE_URL: &str = "https://www.okx.com";
const CANDLE_LIMIT: usize = 100;
const NAME: &str = "okx";

pub struct OkxVenue {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<VenueCredentials>,
}

impl OkxVenue {
    pub fn new(credentials: VenueCredentials, http: HttpSettings) -> Result<Self> {
        Ok(Self {
            client: http.client()?,
            base_url: http.base_url_or(DEFAULT_BASE_URL),
            credentials: Some(credentials),
        })
    }

    pub fn public(http: HttpSettings) -> Result<Self> {
        Ok(Self {
            client: http.client()?,
            base_url: http.base_url_or(DEFAULT_BASE_URL),
            credentials: None,
        })
    }

    async fn request(
        &self,
        method: Method,
        request_path: &str,
        body: Option<Value>,
        order_amount: Option<Decimal>,
        signed: bool,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, request_path);
        let payload = body.map(|b| b.to_string()).unwrap_or_default();
        let mut request = self.client.request(method.clone(), url);

        if signed {
            let credentials = self
                .credentials
                .as_ref()
                .ok_or_else(|| DcaError::Config("okx API credentials not configured".to_string()))?;
            let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
            let prehash = format!("{}{}{}{}", timestamp, method.as_str(), request_path, payload);
            request = request
                .header("OK-ACCESS-KEY", &credentials.api_key)
                .header("OK-ACCESS-SIGN", base64_signature(&credentials.api_secret, &prehash)?)
                .header("OK-ACCESS-TIMESTAMP", timestamp)
                .header(
                    "OK-ACCESS-PASSPHRASE",
                    credentials.passphrase.clone().unwrap_or_default(),
                );
        }
        if !payload.is_empty() {
            request = request.header("Content-Type", "application/json").body(payload);
        }

        let body = match http::send(NAME, request).await? {
            Reply::Ok(body) | Reply::Rejected { body, .. } => body,
        };
        check_envelope(body, order_amount)
    }

    async fn lookup_order(&self, pair: &TradingPair, client_order_id: &ClientOrderId) -> Result<Value> {
        let path = format!("/api/v5/trade/order?instId={}&clOrdId={}", pair.dashed(), client_order_id);
        self.request(Method::GET, &path, None, None, true).await
    }
}

/// `{"code":"0","msg":"","data":[...]}`; per-item `sCode` refines order failures
fn check_envelope(body: Value, order_amount: Option<Decimal>) -> Result<Value> {
    let code = body["code"].as_str().unwrap_or("");
    if code == "0" {
        return Ok(body["data"].clone());
    }
    let (code, message) = match body["data"][0]["sCode"].as_str() {
        Some(s_code) if !s_code.is_empty() && s_code != "0" => (
            s_code.to_string(),
            body["data"][0]["sMsg"].as_str().unwrap_or("").to_string(),
        ),
        _ => (code.to_string(), body["msg"].as_str().unwrap_or("").to_string()),
    };
    Err(classify_error(&code, &message, order_amount))
}

fn classify_error(code: &str, message: &str, order_amount: Option<Decimal>) -> DcaError {
    match (code, order_amount) {
        ("50001" | "50004" | "50011" | "50013" | "50026", _) => {
            DcaError::Network(format!("okx {}: {}", code, message))
        }
        ("51001", _) => DcaError::Venue {
            venue: NAME.to_string(),
            reason: format!("instrument not listed ({}): {}", code, message),
        },
        ("51008" | "51119", Some(required)) => DcaError::InsufficientBalance {
            venue: NAME.to_string(),
            required,
            detail: message.to_string(),
        },
        (_, Some(_)) => DcaError::VenueRejected {
            venue: NAME.to_string(),
            reason: format!("{}: {}", code, message),
        },
        (_, None) => DcaError::Venue {
            venue: NAME.to_string(),
            reason: format!("{}: {}", code, message),
        },
    }
}

fn is_duplicate_order(err: &DcaError) -> bool {
    matches!(err, DcaError::VenueRejected { reason, .. } if reason.starts_with("51016"))
}

/// 51603 "Order does not exist"
fn is_unknown_order(err: &DcaError) -> bool {
    matches!(err, DcaError::Venue { reason, .. } if reason.starts_with("51603"))
}

/// A canceled order with nothing filled does not count as placed
fn parse_order_lookup(data: &Value, client_order_id: &ClientOrderId) -> Result<Option<OrderAck>> {
    let order = &data[0];
    if order.is_null() {
        return Ok(None);
    }
    let state = order["state"].as_str().unwrap_or("");
    let filled = http::decimal_field(NAME, &order["accFillSz"], "accFillSz").unwrap_or(Decimal::ZERO);
    if matches!(state, "canceled" | "mmp_canceled") && filled.is_zero() {
        return Ok(None);
    }
    Ok(Some(OrderAck {
        order_id: http::string_field(NAME, &order["ordId"], "ordId")?,
        client_order_id: client_order_id.clone(),
        recovered: true,
    }))
}

/// Rows are `[ts, o, h, l, c, ...]`, newest first
fn parse_candles(data: &Value) -> Result<Vec<(i64, f64)>> {
    let rows = data
        .as_array()
        .ok_or_else(|| http::malformed(NAME, "candle list", data))?;
    rows.iter()
        .map(|row| {
            Ok((
                http::millis_field(NAME, &row[0], "candle timestamp")?,
                http::f64_field(NAME, &row[4], "candle close")?,
            ))
        })
        .collect()
}

#[async_trait]
impl Venue for OkxVenue {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch_daily_prices(
        &self,
        pair: &TradingPair,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>> {
        let start_millis = http::start_of_day_millis(start);
        // `after` returns candles strictly older than the cursor
        let mut cursor = http::start_of_day_millis(end) + DAY_MILLIS;
        let mut points = Vec::new();

        loop {
            let path = format!(
                "/api/v5/market/history-candles?instId={}&bar=1Dutc&after={}&limit={}",
                pair.dashed(),
                cursor,
                CANDLE_LIMIT
            );
            let rows = parse_candles(&self.request(Method::GET, &path, None, None, false).await?)?;
            debug!("okx candles page before {}: {} rows", cursor, rows.len());
            let Some(oldest) = rows.iter().map(|(ts, _)| *ts).min() else {
                break;
            };
            for (ts, close) in rows.iter().filter(|(ts, _)| *ts >= start_millis) {
                points.push(PricePoint::new(http::date_from_millis(NAME, *ts)?, *close));
            }
            if oldest <= start_millis || rows.len() < CANDLE_LIMIT {
                break;
            }
            cursor = oldest;
        }

        Ok(points)
    }

    async fn get_current_price(&self, pair: &TradingPair) -> Result<f64> {
        let path = format!("/api/v5/market/ticker?instId={}", pair.dashed());
        let data = self.request(Method::GET, &path, None, None, false).await?;
        http::f64_field(NAME, &data[0]["last"], "ticker last")
    }

    async fn get_available_balance(&self, currency: &str) -> Result<Decimal> {
        let currency = currency.to_uppercase();
        let path = format!("/api/v5/account/balance?ccy={}", currency);
        let data = self.request(Method::GET, &path, None, None, true).await?;
        let details = data[0]["details"].as_array().cloned().unwrap_or_default();
        match details.iter().find(|d| d["ccy"].as_str() == Some(currency.as_str())) {
            Some(entry) => http::decimal_field(NAME, &entry["availBal"], "availBal"),
            None => Ok(Decimal::ZERO),
        }
    }

    async fn place_market_buy(
        &self,
        pair: &TradingPair,
        quote_amount: Decimal,
        client_order_id: &ClientOrderId,
    ) -> Result<OrderAck> {
        let body = json!({
            "instId": pair.dashed(),
            "tdMode": "cash",
            "side": "buy",
            "ordType": "market",
            "sz": http::amount_string(quote_amount),
            "tgtCcy": "quote_ccy",
            "clOrdId": client_order_id.as_str(),
        });
        match self
            .request(Method::POST, "/api/v5/trade/order", Some(body), Some(quote_amount), true)
            .await
        {
            Ok(data) => {
                let order_id = http::string_field(NAME, &data[0]["ordId"], "ordId")?;
                info!(
                    "💰 OKX market buy placed: {} for {} {}, order_id: {}",
                    pair, quote_amount, pair.quote, order_id
                );
                Ok(OrderAck {
                    order_id,
                    client_order_id: client_order_id.clone(),
                    recovered: false,
                })
            }
            Err(e) if is_duplicate_order(&e) => {
                warn!("OKX reports {} already used, looking up the existing order", client_order_id);
                match self.find_order(pair, client_order_id).await? {
                    Some(ack) => Ok(ack),
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn find_order(
        &self,
        pair: &TradingPair,
        client_order_id: &ClientOrderId,
    ) -> Result<Option<OrderAck>> {
        match self.lookup_order(pair, client_order_id).await {
            Ok(data) => parse_order_lookup(&data, client_order_id),
            Err(e) if is_unknown_order(&e) => {
                debug!("okx has no order {}", client_order_id);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_success_returns_data() {
        let data = check_envelope(json!({"code": "0", "msg": "", "data": [{"last": "1"}]}), None).unwrap();
        assert_eq!(data[0]["last"], "1");
    }

    #[test]
    fn test_envelope_prefers_item_code() {
        let body = json!({
            "code": "1",
            "msg": "Operation failed.",
            "data": [{"sCode": "51008", "sMsg": "Order failed. Insufficient USDT balance"}]
        });
        let err = check_envelope(body, Some(Decimal::from(100))).unwrap_err();
        assert!(matches!(err, DcaError::InsufficientBalance { .. }));
    }

    #[test]
    fn test_duplicate_client_order_id_detected() {
        let body = json!({
            "code": "1",
            "msg": "",
            "data": [{"sCode": "51016", "sMsg": "Duplicated clOrdId"}]
        });
        let err = check_envelope(body, Some(Decimal::from(100))).unwrap_err();
        assert!(is_duplicate_order(&err));
    }

    #[test]
    fn test_parse_candles_newest_first() {
        let data = json!([
            ["1704153600000", "44179.5", "45879.6", "44148.3", "44946.9", "1", "1", "1", "1"],
            ["1704067200000", "42283.5", "44184.1", "42180.7", "44179.5", "1", "1", "1", "1"]
        ]);
        let rows = parse_candles(&data).unwrap();
        assert_eq!(rows[0], (1704153600000, 44946.9));
        assert_eq!(rows[1], (1704067200000, 44179.5));
    }

    #[test]
    fn test_order_lookup() {
        let token = ClientOrderId::from_raw("abc");
        let filled = json!([{"ordId": "312269865356374016", "clOrdId": "abc", "state": "filled", "accFillSz": "0.0015"}]);
        let ack = parse_order_lookup(&filled, &token).unwrap().unwrap();
        assert_eq!(ack.order_id, "312269865356374016");
        assert!(ack.recovered);

        let canceled = json!([{"ordId": "1", "state": "canceled", "accFillSz": "0"}]);
        assert_eq!(parse_order_lookup(&canceled, &token).unwrap(), None);
        assert_eq!(parse_order_lookup(&json!([]), &token).unwrap(), None);

        let missing = check_envelope(json!({"code": "51603", "msg": "Order does not exist", "data": []}), None)
            .unwrap_err();
        assert!(is_unknown_order(&missing));
    }

    #[test]
    fn test_system_busy_is_retryable() {
        assert!(classify_error("50001", "Service temporarily unavailable", None).is_retryable());
        assert!(!classify_error("51001", "Instrument ID does not exist", None).is_retryable());
    }
}
