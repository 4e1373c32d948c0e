//! Bitget v2 spot REST adapter

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

const DEFAULT_BASE_URL: &str = "https://api.bitget.com";
const CANDLE_LIMIT: usize = 200;
const NAME: &str = "bitget";

pub struct BitgetVenue {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<VenueCredentials>,
}

impl BitgetVenue {
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

    /// `request_path` includes the query string, which is part of the signature
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
        let mut request = self
            .client
            .request(method.clone(), url)
            .header("locale", "en-US");

        if signed {
            let credentials = self
                .credentials
                .as_ref()
                .ok_or_else(|| DcaError::Config("bitget API credentials not configured".to_string()))?;
            let timestamp = Utc::now().timestamp_millis().to_string();
            let prehash = format!("{}{}{}{}", timestamp, method.as_str(), request_path, payload);
            request = request
                .header("ACCESS-KEY", &credentials.api_key)
                .header("ACCESS-SIGN", base64_signature(&credentials.api_secret, &prehash)?)
                .header("ACCESS-TIMESTAMP", timestamp)
                .header(
                    "ACCESS-PASSPHRASE",
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

    async fn lookup_order(&self, client_order_id: &ClientOrderId) -> Result<Value> {
        let path = format!("/api/v2/spot/trade/orderInfo?clientOid={}", client_order_id);
        self.request(Method::GET, &path, None, None, true).await
    }
}

/// `{"code":"00000","msg":"success","data":...}`
fn check_envelope(body: Value, order_amount: Option<Decimal>) -> Result<Value> {
    let code = body["code"].as_str().unwrap_or("");
    if code == "00000" {
        return Ok(body["data"].clone());
    }
    let message = body["msg"].as_str().unwrap_or("");
    Err(classify_error(code, message, order_amount))
}

fn classify_error(code: &str, message: &str, order_amount: Option<Decimal>) -> DcaError {
    match (code, order_amount) {
        ("40010" | "40200" | "45001", _) => DcaError::Network(format!("bitget {}: {}", code, message)),
        ("40034" | "40309", _) => DcaError::Venue {
            venue: NAME.to_string(),
            reason: format!("symbol not listed ({}): {}", code, message),
        },
        ("43012", Some(required)) => DcaError::InsufficientBalance {
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
    matches!(err, DcaError::VenueRejected { reason, .. } if reason.to_lowercase().contains("duplicate"))
}

/// 40109 / 43001: no order under that id
fn is_unknown_order(err: &DcaError) -> bool {
    matches!(err, DcaError::Venue { reason, .. } if reason.starts_with("40109") || reason.starts_with("43001"))
}

/// A cancelled order with nothing filled does not count as placed
fn parse_order_lookup(data: &Value, client_order_id: &ClientOrderId) -> Result<Option<OrderAck>> {
    let order = &data[0];
    if order.is_null() {
        return Ok(None);
    }
    let status = order["status"].as_str().unwrap_or("");
    let filled = http::decimal_field(NAME, &order["baseVolume"], "baseVolume").unwrap_or(Decimal::ZERO);
    if status == "cancelled" && filled.is_zero() {
        return Ok(None);
    }
    Ok(Some(OrderAck {
        order_id: http::string_field(NAME, &order["orderId"], "orderId")?,
        client_order_id: client_order_id.clone(),
        recovered: true,
    }))
}

/// Rows are `[ts, o, h, l, c, baseVol, usdtVol, quoteVol]`
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
impl Venue for BitgetVenue {
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
        let mut cursor = http::start_of_day_millis(end) + DAY_MILLIS - 1;
        let mut points = Vec::new();

        loop {
            let path = format!(
                "/api/v2/spot/market/history-candles?symbol={}&granularity=1Dutc&endTime={}&limit={}",
                pair.concatenated(),
                cursor,
                CANDLE_LIMIT
            );
            let rows = parse_candles(&self.request(Method::GET, &path, None, None, false).await?)?;
            debug!("bitget candles page ending {}: {} rows", cursor, rows.len());
            let Some(oldest) = rows.iter().map(|(ts, _)| *ts).min() else {
                break;
            };
            for (ts, close) in rows.iter().filter(|(ts, _)| *ts >= start_millis && *ts <= cursor) {
                points.push(PricePoint::new(http::date_from_millis(NAME, *ts)?, *close));
            }
            if oldest <= start_millis || rows.len() < CANDLE_LIMIT {
                break;
            }
            cursor = oldest - 1;
        }

        Ok(points)
    }

    async fn get_current_price(&self, pair: &TradingPair) -> Result<f64> {
        let path = format!("/api/v2/spot/market/tickers?symbol={}", pair.concatenated());
        let data = self.request(Method::GET, &path, None, None, false).await?;
        http::f64_field(NAME, &data[0]["lastPr"], "ticker lastPr")
    }

    async fn get_available_balance(&self, currency: &str) -> Result<Decimal> {
        let currency = currency.to_uppercase();
        let path = format!("/api/v2/spot/account/assets?coin={}", currency);
        let data = self.request(Method::GET, &path, None, None, true).await?;
        let assets = data.as_array().cloned().unwrap_or_default();
        match assets
            .iter()
            .find(|a| a["coin"].as_str().map(str::to_uppercase).as_deref() == Some(currency.as_str()))
        {
            Some(entry) => http::decimal_field(NAME, &entry["available"], "available"),
            None => Ok(Decimal::ZERO),
        }
    }

    async fn place_market_buy(
        &self,
        pair: &TradingPair,
        quote_amount: Decimal,
        client_order_id: &ClientOrderId,
    ) -> Result<OrderAck> {
        // For market buys `size` is denominated in the quote currency
        let body = json!({
            "symbol": pair.concatenated(),
            "side": "buy",
            "orderType": "market",
            "force": "gtc",
            "size": http::amount_string(quote_amount),
            "clientOid": client_order_id.as_str(),
        });
        match self
            .request(Method::POST, "/api/v2/spot/trade/place-order", Some(body), Some(quote_amount), true)
            .await
        {
            Ok(data) => {
                let order_id = http::string_field(NAME, &data["orderId"], "orderId")?;
                info!(
                    "💰 Bitget market buy placed: {} for {} {}, order_id: {}",
                    pair, quote_amount, pair.quote, order_id
                );
                Ok(OrderAck {
                    order_id,
                    client_order_id: client_order_id.clone(),
                    recovered: false,
                })
            }
            Err(e) if is_duplicate_order(&e) => {
                warn!("Bitget reports {} already used, looking up the existing order", client_order_id);
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
        _pair: &TradingPair,
        client_order_id: &ClientOrderId,
    ) -> Result<Option<OrderAck>> {
        match self.lookup_order(client_order_id).await {
            Ok(data) => parse_order_lookup(&data, client_order_id),
            Err(e) if is_unknown_order(&e) => {
                debug!("bitget has no order {}", client_order_id);
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
    fn test_envelope() {
        let data = check_envelope(
            json!({"code": "00000", "msg": "success", "data": {"orderId": "1", "clientOid": "x"}}),
            Some(Decimal::from(10)),
        )
        .unwrap();
        assert_eq!(data["orderId"], "1");

        let err = check_envelope(
            json!({"code": "43012", "msg": "Insufficient balance", "data": null}),
            Some(Decimal::from(10)),
        )
        .unwrap_err();
        assert!(matches!(err, DcaError::InsufficientBalance { .. }));
    }

    #[test]
    fn test_read_errors_are_not_rejections() {
        let err = check_envelope(json!({"code": "40034", "msg": "Parameter does not exist"}), None).unwrap_err();
        assert!(matches!(err, DcaError::Venue { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_order_lookup() {
        let token = ClientOrderId::from_raw("abc");
        let filled = json!([{"orderId": "1234", "clientOid": "abc", "status": "filled", "baseVolume": "0.0015"}]);
        assert_eq!(parse_order_lookup(&filled, &token).unwrap().unwrap().order_id, "1234");
        assert_eq!(parse_order_lookup(&json!([]), &token).unwrap(), None);

        let missing = check_envelope(json!({"code": "43001", "msg": "The order does not exist"}), None).unwrap_err();
        assert!(is_unknown_order(&missing));
    }

    #[test]
    fn test_parse_candles() {
        let data = json!([["1704067200000", "1", "2", "0.5", "1.5", "10", "15", "15"]]);
        assert_eq!(parse_candles(&data).unwrap(), vec![(1704067200000, 1.5)]);
    }
}
