//! Binance spot REST adapter
//!
//! Signed endpoints append `timestamp`/`recvWindow` to the query string and
//! sign it with a hex HMAC-SHA256 of the API secret; the key travels in the
//! `X-MBX-APIKEY` header.

use crate::data::{PricePoint, TradingPair};
use crate::error::{DcaError, Result};
use crate::exchange::http::{self, Reply, DAY_MILLIS};
use crate::exchange::signing::hex_signature;
use crate::exchange::{ClientOrderId, HttpSettings, OrderAck, Venue, VenueCredentials};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Method;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, info, warn};

const DEFAULT_BASE_URL: &str = "https://api.binance.com";
const KLINE_LIMIT: usize = 1000;
const RECV_WINDOW: u64 = 5000;
const NAME: &str = "binance";

pub struct BinanceVenue {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<VenueCredentials>,
}

impl BinanceVenue {
    /// Trading-enabled adapter
    pub fn new(credentials: VenueCredentials, http: HttpSettings) -> Result<Self> {
        Ok(Self {
            client: http.client()?,
            base_url: http.base_url_or(DEFAULT_BASE_URL),
            credentials: Some(credentials),
        })
    }

    /// Market-data only adapter; balance and order calls fail with a config error
    pub fn public(http: HttpSettings) -> Result<Self> {
        Ok(Self {
            client: http.client()?,
            base_url: http.base_url_or(DEFAULT_BASE_URL),
            credentials: None,
        })
    }

    fn credentials(&self) -> Result<&VenueCredentials> {
        self.credentials
            .as_ref()
            .ok_or_else(|| DcaError::Config("binance API credentials not configured".to_string()))
    }

    async fn public_get(&self, path: &str, query: &str) -> Result<Value> {
        let url = format!("{}{}?{}", self.base_url, path, query);
        let reply = http::send(NAME, self.client.get(url)).await?;
        Self::into_body(reply, None)
    }

    async fn signed(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        order_amount: Option<Decimal>,
    ) -> Result<Value> {
        let credentials = self.credentials()?;
        let query = signed_query(params, Utc::now().timestamp_millis());
        let signature = hex_signature(&credentials.api_secret, &query)?;
        let url = format!("{}{}?{}&signature={}", self.base_url, path, query, signature);
        let request = self
            .client
            .request(method, url)
            .header("X-MBX-APIKEY", &credentials.api_key);
        let reply = http::send(NAME, request).await?;
        Self::into_body(reply, order_amount)
    }

    fn into_body(reply: Reply, order_amount: Option<Decimal>) -> Result<Value> {
        match reply {
            Reply::Ok(body) => Ok(body),
            Reply::Rejected { status, body } => {
                let code = body["code"].as_i64().unwrap_or_default();
                let msg = body["msg"].as_str().unwrap_or("").to_string();
                Err(classify_error(code, &format!("HTTP {} {}", status, msg), order_amount))
            }
        }
    }

    async fn lookup_order(&self, pair: &TradingPair, client_order_id: &ClientOrderId) -> Result<Value> {
        self.signed(
            Method::GET,
            "/api/v3/order",
            &[
                ("symbol", pair.concatenated()),
                ("origClientOrderId", client_order_id.to_string()),
            ],
            None,
        )
        .await
    }
}

/// `k=v&...&timestamp=..&recvWindow=..`; all values here are URL-safe
fn signed_query(params: &[(&str, String)], timestamp: i64) -> String {
    let mut parts: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    parts.push(format!("recvWindow={}", RECV_WINDOW));
    parts.push(format!("timestamp={}", timestamp));
    parts.join("&")
}

/// Map a Binance error code onto the taxonomy
fn classify_error(code: i64, message: &str, order_amount: Option<Decimal>) -> DcaError {
    let lower = message.to_lowercase();
    match (code, order_amount) {
        (-1121, _) => DcaError::Venue {
            venue: NAME.to_string(),
            reason: format!("symbol not listed ({}): {}", code, message),
        },
        (-1021, _) | (-1001, _) | (-1003, _) => {
            DcaError::Network(format!("binance {}: {}", code, message))
        }
        (-2010, Some(required)) if lower.contains("insufficient balance") => {
            DcaError::InsufficientBalance {
                venue: NAME.to_string(),
                required,
                detail: message.to_string(),
            }
        }
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
    matches!(err, DcaError::VenueRejected { reason, .. } if reason.to_lowercase().contains("duplicate order"))
}

/// -2013 "Order does not exist."
fn is_unknown_order(err: &DcaError) -> bool {
    matches!(err, DcaError::Venue { reason, .. } if reason.starts_with("-2013"))
}

/// An order that ended without any fill does not count as placed
fn parse_order_lookup(body: &Value, client_order_id: &ClientOrderId) -> Result<Option<OrderAck>> {
    let status = body["status"].as_str().unwrap_or("");
    let executed = http::decimal_field(NAME, &body["executedQty"], "executedQty").unwrap_or(Decimal::ZERO);
    if matches!(status, "CANCELED" | "REJECTED" | "EXPIRED" | "EXPIRED_IN_MATCH") && executed.is_zero() {
        return Ok(None);
    }
    Ok(Some(OrderAck {
        order_id: http::string_field(NAME, &body["orderId"], "orderId")?,
        client_order_id: client_order_id.clone(),
        recovered: true,
    }))
}

/// `[[openTime, open, high, low, close, ...], ...]`
fn parse_klines(body: &Value) -> Result<Vec<(i64, f64)>> {
    let rows = body
        .as_array()
        .ok_or_else(|| http::malformed(NAME, "kline list", body))?;
    rows.iter()
        .map(|row| {
            let open_time = http::millis_field(NAME, &row[0], "kline open time")?;
            let close = http::f64_field(NAME, &row[4], "kline close")?;
            Ok((open_time, close))
        })
        .collect()
}

#[async_trait]
impl Venue for BinanceVenue {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch_daily_prices(
        &self,
        pair: &TradingPair,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>> {
        let symbol = pair.concatenated();
        let end_millis = http::start_of_day_millis(end) + DAY_MILLIS - 1;
        let mut cursor = http::start_of_day_millis(start);
        let mut points = Vec::new();

        while cursor <= end_millis {
            let query = format!(
                "symbol={}&interval=1d&startTime={}&endTime={}&limit={}",
                symbol, cursor, end_millis, KLINE_LIMIT
            );
            let rows = parse_klines(&self.public_get("/api/v3/klines", &query).await?)?;
            debug!("binance klines page from {}: {} rows", cursor, rows.len());
            let Some(&(last_open, _)) = rows.last() else {
                break;
            };
            for (open_time, close) in &rows {
                points.push(PricePoint::new(http::date_from_millis(NAME, *open_time)?, *close));
            }
            if rows.len() < KLINE_LIMIT {
                break;
            }
            cursor = last_open + DAY_MILLIS;
        }

        Ok(points)
    }

    async fn get_current_price(&self, pair: &TradingPair) -> Result<f64> {
        let body = self
            .public_get("/api/v3/ticker/price", &format!("symbol={}", pair.concatenated()))
            .await?;
        http::f64_field(NAME, &body["price"], "ticker price")
    }

    async fn get_available_balance(&self, currency: &str) -> Result<Decimal> {
        let body = self
            .signed(Method::GET, "/api/v3/account", &[("omitZeroBalances", "true".to_string())], None)
            .await?;
        let balances = body["balances"]
            .as_array()
            .ok_or_else(|| http::malformed(NAME, "balances", &body))?;
        let currency = currency.to_uppercase();
        match balances.iter().find(|b| b["asset"].as_str() == Some(currency.as_str())) {
            Some(entry) => http::decimal_field(NAME, &entry["free"], "free balance"),
            None => Ok(Decimal::ZERO),
        }
    }

    async fn place_market_buy(
        &self,
        pair: &TradingPair,
        quote_amount: Decimal,
        client_order_id: &ClientOrderId,
    ) -> Result<OrderAck> {
        let params = [
            ("symbol", pair.concatenated()),
            ("side", "BUY".to_string()),
            ("type", "MARKET".to_string()),
            ("quoteOrderQty", http::amount_string(quote_amount)),
            ("newClientOrderId", client_order_id.to_string()),
        ];
        match self
            .signed(Method::POST, "/api/v3/order", &params, Some(quote_amount))
            .await
        {
            Ok(body) => {
                let order_id = http::string_field(NAME, &body["orderId"], "orderId")?;
                info!(
                    "💰 Binance market buy placed: {} for {} {}, order_id: {}",
                    pair, quote_amount, pair.quote, order_id
                );
                Ok(OrderAck {
                    order_id,
                    client_order_id: client_order_id.clone(),
                    recovered: false,
                })
            }
            Err(e) if is_duplicate_order(&e) => {
                warn!("Binance reports {} already used, looking up the existing order", client_order_id);
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
            Ok(body) => parse_order_lookup(&body, client_order_id),
            Err(e) if is_unknown_order(&e) => {
                debug!("binance has no order {}", client_order_id);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
