//! Trading pair notation

use crate::error::DcaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Base/quote pair, written "BTC/USDT"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TradingPair {
    pub base: String,
    pub quote: String,
}

impl TradingPair {
    pub fn new(base: &str, quote: &str) -> Self {
        Self {
            base: base.trim().to_uppercase(),
            quote: quote.trim().to_uppercase(),
        }
    }

    /// "BTCUSDT" (Binance, Bitget)
    pub fn concatenated(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }

    /// "BTC-USDT" (OKX)
    pub fn dashed(&self) -> String {
        format!("{}-{}", self.base, self.quote)
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for TradingPair {
    type Err = DcaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .split_once(['/', '-'])
            .ok_or_else(|| DcaError::Config(format!("pair must look like BASE/QUOTE: {}", s)))?;
        if base.trim().is_empty() || quote.trim().is_empty() {
            return Err(DcaError::Config(format!("pair has an empty side: {}", s)));
        }
        Ok(Self::new(base, quote))
    }
}

impl TryFrom<String> for TradingPair {
    type Error = DcaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TradingPair> for String {
    fn from(pair: TradingPair) -> Self {
        pair.to_string()
    }
}
