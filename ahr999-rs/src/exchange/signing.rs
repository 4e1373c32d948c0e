//! HMAC-SHA256 request signatures

use crate::error::{DcaError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn mac(secret: &str, payload: &str) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| DcaError::Config(format!("invalid API secret: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Lowercase hex digest (Binance)
pub fn hex_signature(secret: &str, payload: &str) -> Result<String> {
    Ok(hex::encode(mac(secret, payload)?))
}

/// Base64 digest (OKX, Bitget)
pub fn base64_signature(secret: &str, payload: &str) -> Result<String> {
    Ok(STANDARD.encode(mac(secret, payload)?))
}
