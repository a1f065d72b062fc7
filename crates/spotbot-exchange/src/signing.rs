//! HMAC-SHA256 request signing.
//!
//! Signed endpoints take the URL query string (parameters in insertion
//! order, then `timestamp` and `recvWindow`), sign it with the API secret
//! and append the lowercase hex digest as the final `signature` parameter.

use crate::error::{ExchangeError, ExchangeResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the API key on authenticated requests.
pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// API credentials. The secret is wiped from memory on drop.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    secret: Zeroizing<String>,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret: Zeroizing::new(secret.into()),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Lowercase hex HMAC-SHA256 of `payload`.
    pub fn sign(&self, payload: &str) -> ExchangeResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| ExchangeError::Signing(e.to_string()))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"***")
            .field("secret", &"***")
            .finish()
    }
}

/// Join parameters as `k1=v1&k2=v2`, preserving order.
///
/// Values are symbols, decimals, ids and listen keys, none of which
/// contain reserved characters.
pub fn encode_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Append `timestamp`, `recvWindow` and `signature` to an encoded query.
pub fn sign_query(
    credentials: &Credentials,
    query: &str,
    timestamp_ms: i64,
    recv_window_ms: u64,
) -> ExchangeResult<String> {
    let mut signed = String::with_capacity(query.len() + 128);
    if !query.is_empty() {
        signed.push_str(query);
        signed.push('&');
    }
    signed.push_str(&format!("timestamp={timestamp_ms}&recvWindow={recv_window_ms}"));

    let signature = credentials.sign(&signed)?;
    signed.push_str("&signature=");
    signed.push_str(&signature);
    Ok(signed)
}
