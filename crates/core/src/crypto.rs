//! HMAC keys that protect hold request parameters from tampering.
//!
//! A hold form carries the detail fields named by the `Holds` function's
//! `hmac_keys` setting plus a `hashKey` computed over them. The key is checked
//! again when the form comes back before the request reaches the driver.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Result, StacksError};

type HmacSha256 = Hmac<Sha256>;

fn mac_for(secret: &str, keys: &[String], details: &BTreeMap<String, String>) -> Result<HmacSha256> {
    if secret.is_empty() {
        return Err(StacksError::Config(
            "catalog.hmac_secret is required for hold request keys".into(),
        ));
    }
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .map_err(|e| StacksError::Config(format!("invalid HMAC secret: {e}")))?;
    for key in keys {
        let value = details.get(key).map(String::as_str).unwrap_or("");
        update_framed(&mut mac, key);
        update_framed(&mut mac, value);
    }
    Ok(mac)
}

/// Length-prefix each part so no two field layouts sign the same bytes.
fn update_framed(mac: &mut HmacSha256, part: &str) {
    mac.update(&(part.len() as u64).to_be_bytes());
    mac.update(part.as_bytes());
}

/// Compute the hex-encoded HMAC-SHA256 over the named detail fields, in order.
///
/// Missing fields are signed as empty strings.
pub fn hold_request_key(
    secret: &str,
    keys: &[String],
    details: &BTreeMap<String, String>,
) -> Result<String> {
    let mac = mac_for(secret, keys, details)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a key produced by [`hold_request_key`] in constant time.
pub fn verify_hold_request_key(
    secret: &str,
    keys: &[String],
    details: &BTreeMap<String, String>,
    key: &str,
) -> Result<bool> {
    let Ok(expected) = hex::decode(key) else {
        return Ok(false);
    };
    let mac = mac_for(secret, keys, details)?;
    Ok(mac.verify_slice(&expected).is_ok())
}
