//! HMAC-SHA256 webhook signature verification.
//!
//! Inverse of `temps-webhooks/src/service.rs`'s `generate_signature`: the
//! same `sha256=<hex>` over `"{timestamp}.{payload}"` scheme, checked with a
//! constant-time comparison since this guards authenticity, not dedup.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Returns `true` iff `signature` (the `sha256=<hex>` value from the
/// provider's signature header) matches the HMAC of `timestamp.payload`
/// under `secret`. A malformed `signature` (wrong prefix, bad hex, wrong
/// length) is simply not a match.
pub fn verify_signature(secret: &str, timestamp: &str, payload: &str, signature: &str) -> bool {
    let Some(hex_sig) = signature.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(given) = hex::decode(hex_sig) else {
        return false;
    };

    let message = format!("{timestamp}.{payload}");
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(message.as_bytes());
    let expected = mac.finalize().into_bytes();

    if expected.len() != given.len() {
        return false;
    }
    expected.as_slice().ct_eq(&given).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, timestamp: &str, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn accepts_a_correctly_signed_payload() {
        let sig = sign("shh", "1700000000", "{\"event\":\"delivered\"}");
        assert!(verify_signature("shh", "1700000000", "{\"event\":\"delivered\"}", &sig));
    }

    #[test]
    fn rejects_a_wrong_secret() {
        let sig = sign("shh", "1700000000", "{\"event\":\"delivered\"}");
        assert!(!verify_signature("other", "1700000000", "{\"event\":\"delivered\"}", &sig));
    }

    #[test]
    fn rejects_a_tampered_payload() {
        let sig = sign("shh", "1700000000", "{\"event\":\"delivered\"}");
        assert!(!verify_signature("shh", "1700000000", "{\"event\":\"bounced\"}", &sig));
    }

    #[test]
    fn rejects_malformed_signature_headers() {
        assert!(!verify_signature("shh", "1700000000", "{}", "not-a-signature"));
        assert!(!verify_signature("shh", "1700000000", "{}", "sha256=zz"));
    }
}
