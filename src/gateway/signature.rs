//! Webhook signature verification.
//!
//! The gateway signs each notification with HMAC-SHA256 over a manifest
//! built from the notification's data id, the `x-request-id` header and
//! the timestamp carried in the `x-signature` header itself:
//!
//! ```text
//! x-signature: ts=1704908010,v1=618c85345248dd820d5fd456117c2ab2ef8eda45a0282ff693eac24131a5e839
//! manifest:    id:<data.id>;request-id:<request-id>;ts:<ts>;
//! ```
//!
//! Verification fails closed: any missing or malformed part rejects the
//! notification, never accepts it.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Parsed `x-signature` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub ts: String,
    pub v1: String,
}

impl SignatureHeader {
    /// Parse `ts=<unix>,v1=<hex>`. Order of the parts does not matter;
    /// unknown keys are ignored; both `ts` and `v1` must be present.
    pub fn parse(header: &str) -> Option<Self> {
        let mut ts = None;
        let mut v1 = None;

        for part in header.split(',') {
            let (key, value) = part.split_once('=')?;
            match key.trim() {
                "ts" => ts = Some(value.trim().to_string()),
                "v1" => v1 = Some(value.trim().to_string()),
                _ => {}
            }
        }

        match (ts, v1) {
            (Some(ts), Some(v1)) if !ts.is_empty() && !v1.is_empty() => Some(Self { ts, v1 }),
            _ => None,
        }
    }
}

/// Validates gateway webhook signatures
#[derive(Clone)]
pub struct SignatureValidator {
    secret: String,
}

impl SignatureValidator {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Build the signed manifest. The `id:` segment is only present
    /// when the notification carries a data id.
    pub fn manifest(data_id: Option<&str>, request_id: &str, ts: &str) -> String {
        match data_id {
            Some(id) => format!("id:{};request-id:{};ts:{};", id, request_id, ts),
            None => format!("request-id:{};ts:{};", request_id, ts),
        }
    }

    /// Verify a raw `x-signature` header against the notification's
    /// data id and request id. Returns false on any parse failure.
    pub fn verify(&self, header: &str, data_id: Option<&str>, request_id: &str) -> bool {
        let parsed = match SignatureHeader::parse(header) {
            Some(parsed) => parsed,
            None => return false,
        };

        let manifest = Self::manifest(data_id, request_id, &parsed.ts);

        let mut mac = match HmacSha256::new_from_slice(self.secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(manifest.as_bytes());
        let computed = hex::encode(mac.finalize().into_bytes());

        secure_eq(computed.as_bytes(), parsed.v1.as_bytes())
    }
}

/// Constant-time byte comparison
pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, manifest: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(manifest.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn header_for(secret: &str, data_id: Option<&str>, request_id: &str, ts: &str) -> String {
        let manifest = SignatureValidator::manifest(data_id, request_id, ts);
        format!("ts={},v1={}", ts, sign(secret, &manifest))
    }

    #[test]
    fn secure_eq_behaves_correctly() {
        assert!(secure_eq(b"abc", b"abc"));
        assert!(!secure_eq(b"abc", b"abd"));
        assert!(!secure_eq(b"abc", b"ab"));
    }

    #[test]
    fn valid_signature_is_accepted() {
        let validator = SignatureValidator::new("secret");
        let header = header_for("secret", Some("12345"), "req-1", "1704908010");
        assert!(validator.verify(&header, Some("12345"), "req-1"));
    }

    #[test]
    fn valid_signature_without_data_id() {
        let validator = SignatureValidator::new("secret");
        let header = header_for("secret", None, "req-1", "1704908010");
        assert!(validator.verify(&header, None, "req-1"));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let validator = SignatureValidator::new("secret");
        let header = header_for("secret", Some("12345"), "req-1", "1704908010");

        // Flip one hex digit of v1
        let mut tampered = header.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == '0' { '1' } else { '0' });
        assert!(!validator.verify(&tampered, Some("12345"), "req-1"));
    }

    #[test]
    fn signature_bound_to_data_id() {
        let validator = SignatureValidator::new("secret");
        let header = header_for("secret", Some("12345"), "req-1", "1704908010");
        assert!(!validator.verify(&header, Some("99999"), "req-1"));
    }

    #[test]
    fn signature_bound_to_request_id() {
        let validator = SignatureValidator::new("secret");
        let header = header_for("secret", Some("12345"), "req-1", "1704908010");
        assert!(!validator.verify(&header, Some("12345"), "req-2"));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let validator = SignatureValidator::new("secret");
        let header = header_for("other-secret", Some("12345"), "req-1", "1704908010");
        assert!(!validator.verify(&header, Some("12345"), "req-1"));
    }

    #[test]
    fn malformed_headers_are_rejected() {
        let validator = SignatureValidator::new("secret");
        assert!(!validator.verify("", Some("12345"), "req-1"));
        assert!(!validator.verify("garbage", Some("12345"), "req-1"));
        assert!(!validator.verify("ts=1704908010", Some("12345"), "req-1"));
        assert!(!validator.verify("v1=deadbeef", Some("12345"), "req-1"));
        assert!(!validator.verify("ts=,v1=", Some("12345"), "req-1"));
    }

    #[test]
    fn header_parsing_tolerates_order_and_spaces() {
        let parsed = SignatureHeader::parse("v1=abc, ts=123").unwrap();
        assert_eq!(parsed.ts, "123");
        assert_eq!(parsed.v1, "abc");
    }
}
