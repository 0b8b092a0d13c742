//! Field redaction and network-identity hashing.
//!
//! Redaction is shallow (one level) and idempotent: redacting an already
//! redacted object is a no-op.

use serde_json::Value;
use sha2::{Digest, Sha256};

pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Keys replaced by the redaction marker in free-form payloads.
const REDACTED_KEYS: [&str; 6] = [
    "curp",
    "rfc",
    "email",
    "phone",
    "accountNumber",
    "cardNumber",
];

/// Replace sensitive keys at the top level of a payload object.
pub fn redact_payload(payload: &mut Value) {
    if let Value::Object(map) = payload {
        for key in REDACTED_KEYS {
            if let Some(slot) = map.get_mut(key) {
                *slot = Value::String(REDACTION_MARKER.to_string());
            }
        }
    }
}

/// One-way hash of an IP address: first 16 hex characters of SHA-256.
/// Joinable for fraud analysis without storing the raw address.
pub fn hash_ip(ip: &str) -> String {
    let digest = Sha256::digest(ip.as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(16);
    encoded
}

// ============================================================================
// TESTS
// ============================================================================
