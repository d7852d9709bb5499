//! Snapshot encoding for archived bookings.
//!
//! The full booking is stored as base64-encoded JSON in the
//! `original_booking_data` column. Older rows hold plain JSON, so decoding
//! falls back to parsing the text directly.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

/// Encode a JSON value as a base64 snapshot.
pub fn encode_snapshot(value: &Value) -> String {
    STANDARD.encode(value.to_string())
}

/// Decode a snapshot written by [`encode_snapshot`] or a legacy plain-JSON row.
pub fn decode_snapshot(data: &str) -> Option<Value> {
    STANDARD
        .decode(data.trim())
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .or_else(|| serde_json::from_str(data).ok())
}
