//! Telemetry payload types and JSON codec shared across motor-minder
//! builds.
//!
//! Defines the wire schema exchanged between a motor-health sensor node
//! and the remote analysis service over the broker:
//!
//! 1. Outbound [`TelemetryRecord`]: one structured sensor reading
//!    (temperature, vibration, rpm, timestamp), encoded to JSON by name
//!    with no optional fields.
//!
//! 2. Inbound [`AlertRecord`]: a risk update pushed back by the analysis
//!    service. Only the `probability` field is recognized; anything else
//!    in the payload is ignored. A well-formed payload with no
//!    `probability` field is a valid "no update" outcome and must stay
//!    distinguishable from a malformed payload, which is a hard decode
//!    error.
//!
//! The crate is no_std capable (with alloc) so the same schema types can
//! be used from firmware-class builds as well as from the daemon and
//! test crates in this workspace.
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

#[cfg(feature = "std")]
use thiserror::Error;

#[cfg(feature = "std")]
#[derive(Error, Debug)]
pub enum TelemetryCodecError {
    #[error("JSON codec error")]
    Json(#[from] serde_json::Error),
}

#[cfg(not(feature = "std"))]
#[derive(Debug)]
pub enum TelemetryCodecError {
    Json(serde_json::Error),
}

#[cfg(not(feature = "std"))]
impl From<serde_json::Error> for TelemetryCodecError {
    fn from(error: serde_json::Error) -> TelemetryCodecError {
        TelemetryCodecError::Json(error)
    }
}

/// One outbound sensor reading. Immutable once constructed; consumed
/// only by [`encode_telemetry`] for the duration of a single publish.
///
/// `timestamp` is monotonic or epoch time, unit defined by the producer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub temperature: f32,
    pub vibration: f32,
    pub rpm: i32,
    pub timestamp: u64,
}

/// One inbound risk update. `probability` is expected in [0.0, 1.0] but
/// range enforcement is left to the producer; values outside the range
/// pass through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AlertRecord {
    #[serde(default)]
    pub probability: Option<f32>,
}

/// Encode a [`TelemetryRecord`] to its JSON wire form. Field names and
/// presence are exact; never fails for finite numeric inputs.
pub fn encode_telemetry(record: &TelemetryRecord) -> Result<Vec<u8>, TelemetryCodecError> {
    Ok(serde_json::to_vec(record)?)
}

/// Decode an inbound alert payload.
///
/// Malformed JSON is an error; well-formed JSON lacking `probability`
/// decodes to an [`AlertRecord`] with `probability: None`, which callers
/// must treat as "no update" rather than a failure.
pub fn decode_alert(payload: &[u8]) -> Result<AlertRecord, TelemetryCodecError> {
    Ok(serde_json::from_slice(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_decode_probability() {
        let alert = decode_alert(br#"{"probability": 0.73}"#).expect("well formed alert");
        assert_eq!(alert.probability, Some(0.73));
    }

    #[test]
    fn alert_decode_missing_probability_is_no_update() {
        let alert = decode_alert(br#"{"reasons": "Cooling Fan Failure"}"#)
            .expect("well formed alert without probability");
        assert_eq!(alert.probability, None);

        let alert = decode_alert(b"{}").expect("empty object");
        assert_eq!(alert.probability, None);
    }

    #[test]
    fn alert_decode_ignores_unknown_fields() {
        let alert = decode_alert(br#"{"probability": 0.5, "reasons": "Vibration/Shock Detected", "id": 12}"#)
            .expect("alert with extra fields");
        assert_eq!(alert.probability, Some(0.5));
    }

    #[test]
    fn alert_decode_malformed_is_error() {
        assert!(decode_alert(br#"{"probability":"#).is_err());
        assert!(decode_alert(b"not json at all").is_err());
        assert!(decode_alert(b"").is_err());
    }

    #[test]
    fn telemetry_round_trip() {
        let record = TelemetryRecord {
            temperature: 5.5,
            vibration: 0.25,
            rpm: 1450,
            timestamp: 1717171717,
        };

        let payload = encode_telemetry(&record).expect("encode");
        let parsed: TelemetryRecord = serde_json::from_slice(&payload).expect("decode");
        assert_eq!(parsed, record);
    }

    #[test]
    fn telemetry_field_names_are_exact() {
        let record = TelemetryRecord {
            temperature: 42.0,
            vibration: 1.0,
            rpm: 900,
            timestamp: 7,
        };

        let payload = encode_telemetry(&record).expect("encode");
        let value: serde_json::Value = serde_json::from_slice(&payload).expect("reparse");
        for field in ["temperature", "vibration", "rpm", "timestamp"] {
            assert!(value.get(field).is_some(), "missing field {field:}");
        }
    }
}
