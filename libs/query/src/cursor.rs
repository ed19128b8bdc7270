use activity_common::{AppError, FieldError};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque continuation cursor. Encodes the position of the last row seen
/// (`event_time`, `record_id`) plus a fingerprint of the query that
/// produced it, so a caller can't resubmit the token against a
/// meaningfully different query and silently get incoherent pages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cursor {
    pub event_time: DateTime<Utc>,
    pub record_id: String,
    pub fingerprint: String,
}

impl Cursor {
    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).expect("Cursor always serializes");
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(token: &str) -> Result<Self, AppError> {
        let invalid = || {
            AppError::validation(vec![FieldError::invalid(
                "continue",
                "invalid continuation cursor",
            )])
        };
        let bytes = URL_SAFE_NO_PAD.decode(token).map_err(|_| invalid())?;
        serde_json::from_slice(&bytes).map_err(|_| invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode_decode() {
        let cursor = Cursor {
            event_time: Utc::now(),
            record_id: "abc".to_string(),
            fingerprint: "fp1".to_string(),
        };
        let decoded = Cursor::decode(&cursor.encode()).unwrap();
        assert_eq!(cursor, decoded);
    }

    #[test]
    fn rejects_garbage_token() {
        assert!(Cursor::decode("not-a-real-cursor!!").is_err());
    }
}
