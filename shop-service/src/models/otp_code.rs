//! OTP code model - one-time password login.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored one-time code. Only the SHA-256 hash of the code is kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OtpCode {
    pub otp_id: String,
    pub destination: String,
    pub code_hash: String,
    pub attempt_count: i32,
    pub attempt_max: i32,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "super::opt_chrono_datetime_as_bson_datetime"
    )]
    pub consumed_at: Option<DateTime<Utc>>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl OtpCode {
    pub fn new(destination: String, code_hash: String, ttl_seconds: i64, attempt_max: i32) -> Self {
        let now = Utc::now();
        Self {
            otp_id: Uuid::new_v4().to_string(),
            destination,
            code_hash,
            attempt_count: 0,
            attempt_max,
            expires_at: now + Duration::seconds(ttl_seconds),
            consumed_at: None,
            created_at: now,
        }
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempt_count >= self.attempt_max
    }
}
