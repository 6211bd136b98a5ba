//! Processor webhook verification
//!
//! Notifications carry `X-Associa-Signature: t=<unix>,v1=<hex>` where the
//! signature is HMAC-SHA256 over `"<t>.<raw body>"`. Events older than five
//! minutes, or more than one minute in the future, are rejected.

use associa_shared::membership::PaymentNotification;
use associa_shared::models::payment::{PaymentPlan, PaymentStatus};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

/// Header carrying the notification signature
pub const SIGNATURE_HEADER: &str = "x-associa-signature";

const MAX_EVENT_AGE_SECS: i64 = 300;
const MAX_CLOCK_SKEW_SECS: i64 = 60;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("malformed webhook: {0}")]
    ParseError(String),

    #[error("signature mismatch")]
    InvalidSignature,

    #[error("event too old")]
    TimestampOutOfRange,

    #[error("event timestamp in the future")]
    InvalidTimestamp,

    #[error("webhook secret not configured")]
    NotConfigured,
}

/// Parsed `X-Associa-Signature` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub v1_signature: Vec<u8>,
}

impl SignatureHeader {
    /// Parses `t=<timestamp>,v1=<hex>`; unknown fields are ignored
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp = None;
        let mut v1_signature = None;

        for part in header.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or_else(|| WebhookError::ParseError("invalid header format".to_string()))?;

            match key {
                "t" => {
                    timestamp = Some(value.parse::<i64>().map_err(|_| {
                        WebhookError::ParseError("invalid timestamp".to_string())
                    })?);
                }
                "v1" => {
                    v1_signature = Some(hex::decode(value).map_err(|_| {
                        WebhookError::ParseError("invalid v1 signature hex".to_string())
                    })?);
                }
                _ => {}
            }
        }

        Ok(SignatureHeader {
            timestamp: timestamp
                .ok_or_else(|| WebhookError::ParseError("missing timestamp".to_string()))?,
            v1_signature: v1_signature
                .ok_or_else(|| WebhookError::ParseError("missing v1 signature".to_string()))?,
        })
    }
}

/// Notification body sent by the processor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    /// Processor-side payment id
    pub id: String,
    pub member_id: Uuid,
    pub plan: PaymentPlan,
    pub status: PaymentStatus,
    pub amount_cents: i64,
    #[serde(default = "default_method")]
    pub method: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
}

fn default_method() -> String {
    "processor".to_string()
}

impl From<WebhookPayload> for PaymentNotification {
    fn from(payload: WebhookPayload) -> Self {
        PaymentNotification {
            external_id: payload.id,
            member_id: payload.member_id,
            plan: payload.plan,
            status: payload.status,
            amount_cents: payload.amount_cents,
            method: payload.method,
            paid_at: payload.paid_at,
            due_date: payload.due_date,
        }
    }
}

fn mac_for(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookError::NotConfigured)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Produces the header value for a payload; used by tests and tooling
pub fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, WebhookError> {
    let mac = mac_for(secret, timestamp, payload)?;
    Ok(format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    ))
}

pub struct WebhookVerifier {
    secret: String,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Checks the signature and timestamp, then parses the body
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: DateTime<Utc>,
    ) -> Result<WebhookPayload, WebhookError> {
        let header = SignatureHeader::parse(signature_header)?;

        let age = now.timestamp() - header.timestamp;
        if age > MAX_EVENT_AGE_SECS {
            return Err(WebhookError::TimestampOutOfRange);
        }
        if age < -MAX_CLOCK_SKEW_SECS {
            return Err(WebhookError::InvalidTimestamp);
        }

        mac_for(&self.secret, header.timestamp, payload)?
            .verify_slice(&header.v1_signature)
            .map_err(|_| WebhookError::InvalidSignature)?;

        serde_json::from_slice(payload).map_err(|e| WebhookError::ParseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret_12345";

    fn body(member_id: Uuid) -> String {
        serde_json::json!({
            "id": "pay_123",
            "memberId": member_id,
            "plan": "annual",
            "status": "paid",
            "amountCents": 49900,
            "paidAt": "2026-10-16T12:00:00Z"
        })
        .to_string()
    }

    #[test]
    fn test_parse_header() {
        let header = SignatureHeader::parse("t=1700000000,v1=abcd,v0=ignored").unwrap();
        assert_eq!(header.timestamp, 1700000000);
        assert_eq!(header.v1_signature, vec![0xab, 0xcd]);
    }

    #[test]
    fn test_parse_header_errors() {
        assert!(SignatureHeader::parse("garbage").is_err());
        assert!(SignatureHeader::parse("v1=abcd").is_err());
        assert!(SignatureHeader::parse("t=1700000000").is_err());
        assert!(SignatureHeader::parse("t=abc,v1=abcd").is_err());
        assert!(SignatureHeader::parse("t=1,v1=zz").is_err());
    }

    #[test]
    fn test_valid_signature() {
        let now = Utc::now();
        let member_id = Uuid::new_v4();
        let payload = body(member_id);
        let header = sign(SECRET, now.timestamp(), payload.as_bytes()).unwrap();

        let parsed = WebhookVerifier::new(SECRET)
            .verify_and_parse(payload.as_bytes(), &header, now)
            .unwrap();

        assert_eq!(parsed.id, "pay_123");
        assert_eq!(parsed.member_id, member_id);
        assert_eq!(parsed.status, PaymentStatus::Paid);
        assert_eq!(parsed.method, "processor");

        let notification = PaymentNotification::from(parsed);
        assert_eq!(notification.external_id, "pay_123");
        assert_eq!(notification.plan, PaymentPlan::Annual);
    }

    #[test]
    fn test_wrong_secret() {
        let now = Utc::now();
        let payload = body(Uuid::new_v4());
        let header = sign("other-secret", now.timestamp(), payload.as_bytes()).unwrap();

        let result = WebhookVerifier::new(SECRET).verify_and_parse(payload.as_bytes(), &header, now);
        assert_eq!(result.unwrap_err(), WebhookError::InvalidSignature);
    }

    #[test]
    fn test_tampered_body() {
        let now = Utc::now();
        let payload = body(Uuid::new_v4());
        let header = sign(SECRET, now.timestamp(), payload.as_bytes()).unwrap();
        let tampered = payload.replace("49900", "1");

        let result =
            WebhookVerifier::new(SECRET).verify_and_parse(tampered.as_bytes(), &header, now);
        assert_eq!(result.unwrap_err(), WebhookError::InvalidSignature);
    }

    #[test]
    fn test_timestamp_window() {
        let now = Utc::now();
        let payload = body(Uuid::new_v4());
        let verifier = WebhookVerifier::new(SECRET);

        let old = sign(SECRET, now.timestamp() - 301, payload.as_bytes()).unwrap();
        assert_eq!(
            verifier.verify_and_parse(payload.as_bytes(), &old, now).unwrap_err(),
            WebhookError::TimestampOutOfRange
        );

        let future = sign(SECRET, now.timestamp() + 61, payload.as_bytes()).unwrap();
        assert_eq!(
            verifier.verify_and_parse(payload.as_bytes(), &future, now).unwrap_err(),
            WebhookError::InvalidTimestamp
        );

        let skewed = sign(SECRET, now.timestamp() + 30, payload.as_bytes()).unwrap();
        assert!(verifier.verify_and_parse(payload.as_bytes(), &skewed, now).is_ok());
    }

    #[test]
    fn test_signed_garbage_is_parse_error() {
        let now = Utc::now();
        let header = sign(SECRET, now.timestamp(), b"not json").unwrap();

        let result = WebhookVerifier::new(SECRET).verify_and_parse(b"not json", &header, now);
        assert!(matches!(result, Err(WebhookError::ParseError(_))));
    }
}
