// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signature verification for identity provider webhooks.
//!
//! Deliveries carry `svix-id`, `svix-timestamp` and `svix-signature`
//! headers. The signed content is `{id}.{timestamp}.{body}`, authenticated
//! with HMAC-SHA256 under the base64 secret that follows the `whsec_`
//! prefix. The signature header is a space-separated list of `v1,<base64>`
//! entries; any one matching is enough.

use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const ID_HEADER: &str = "svix-id";
pub const TIMESTAMP_HEADER: &str = "svix-timestamp";
pub const SIGNATURE_HEADER: &str = "svix-signature";

/// Maximum clock difference accepted between sender and receiver.
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 5 * 60;

const SECRET_PREFIX: &str = "whsec_";
const SIGNATURE_VERSION: &str = "v1";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    #[error("Malformed timestamp")]
    InvalidTimestamp,

    #[error("Timestamp outside tolerance")]
    StaleTimestamp,

    #[error("No matching signature")]
    NoMatch,

    #[error("Signing secret is not valid base64")]
    InvalidSecret,
}

impl SignatureError {
    /// True for requests that are malformed rather than unauthenticated.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            SignatureError::MissingHeader(_) | SignatureError::InvalidTimestamp
        )
    }
}

/// Verifier bound to one signing secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    key: Vec<u8>,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier").finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: &str) -> Result<Self, SignatureError> {
        let encoded = secret.strip_prefix(SECRET_PREFIX).unwrap_or(secret);
        let key = STANDARD
            .decode(encoded)
            .map_err(|_| SignatureError::InvalidSecret)?;
        Ok(Self { key })
    }

    /// Verify a delivery against the current time.
    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), SignatureError> {
        self.verify_at(headers, body, chrono::Utc::now().timestamp())
    }

    pub fn verify_at(
        &self,
        headers: &HeaderMap,
        body: &[u8],
        now: i64,
    ) -> Result<(), SignatureError> {
        let id = header(headers, ID_HEADER)?;
        let timestamp_raw = header(headers, TIMESTAMP_HEADER)?;
        let signatures = header(headers, SIGNATURE_HEADER)?;

        let timestamp: i64 = timestamp_raw
            .trim()
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp)?;
        if now.abs_diff(timestamp) > TIMESTAMP_TOLERANCE_SECS.unsigned_abs() {
            return Err(SignatureError::StaleTimestamp);
        }

        let expected = self.mac(id, timestamp, body)?;

        let matched = signatures
            .split_whitespace()
            .filter_map(|entry| entry.split_once(','))
            .filter(|(version, _)| *version == SIGNATURE_VERSION)
            .filter_map(|(_, sig)| STANDARD.decode(sig).ok())
            .any(|candidate| bool::from(candidate.ct_eq(&expected)));

        if matched {
            Ok(())
        } else {
            Err(SignatureError::NoMatch)
        }
    }

    /// Produce a `v1,<base64>` signature for a delivery.
    pub fn sign(&self, id: &str, timestamp: i64, body: &[u8]) -> Result<String, SignatureError> {
        let mac = self.mac(id, timestamp, body)?;
        Ok(format!("{},{}", SIGNATURE_VERSION, STANDARD.encode(mac)))
    }

    fn mac(&self, id: &str, timestamp: i64, body: &[u8]) -> Result<Vec<u8>, SignatureError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).map_err(|_| SignatureError::InvalidSecret)?;
        mac.update(id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, SignatureError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(SignatureError::MissingHeader(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";
    const NOW: i64 = 1_700_000_000;

    fn signed_headers(verifier: &WebhookVerifier, body: &[u8], timestamp: i64) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ID_HEADER, HeaderValue::from_static("msg_123"));
        headers.insert(
            TIMESTAMP_HEADER,
            HeaderValue::from_str(&timestamp.to_string()).unwrap(),
        );
        let sig = verifier.sign("msg_123", timestamp, body).unwrap();
        headers.insert(
            SIGNATURE_HEADER,
            HeaderValue::from_str(&format!("v1,bm90LXRoaXMtb25l {}", sig)).unwrap(),
        );
        headers
    }

    #[test]
    fn test_valid_signature() {
        let verifier = WebhookVerifier::new(SECRET).unwrap();
        let body = br#"{"type":"user.created"}"#;
        let headers = signed_headers(&verifier, body, NOW);
        assert_eq!(verifier.verify_at(&headers, body, NOW + 10), Ok(()));
    }

    #[test]
    fn test_tampered_body() {
        let verifier = WebhookVerifier::new(SECRET).unwrap();
        let headers = signed_headers(&verifier, b"original", NOW);
        assert_eq!(
            verifier.verify_at(&headers, b"tampered", NOW),
            Err(SignatureError::NoMatch)
        );
    }

    #[test]
    fn test_wrong_secret() {
        let signer = WebhookVerifier::new(SECRET).unwrap();
        let verifier = WebhookVerifier::new("whsec_b3RoZXItc2VjcmV0").unwrap();
        let headers = signed_headers(&signer, b"body", NOW);
        assert_eq!(
            verifier.verify_at(&headers, b"body", NOW),
            Err(SignatureError::NoMatch)
        );
    }

    #[test]
    fn test_stale_timestamp() {
        let verifier = WebhookVerifier::new(SECRET).unwrap();
        let headers = signed_headers(&verifier, b"body", NOW);
        assert_eq!(
            verifier.verify_at(&headers, b"body", NOW + TIMESTAMP_TOLERANCE_SECS + 1),
            Err(SignatureError::StaleTimestamp)
        );
    }

    #[test]
    fn test_extreme_timestamps_are_stale() {
        let verifier = WebhookVerifier::new(SECRET).unwrap();
        for timestamp in [i64::MIN, i64::MAX] {
            let mut headers = signed_headers(&verifier, b"body", NOW);
            headers.insert(
                TIMESTAMP_HEADER,
                HeaderValue::from_str(&timestamp.to_string()).unwrap(),
            );
            assert_eq!(
                verifier.verify_at(&headers, b"body", NOW),
                Err(SignatureError::StaleTimestamp)
            );
        }
    }

    #[test]
    fn test_missing_headers() {
        let verifier = WebhookVerifier::new(SECRET).unwrap();
        let err = verifier
            .verify_at(&HeaderMap::new(), b"body", NOW)
            .unwrap_err();
        assert_eq!(err, SignatureError::MissingHeader(ID_HEADER));
        assert!(err.is_malformed());
    }

    #[test]
    fn test_invalid_secret() {
        assert_eq!(
            WebhookVerifier::new("whsec_***").unwrap_err(),
            SignatureError::InvalidSecret
        );
    }
}
