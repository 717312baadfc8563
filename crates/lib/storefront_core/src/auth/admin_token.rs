//! Self-signed admin tokens.
//!
//! Format: `base64url(json(payload)) + "." + base64url(HMAC-SHA256(secret, body))`
//! with unpadded URL-safe base64. The MAC covers the encoded body bytes
//! exactly as they appear in the token.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use super::crypto::{fixed_len_eq, hmac_sha256};
use crate::models::auth::AdminTokenPayload;

/// Why a token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token is malformed")]
    TokenMalformed,

    #[error("token has expired")]
    TokenExpired,

    #[error("token signature is invalid")]
    TokenSignatureInvalid,

    #[error("token secret is not configured")]
    MissingSecret,
}

impl TokenError {
    /// Stable kind name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TokenMalformed => "token_malformed",
            Self::TokenExpired => "token_expired",
            Self::TokenSignatureInvalid => "token_signature_invalid",
            Self::MissingSecret => "missing_secret",
        }
    }
}

impl AdminTokenPayload {
    /// Payload for `subject` expiring `ttl` after `now`.
    ///
    /// `None` when the expiry falls outside the representable time range.
    pub fn new(
        subject: i64,
        username: Option<String>,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let expires_at = now.checked_add_signed(ttl)?;
        Some(Self {
            subject,
            username,
            expires_at_ms: expires_at.timestamp_millis(),
        })
    }
}

/// Sign a payload into a compact token.
pub fn sign(payload: &AdminTokenPayload, secret: &str) -> Result<String, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }
    let json = serde_json::to_vec(payload).map_err(|_| TokenError::TokenMalformed)?;
    let body = URL_SAFE_NO_PAD.encode(json);
    let signature = signature_for(&body, secret)?;
    Ok(format!("{body}.{signature}"))
}

/// Decode and fully validate a token, classifying any failure.
///
/// The signature is checked before the body is decoded; an expired token is
/// only reported once the signature has been accepted.
pub fn decode(token: &str, secret: &str, now_ms: i64) -> Result<AdminTokenPayload, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }

    let mut segments = token.split('.');
    let (Some(body), Some(signature), None) = (segments.next(), segments.next(), segments.next())
    else {
        return Err(TokenError::TokenMalformed);
    };
    if body.is_empty() || signature.is_empty() {
        return Err(TokenError::TokenMalformed);
    }

    let expected = signature_for(body, secret)?;
    if !fixed_len_eq(expected.as_bytes(), signature.as_bytes()) {
        return Err(TokenError::TokenSignatureInvalid);
    }

    let json = URL_SAFE_NO_PAD
        .decode(body)
        .map_err(|_| TokenError::TokenMalformed)?;
    let payload: AdminTokenPayload =
        serde_json::from_slice(&json).map_err(|_| TokenError::TokenMalformed)?;

    if now_ms >= payload.expires_at_ms {
        return Err(TokenError::TokenExpired);
    }
    Ok(payload)
}

/// Verify a token; any failure is "no identity".
pub fn verify(token: &str, secret: &str, now_ms: i64) -> Option<AdminTokenPayload> {
    decode(token, secret, now_ms).ok()
}

fn signature_for(body: &str, secret: &str) -> Result<String, TokenError> {
    let mac = hmac_sha256(secret.as_bytes(), body.as_bytes())
        .map_err(|_| TokenError::MissingSecret)?;
    Ok(URL_SAFE_NO_PAD.encode(mac))
}
