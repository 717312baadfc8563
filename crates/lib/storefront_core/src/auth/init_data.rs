//! Launch-data signature verification.
//!
//! The mini-app client receives a URL-encoded launch-data string signed by the
//! platform with a key derived from the bot token:
//!
//! ```text
//! secret_key = HMAC-SHA256(key = "WebAppData", message = bot_token)
//! hash       = hex(HMAC-SHA256(key = secret_key, message = data_check_string))
//! ```
//!
//! `data_check_string` is every field except `hash`, sorted by key and joined
//! as `key=value` lines with `\n`. Verification is pure: no I/O, and the
//! clock is an explicit argument.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::warn;

use super::crypto::{fixed_len_eq, hmac_sha256};
use crate::models::auth::{PlatformIdentity, VerifiedInitData};

/// Key used to derive the secret key from the bot token.
const WEB_APP_DATA_KEY: &[u8] = b"WebAppData";

/// Reserved field carrying the signature.
pub const HASH_FIELD: &str = "hash";

/// Default replay window: 24 hours.
pub const DEFAULT_MAX_AGE_SECS: i64 = 24 * 60 * 60;

/// Why a launch-data payload was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InitDataError {
    #[error("payload carries no signature")]
    MissingSignature,

    #[error("payload signature does not match")]
    HashMismatch,

    #[error("payload is older than the replay window")]
    PayloadExpired,

    #[error("payload user is missing or malformed")]
    MalformedUser,

    #[error("auth_date is missing or not a unix timestamp")]
    MalformedAuthDate,

    #[error("bot token is not configured")]
    MissingSecret,
}

impl InitDataError {
    /// Stable kind name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingSignature => "missing_signature",
            Self::HashMismatch => "hash_mismatch",
            Self::PayloadExpired => "payload_expired",
            Self::MalformedUser => "malformed_user",
            Self::MalformedAuthDate => "malformed_auth_date",
            Self::MissingSecret => "missing_secret",
        }
    }
}

/// Verify a launch-data string and decode the caller's identity.
///
/// Checks run in a fixed order: signature first, then `auth_date` freshness,
/// then the `user` decode. Nothing in the payload is interpreted before the
/// signature has been accepted.
pub fn verify_init_data(
    raw: &str,
    bot_token: &str,
    max_age: Duration,
    now: DateTime<Utc>,
) -> Result<VerifiedInitData, InitDataError> {
    if bot_token.is_empty() {
        return Err(InitDataError::MissingSecret);
    }

    let mut fields = BTreeMap::new();
    let mut supplied_hash: Option<String> = None;
    for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
        if key == HASH_FIELD {
            // The platform signer never emits a field twice.
            if supplied_hash.replace(value.into_owned()).is_some() {
                return Err(InitDataError::HashMismatch);
            }
            continue;
        }
        if fields.insert(key.into_owned(), value.into_owned()).is_some() {
            return Err(InitDataError::HashMismatch);
        }
    }
    let supplied_hash = supplied_hash.ok_or(InitDataError::MissingSignature)?;

    let expected = sign_check_string(&data_check_string(&fields), bot_token)?;
    if !fixed_len_eq(expected.as_bytes(), supplied_hash.as_bytes()) {
        return Err(InitDataError::HashMismatch);
    }

    let auth_date = fields
        .get("auth_date")
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or(InitDataError::MalformedAuthDate)?;
    if now.signed_duration_since(auth_date) > max_age {
        return Err(InitDataError::PayloadExpired);
    }

    let user = fields.get("user").ok_or(InitDataError::MalformedUser)?;
    let user: PlatformIdentity =
        serde_json::from_str(user).map_err(|_| InitDataError::MalformedUser)?;

    Ok(VerifiedInitData {
        user,
        auth_date,
        query_id: fields.remove("query_id"),
        start_param: fields.remove("start_param"),
    })
}

/// Verifier bound to a bot token and replay window.
///
/// Reads the wall clock at the moment of each call.
#[derive(Debug, Clone)]
pub struct InitDataVerifier {
    bot_token: String,
    max_age: Duration,
}

impl InitDataVerifier {
    /// A window that is not positive or does not fit a `Duration` falls back
    /// to [`DEFAULT_MAX_AGE_SECS`].
    pub fn new(bot_token: impl Into<String>, max_age_secs: i64) -> Self {
        let max_age = Duration::try_seconds(max_age_secs)
            .filter(|window| *window > Duration::zero())
            .unwrap_or_else(|| {
                warn!(max_age_secs, "invalid replay window, using default");
                Duration::seconds(DEFAULT_MAX_AGE_SECS)
            });
        Self {
            bot_token: bot_token.into(),
            max_age,
        }
    }

    pub fn verify(&self, raw: &str) -> Result<VerifiedInitData, InitDataError> {
        verify_init_data(raw, &self.bot_token, self.max_age, Utc::now())
    }
}

/// Build the `key=value\n...` check string from already-sorted fields.
fn data_check_string(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Hex signature of a check string under a bot token.
fn sign_check_string(check_string: &str, bot_token: &str) -> Result<String, InitDataError> {
    let secret_key = hmac_sha256(WEB_APP_DATA_KEY, bot_token.as_bytes())
        .map_err(|_| InitDataError::MissingSecret)?;
    let mac = hmac_sha256(&secret_key, check_string.as_bytes())
        .map_err(|_| InitDataError::MissingSecret)?;
    Ok(hex::encode(mac))
}

/// Build a signed launch-data string the way the platform client receives it.
///
/// Used by tests and local tooling to exercise the login flow without a
/// real client.
pub fn sign_fields(fields: &[(&str, &str)], bot_token: &str) -> Result<String, InitDataError> {
    if bot_token.is_empty() {
        return Err(InitDataError::MissingSecret);
    }
    let sorted: BTreeMap<String, String> = fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let hash = sign_check_string(&data_check_string(&sorted), bot_token)?;

    let mut out = form_urlencoded::Serializer::new(String::new());
    for (k, v) in fields {
        out.append_pair(k, v);
    }
    out.append_pair(HASH_FIELD, &hash);
    Ok(out.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "botsecret";

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn payload(user: &str, auth_date: i64) -> String {
        sign_fields(&[("user", user), ("auth_date", &auth_date.to_string())], SECRET).unwrap()
    }

    fn max_age() -> Duration {
        Duration::seconds(DEFAULT_MAX_AGE_SECS)
    }

    /// Replace the `hash=` value in a raw payload.
    fn with_hash(raw: &str, hash: &str) -> String {
        let (head, _) = raw.rsplit_once("hash=").unwrap();
        format!("{head}hash={hash}")
    }

    fn hash_of(raw: &str) -> String {
        raw.rsplit_once("hash=").unwrap().1.to_string()
    }

    #[test]
    fn accepts_known_vector() {
        // Signed independently with the platform's documented algorithm.
        let raw = "query_id=AAH\
                   &user=%7B%22id%22%3A42%2C%22username%22%3A%22alice%22%7D\
                   &auth_date=1700000000\
                   &hash=ebd4e89e39f58ef0c851e0743d5cbf2e6db712b8842e7eb5c09fb464df3cff12";
        let verified = verify_init_data(raw, SECRET, max_age(), at(1_700_000_100)).unwrap();
        assert_eq!(verified.user.numeric_id, 42);
        assert_eq!(verified.user.username.as_deref(), Some("alice"));
        assert_eq!(verified.query_id.as_deref(), Some("AAH"));
        assert_eq!(verified.auth_date, at(1_700_000_000));
        assert_eq!(verified.start_param, None);
    }

    #[test]
    fn fresh_payload_yields_user_id() {
        let now = 1_700_000_000;
        let raw = payload(r#"{"id":42}"#, now);
        let verified = verify_init_data(&raw, SECRET, max_age(), at(now)).unwrap();
        assert_eq!(verified.user, PlatformIdentity::from_id(42));
    }

    #[test]
    fn optional_user_fields_are_decoded() {
        let now = 1_700_000_000;
        let raw = payload(
            r#"{"id":7,"first_name":"Ann","language_code":"en","is_premium":true,"photo_url":"x"}"#,
            now,
        );
        let user = verify_init_data(&raw, SECRET, max_age(), at(now)).unwrap().user;
        assert_eq!(user.first_name.as_deref(), Some("Ann"));
        assert_eq!(user.language_code.as_deref(), Some("en"));
        assert_eq!(user.is_premium, Some(true));
    }

    #[test]
    fn field_order_does_not_matter() {
        let now = 1_700_000_000;
        let a = sign_fields(
            &[("user", r#"{"id":1}"#), ("auth_date", "1700000000"), ("start_param", "promo")],
            SECRET,
        )
        .unwrap();
        let b = sign_fields(
            &[("start_param", "promo"), ("auth_date", "1700000000"), ("user", r#"{"id":1}"#)],
            SECRET,
        )
        .unwrap();
        assert_eq!(hash_of(&a), hash_of(&b));
        let verified = verify_init_data(&b, SECRET, max_age(), at(now)).unwrap();
        assert_eq!(verified.start_param.as_deref(), Some("promo"));
    }

    #[test]
    fn every_single_char_flip_is_a_mismatch() {
        let now = 1_700_000_000;
        let raw = payload(r#"{"id":42}"#, now);
        let hash = hash_of(&raw);
        for i in 0..hash.len() {
            let mut bytes = hash.clone().into_bytes();
            bytes[i] = if bytes[i] == b'0' { b'1' } else { b'0' };
            let tampered = with_hash(&raw, std::str::from_utf8(&bytes).unwrap());
            assert_eq!(
                verify_init_data(&tampered, SECRET, max_age(), at(now)),
                Err(InitDataError::HashMismatch),
                "flip at {i}"
            );
        }
    }

    #[test]
    fn truncated_or_extended_hash_is_a_mismatch() {
        let now = 1_700_000_000;
        let raw = payload(r#"{"id":42}"#, now);
        let hash = hash_of(&raw);
        let candidates = vec![hash[..63].to_string(), format!("{hash}0"), String::new()];
        for bad in &candidates {
            assert_eq!(
                verify_init_data(&with_hash(&raw, bad), SECRET, max_age(), at(now)),
                Err(InitDataError::HashMismatch)
            );
        }
    }

    #[test]
    fn tampered_user_is_a_mismatch() {
        let now = 1_700_000_000;
        let raw = payload(r#"{"id":42}"#, now);
        let forged = raw.replace("42", "43");
        assert_eq!(
            verify_init_data(&forged, SECRET, max_age(), at(now)),
            Err(InitDataError::HashMismatch)
        );
    }

    #[test]
    fn wrong_bot_token_is_a_mismatch() {
        let now = 1_700_000_000;
        let raw = payload(r#"{"id":42}"#, now);
        assert_eq!(
            verify_init_data(&raw, "other", max_age(), at(now)),
            Err(InitDataError::HashMismatch)
        );
    }

    #[test]
    fn missing_hash_is_reported() {
        assert_eq!(
            verify_init_data("user=%7B%22id%22%3A1%7D&auth_date=1", SECRET, max_age(), at(1)),
            Err(InitDataError::MissingSignature)
        );
    }

    #[test]
    fn empty_secret_fails_closed() {
        let raw = payload(r#"{"id":42}"#, 1);
        assert_eq!(
            verify_init_data(&raw, "", max_age(), at(1)),
            Err(InitDataError::MissingSecret)
        );
        assert_eq!(sign_fields(&[], ""), Err(InitDataError::MissingSecret));
    }

    #[test]
    fn stale_payload_is_expired_even_when_signed() {
        let signed_at = 1_700_000_000;
        let raw = payload(r#"{"id":42}"#, signed_at);
        let now = at(signed_at + DEFAULT_MAX_AGE_SECS + 1);
        assert_eq!(
            verify_init_data(&raw, SECRET, max_age(), now),
            Err(InitDataError::PayloadExpired)
        );
    }

    #[test]
    fn payload_exactly_at_window_edge_is_accepted() {
        let signed_at = 1_700_000_000;
        let raw = payload(r#"{"id":42}"#, signed_at);
        let now = at(signed_at + DEFAULT_MAX_AGE_SECS);
        assert!(verify_init_data(&raw, SECRET, max_age(), now).is_ok());
    }

    #[test]
    fn bad_auth_date_is_reported_after_signature() {
        let raw = sign_fields(&[("user", r#"{"id":1}"#), ("auth_date", "yesterday")], SECRET)
            .unwrap();
        assert_eq!(
            verify_init_data(&raw, SECRET, max_age(), at(1)),
            Err(InitDataError::MalformedAuthDate)
        );
        let raw = sign_fields(&[("user", r#"{"id":1}"#)], SECRET).unwrap();
        assert_eq!(
            verify_init_data(&raw, SECRET, max_age(), at(1)),
            Err(InitDataError::MalformedAuthDate)
        );
    }

    #[test]
    fn malformed_user_is_reported() {
        let now = 1_700_000_000;
        for user in [r#"{"username":"x"}"#, r#"{"id":"abc"}"#, "not json", r#"{"id":1.5}"#] {
            let raw = payload(user, now);
            assert_eq!(
                verify_init_data(&raw, SECRET, max_age(), at(now)),
                Err(InitDataError::MalformedUser),
                "user={user}"
            );
        }
        let raw = sign_fields(&[("auth_date", "1700000000")], SECRET).unwrap();
        assert_eq!(
            verify_init_data(&raw, SECRET, max_age(), at(now)),
            Err(InitDataError::MalformedUser)
        );
    }

    #[test]
    fn duplicate_fields_are_rejected() {
        let now = 1_700_000_000;
        let raw = payload(r#"{"id":42}"#, now);
        let doubled = format!("user=%7B%22id%22%3A1%7D&{raw}");
        assert_eq!(
            verify_init_data(&doubled, SECRET, max_age(), at(now)),
            Err(InitDataError::HashMismatch)
        );
        let double_hash = format!("{raw}&hash=00");
        assert_eq!(
            verify_init_data(&double_hash, SECRET, max_age(), at(now)),
            Err(InitDataError::HashMismatch)
        );
    }

    #[test]
    fn garbage_input_never_panics() {
        for raw in ["", "&&&", "=", "hash", "hash=&hash", "%ZZ=%%", "user=%7B&hash=zz"] {
            assert!(verify_init_data(raw, SECRET, max_age(), at(0)).is_err());
        }
    }

    #[test]
    fn verifier_uses_current_clock() {
        let now = Utc::now().timestamp();
        let verifier = InitDataVerifier::new(SECRET, 60);
        assert!(verifier.verify(&payload(r#"{"id":5}"#, now)).is_ok());
        assert_eq!(
            verifier.verify(&payload(r#"{"id":5}"#, now - 3600)),
            Err(InitDataError::PayloadExpired)
        );
    }

    #[test]
    fn unusable_window_falls_back_to_default() {
        let now = Utc::now().timestamp();
        for bad in [0, -60, i64::MAX] {
            let verifier = InitDataVerifier::new(SECRET, bad);
            assert!(verifier.verify(&payload(r#"{"id":5}"#, now - 3600)).is_ok(), "{bad}");
            assert_eq!(
                verifier.verify(&payload(r#"{"id":5}"#, now - 2 * DEFAULT_MAX_AGE_SECS)),
                Err(InitDataError::PayloadExpired),
                "{bad}"
            );
        }
    }
}
