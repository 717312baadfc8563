//! HMAC-SHA256 and constant-time comparison helpers.

use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// `HMAC-SHA256(key, message)`.
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<Vec<u8>, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(key)?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Lowercase hex SHA-256 of a token, as stored in `admin_sessions.token_hash`.
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Compares an attacker-supplied value against a fixed-length expected value.
///
/// The loop always runs over `expected.len()` bytes: `supplied` is read with
/// zero padding past its end, and the length comparison is folded into the
/// same result instead of returning early. Cost depends only on the expected
/// length.
pub fn fixed_len_eq(expected: &[u8], supplied: &[u8]) -> bool {
    let same_len = (supplied.len() as u64).ct_eq(&(expected.len() as u64));
    let mut diff = 0u8;
    for (i, e) in expected.iter().enumerate() {
        diff |= e ^ supplied.get(i).copied().unwrap_or(0);
    }
    bool::from(same_len & diff.ct_eq(&0))
}
