//! Refresh token material.
//!
//! Refresh tokens are opaque random strings handed to the client. Only their
//! SHA-256 digest is persisted; lookups hash the presented string and match
//! the digest exactly.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand::{Rng, rng};
use sha2::{Digest, Sha256};

/// Refresh token lifetime: 7 days.
pub const REFRESH_TOKEN_EXPIRY_DAYS: i64 = 7;

/// Random bytes per refresh token.
const REFRESH_TOKEN_BYTES: usize = 48;

/// Generate a cryptographically random refresh token (48 bytes, URL-safe base64).
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rng().fill(&mut bytes[..]);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hash a refresh token for storage.
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Expiry of a refresh token issued at `now`.
pub fn refresh_token_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(REFRESH_TOKEN_EXPIRY_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_has_expected_length_and_alphabet() {
        let token = generate_refresh_token();
        assert_eq!(token.len(), 64);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn tokens_are_unique() {
        assert_ne!(generate_refresh_token(), generate_refresh_token());
    }

    #[test]
    fn hash_is_stable_hex_sha256() {
        let h = hash_refresh_token("abc");
        assert_eq!(
            h,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(h, hash_refresh_token("abc"));
        assert_ne!(h, hash_refresh_token("abd"));
    }

    #[test]
    fn expiry_is_seven_days_out() {
        let now = Utc::now();
        assert_eq!(refresh_token_expiry(now) - now, Duration::days(7));
    }
}
