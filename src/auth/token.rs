//! Self-contained signed session tokens.
//!
//! Wire format: `<base64url-no-pad(JSON payload)>.<hex HMAC-SHA256>`, where
//! the payload is `{"sub": <username>, "exp": <epoch seconds>}` and the MAC is
//! computed over the encoded payload text under the server secret.
//!
//! ## Design
//! - Stateless: no revocation list, validity depends only on the token bytes,
//!   the current time and the secret.
//! - [`TokenSigner::verify`] never fails loudly. Every decode, parse or
//!   signature problem collapses to `None` so callers cannot distinguish a
//!   forged token from an expired one.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::hmac;
use serde::{Deserialize, Serialize};

/// Hex-encoded HMAC-SHA256 length.
const SIGNATURE_HEX_LEN: usize = 64;

/// Claims carried inside a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Authenticated username.
    pub sub: String,
    /// Absolute expiry, Unix epoch seconds.
    pub exp: i64,
}

/// Mints and verifies session tokens under a single secret key.
pub struct TokenSigner {
    key: hmac::Key,
}

impl TokenSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes()),
        }
    }

    /// Produce a token for `subject` expiring at `expires_at` (epoch seconds).
    pub fn mint(&self, subject: &str, expires_at: i64) -> String {
        let claims = TokenClaims {
            sub: subject.to_string(),
            exp: expires_at,
        };
        // Serializing a struct of a string and an integer cannot fail.
        let payload = serde_json::to_vec(&claims).unwrap_or_default();
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload);
        let signature = hmac::sign(&self.key, payload_b64.as_bytes());
        format!("{payload_b64}.{}", hex::encode(signature.as_ref()))
    }

    /// Verify a token against the current clock.
    pub fn verify(&self, token: &str) -> Option<TokenClaims> {
        self.verify_at(token, crate::util::epoch_secs())
    }

    /// Verify a token as of `now` (epoch seconds).
    pub fn verify_at(&self, token: &str, now: i64) -> Option<TokenClaims> {
        let mut parts = token.split('.');
        let (Some(payload_b64), Some(signature_hex), None) =
            (parts.next(), parts.next(), parts.next())
        else {
            return None;
        };

        // Only the canonical lowercase rendering is accepted, so every byte of
        // the signature text is covered by the check.
        if signature_hex.len() != SIGNATURE_HEX_LEN
            || !signature_hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return None;
        }
        let signature = hex::decode(signature_hex).ok()?;
        hmac::verify(&self.key, payload_b64.as_bytes(), &signature).ok()?;

        let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
        let claims: TokenClaims = serde_json::from_slice(&payload).ok()?;
        if claims.exp < now {
            return None;
        }
        Some(claims)
    }
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenSigner { key: <redacted> }")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn signer() -> TokenSigner {
        TokenSigner::new("unit-test-secret")
    }

    /// Sign arbitrary payload text the way `mint` does.
    fn sign_raw(signer: &TokenSigner, payload_b64: &str) -> String {
        let tag = hmac::sign(&signer.key, payload_b64.as_bytes());
        format!("{payload_b64}.{}", hex::encode(tag.as_ref()))
    }

    #[test]
    fn mint_then_verify_returns_subject() {
        let s = signer();
        let token = s.mint("alice", NOW + 3600);
        let claims = s.verify_at(&token, NOW).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.exp, NOW + 3600);
    }

    #[test]
    fn token_shape_matches_wire_format() {
        let token = signer().mint("alice", NOW);
        let (payload, sig) = token.split_once('.').unwrap();
        assert!(!payload.contains('='));
        assert_eq!(sig.len(), SIGNATURE_HEX_LEN);

        let decoded = URL_SAFE_NO_PAD.decode(payload).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(value, serde_json::json!({"sub": "alice", "exp": NOW}));
    }

    #[test]
    fn expired_token_rejected_even_with_valid_signature() {
        let s = signer();
        let token = s.mint("alice", NOW - 1);
        assert!(s.verify_at(&token, NOW).is_none());
    }

    #[test]
    fn token_valid_through_its_expiry_second() {
        let s = signer();
        let token = s.mint("alice", NOW);
        assert!(s.verify_at(&token, NOW).is_some());
        assert!(s.verify_at(&token, NOW + 1).is_none());
    }

    #[test]
    fn any_single_byte_mutation_is_rejected() {
        let s = signer();
        let token = s.mint("alice", NOW + 3600);
        let bytes = token.as_bytes();
        for i in 0..bytes.len() {
            for replacement in [b'A', b'0', b'f', b'.', b'_'] {
                if bytes[i] == replacement {
                    continue;
                }
                let mut mutated = bytes.to_vec();
                mutated[i] = replacement;
                let mutated = String::from_utf8(mutated).unwrap();
                assert!(
                    s.verify_at(&mutated, NOW).is_none(),
                    "mutation at {i} to {} accepted",
                    replacement as char
                );
            }
        }
    }

    #[test]
    fn uppercase_signature_rejected() {
        let s = signer();
        let token = s.mint("alice", NOW + 3600);
        let (payload, sig) = token.split_once('.').unwrap();
        let shouted = format!("{payload}.{}", sig.to_ascii_uppercase());
        assert!(s.verify_at(&shouted, NOW).is_none());
    }

    #[test]
    fn different_secret_rejected() {
        let token = signer().mint("alice", NOW + 3600);
        assert!(TokenSigner::new("other-secret")
            .verify_at(&token, NOW)
            .is_none());
    }

    #[test]
    fn wrong_part_count_rejected() {
        let s = signer();
        let token = s.mint("alice", NOW + 3600);
        assert!(s.verify_at("", NOW).is_none());
        assert!(s.verify_at("no-dot-here", NOW).is_none());
        assert!(s.verify_at(&format!("{token}.extra"), NOW).is_none());
    }

    #[test]
    fn correctly_signed_garbage_payloads_rejected() {
        let s = signer();
        // Not base64.
        assert!(s.verify_at(&sign_raw(&s, "!!!"), NOW).is_none());
        // Base64 but not JSON.
        let not_json = URL_SAFE_NO_PAD.encode(b"hello");
        assert!(s.verify_at(&sign_raw(&s, &not_json), NOW).is_none());
        // JSON missing `exp`.
        let no_exp = URL_SAFE_NO_PAD.encode(br#"{"sub":"alice"}"#);
        assert!(s.verify_at(&sign_raw(&s, &no_exp), NOW).is_none());
        // JSON missing `sub`.
        let no_sub = URL_SAFE_NO_PAD.encode(br#"{"exp":9999999999}"#);
        assert!(s.verify_at(&sign_raw(&s, &no_sub), NOW).is_none());
        // Wrong field types.
        let bad_types = URL_SAFE_NO_PAD.encode(br#"{"sub":1,"exp":"soon"}"#);
        assert!(s.verify_at(&sign_raw(&s, &bad_types), NOW).is_none());
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let rendered = format!("{:?}", TokenSigner::new("hunter2"));
        assert!(!rendered.contains("hunter2"));
    }
}
