//! PKCE material for the authorization code flow (RFC 7636).

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{thread_rng, RngCore};
use sha2::{Digest, Sha256};

/// Generate a random code verifier.
///
/// 64 random bytes encode to 86 base64url characters, inside the
/// 43..=128 window the RFC allows.
pub fn generate_code_verifier() -> String {
    let mut bytes = [0u8; 64];
    thread_rng().fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

/// Derive the S256 code challenge for a verifier.
pub fn generate_code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    Base64UrlUnpadded::encode_string(&hasher.finalize())
}

/// Generate an opaque state token to tie the callback to this attempt.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    thread_rng().fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_length_is_within_the_rfc_window() {
        let verifier = generate_code_verifier();
        assert!(verifier.len() >= 43 && verifier.len() <= 128);
    }

    #[test]
    fn verifier_uses_the_url_safe_alphabet() {
        let verifier = generate_code_verifier();
        assert!(verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn challenge_is_deterministic_for_a_verifier() {
        let verifier = generate_code_verifier();
        assert_eq!(
            generate_code_challenge(&verifier),
            generate_code_challenge(&verifier)
        );
    }

    #[test]
    fn challenge_matches_the_rfc_7636_vector() {
        let challenge = generate_code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn challenge_never_carries_padding_or_standard_alphabet() {
        for _ in 0..32 {
            let challenge = generate_code_challenge(&generate_code_verifier());
            assert!(!challenge.contains('+'));
            assert!(!challenge.contains('/'));
            assert!(!challenge.contains('='));
        }
    }

    #[test]
    fn state_tokens_are_distinct() {
        assert_ne!(generate_state(), generate_state());
    }
}
