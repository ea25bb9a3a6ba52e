//! PKCE helpers for the login flow.
//!
//! Only the S256 challenge method is used; the identity provider rejects
//! anything else.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

/// Generate a URL-safe random token: 32 cryptographically random bytes,
/// base64url-encoded without padding (43 characters).
///
/// Each flow start draws three independent tokens from this, for the
/// `state`, `nonce` and PKCE verifier values.
pub fn random_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..32).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Compute the S256 code challenge for a verifier:
/// BASE64URL(SHA256(UTF8(code_verifier))), no padding.
pub fn code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}
