//! Opaque bearer tokens for sessions and invitations.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

/// Random bytes per token (256 bits of entropy).
const TOKEN_BYTES: usize = 32;

/// Generate an unguessable URL-safe token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a token for storage and lookup. Tokens are never stored in clear.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Cheap shape check so obviously bogus input skips the store round trip.
pub fn looks_like_token(token: &str) -> bool {
    let len = token.len();
    (16..=256).contains(&len)
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
