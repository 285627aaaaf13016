//! Single-use secrets: email verification and password reset tokens, and
//! phone login codes. Only the SHA-256 digest of a link token is persisted.

use rand::{rngs::OsRng, Rng, RngCore};
use sha2::{Digest, Sha256};

/// Random bytes for an email verification link.
pub const VERIFICATION_TOKEN_BYTES: usize = 32;
/// Random bytes for a password reset link.
pub const RESET_TOKEN_BYTES: usize = 20;

#[derive(Debug, Clone)]
pub struct OneTimeToken {
    /// Hex string sent to the user
    pub plain: String,
    /// Hex SHA-256 of `plain`, stored in the database
    pub hash: String,
}

impl OneTimeToken {
    pub fn generate(bytes: usize) -> Self {
        let mut raw = vec![0u8; bytes];
        OsRng.fill_bytes(&mut raw);
        let plain = hex::encode(raw);
        let hash = hash_token(&plain);
        Self { plain, hash }
    }
}

pub fn hash_token(plain: &str) -> String {
    hex::encode(Sha256::digest(plain.as_bytes()))
}

/// Six-digit numeric login code.
pub fn generate_otp() -> String {
    OsRng.gen_range(100_000..1_000_000u32).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_hex_and_hash_to_the_stored_digest() {
        let token = OneTimeToken::generate(VERIFICATION_TOKEN_BYTES);
        assert_eq!(token.plain.len(), VERIFICATION_TOKEN_BYTES * 2);
        assert!(token.plain.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash_token(&token.plain), token.hash);
        assert_ne!(token.plain, token.hash);

        let reset = OneTimeToken::generate(RESET_TOKEN_BYTES);
        assert_eq!(reset.plain.len(), 40);
    }

    #[test]
    fn otp_is_always_six_digits() {
        for _ in 0..200 {
            let code = generate_otp();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            assert_ne!(code.as_bytes()[0], b'0');
        }
    }
}
