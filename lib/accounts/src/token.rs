//! Random tokens for generated passwords and reset links.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Generates a URL-safe random token of exactly `length` characters.
///
/// Easily confused characters (`l`, `I`, `O`, `0`) are replaced with
/// `s`, `x`, `y`, `z`.
#[must_use]
pub fn friendly_token(length: usize) -> String {
    // Four base64 characters per three bytes.
    let mut bytes = vec![0u8; (length * 3).div_ceil(4)];
    rand::thread_rng().fill_bytes(&mut bytes);

    URL_SAFE_NO_PAD
        .encode(&bytes)
        .chars()
        .map(|c| match c {
            'l' => 's',
            'I' => 'x',
            'O' => 'y',
            '0' => 'z',
            other => other,
        })
        .take(length)
        .collect()
}

/// Digest stored in place of a raw reset token.
#[must_use]
pub fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friendly_token_has_requested_length() {
        for length in [1, 7, 20, 32, 64] {
            assert_eq!(friendly_token(length).chars().count(), length);
        }
    }

    #[test]
    fn friendly_token_avoids_confusable_characters() {
        for _ in 0..50 {
            let token = friendly_token(40);
            assert!(!token.contains(&['l', 'I', 'O', '0'][..]), "token {token}");
            assert!(
                token
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            );
        }
    }

    #[test]
    fn friendly_tokens_differ() {
        assert_ne!(friendly_token(20), friendly_token(20));
    }

    #[test]
    fn digest_is_stable_hex() {
        let first = digest("reset-me");
        assert_eq!(first, digest("reset-me"));
        assert_ne!(first, digest("reset-you"));
        assert_eq!(first.len(), 64);
    }
}
