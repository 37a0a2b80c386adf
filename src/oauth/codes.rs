//! Encrypted authorization codes.
//!
//! The code handed to the MCP client is the session itself, sealed with
//! AES-256-GCM under a key derived from the shared API secret. The issuing side
//! keeps nothing; whoever holds the secret can open the code.
//!
//! Format:  base64url_nopad( iv[12] || ciphertext || tag[16] )
//!
//! The plaintext is JSON:
//! ```json
//! {
//!   "access_token": "...",
//!   "refresh_token": "...",
//!   "expires_in": 3600,
//!   "created_at": 1700000000000
//! }
//! ```

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

pub const IV_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// Session credentials carried inside an authorization code.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationPayload {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
}

impl fmt::Debug for AuthorizationPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationPayload")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("expires_in", &self.expires_in)
            .field("created_at", &self.created_at)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodeError {
    #[error("shared secret is not configured")]
    MissingSecret,
    #[error("failed to serialize payload: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("encryption failed")]
    Encrypt,
    #[error("invalid authorization code encoding")]
    Encoding,
    #[error("authorization code too short ({0} bytes)")]
    TooShort(usize),
    #[error("authorization code is invalid or tampered")]
    Decrypt,
    #[error("authorization code payload corrupt")]
    Payload(#[source] serde_json::Error),
}

/// Derive the AES-256 key from the shared secret. Any secret length works;
/// the key is always the 32-byte SHA-256 digest.
pub fn derive_key(secret: &str) -> [u8; 32] {
    Sha256::digest(secret.as_bytes()).into()
}

fn cipher_for(secret: &str) -> Result<Aes256Gcm, CodeError> {
    if secret.is_empty() {
        return Err(CodeError::MissingSecret);
    }
    Ok(Aes256Gcm::new(&derive_key(secret).into()))
}

/// Seal `payload` into an authorization code.
///
/// The returned string is safe to use as a URL query parameter (base64url, no padding).
/// A fresh random IV is drawn on every call.
pub fn encrypt_auth_code<T: Serialize>(payload: &T, secret: &str) -> Result<String, CodeError> {
    let cipher = cipher_for(secret)?;
    let plaintext = serde_json::to_vec(payload).map_err(CodeError::Serialize)?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    // aes-gcm appends the tag, so this is already ciphertext || tag
    let sealed = cipher
        .encrypt(&nonce, plaintext.as_ref())
        .map_err(|_| CodeError::Encrypt)?;

    let mut blob = Vec::with_capacity(IV_LEN + sealed.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&sealed);

    Ok(URL_SAFE_NO_PAD.encode(&blob))
}

/// Open an authorization code produced by [`encrypt_auth_code`].
///
/// Fails closed: a bad tag, wrong secret, truncated input or a plaintext that
/// doesn't parse as `T` all return an error and nothing else.
pub fn decrypt_auth_code<T: DeserializeOwned>(code: &str, secret: &str) -> Result<T, CodeError> {
    let cipher = cipher_for(secret)?;
    let blob = URL_SAFE_NO_PAD
        .decode(code)
        .map_err(|_| CodeError::Encoding)?;

    if blob.len() < IV_LEN + TAG_LEN {
        return Err(CodeError::TooShort(blob.len()));
    }

    let (iv, sealed) = blob.split_at(IV_LEN);
    let plaintext = cipher
        .decrypt(Nonce::from_slice(iv), sealed)
        .map_err(|_| CodeError::Decrypt)?;

    serde_json::from_slice(&plaintext).map_err(CodeError::Payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AuthorizationPayload {
        AuthorizationPayload {
            access_token: "abc".to_string(),
            refresh_token: "def".to_string(),
            expires_in: 3600,
            created_at: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_round_trip() {
        let code = encrypt_auth_code(&sample(), "test-secret").unwrap();
        let decoded: AuthorizationPayload = decrypt_auth_code(&code, "test-secret").unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn test_wire_layout() {
        let payload = sample();
        let json_len = serde_json::to_vec(&payload).unwrap().len();
        let code = encrypt_auth_code(&payload, "test-secret").unwrap();

        assert!(!code.contains('+'));
        assert!(!code.contains('/'));
        assert!(!code.contains('='));

        let raw = IV_LEN + json_len + TAG_LEN;
        assert_eq!(code.len(), (raw * 4).div_ceil(3));
        assert_eq!(URL_SAFE_NO_PAD.decode(&code).unwrap().len(), raw);
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let first = encrypt_auth_code(&sample(), "test-secret").unwrap();
        let second = encrypt_auth_code(&sample(), "test-secret").unwrap();
        assert_ne!(first, second);

        let iv_a = &URL_SAFE_NO_PAD.decode(&first).unwrap()[..IV_LEN];
        let iv_b = &URL_SAFE_NO_PAD.decode(&second).unwrap()[..IV_LEN];
        assert_ne!(iv_a, iv_b);
    }

    #[test]
    fn test_wrong_secret_fails() {
        let code = encrypt_auth_code(&sample(), "test-secret").unwrap();
        let result = decrypt_auth_code::<AuthorizationPayload>(&code, "wrong-secret");
        assert!(matches!(result, Err(CodeError::Decrypt)));
    }

    #[test]
    fn test_any_flipped_byte_fails() {
        let code = encrypt_auth_code(&sample(), "test-secret").unwrap();
        let blob = URL_SAFE_NO_PAD.decode(&code).unwrap();

        for i in 0..blob.len() {
            let mut tampered = blob.clone();
            tampered[i] ^= 0x01;
            let tampered = URL_SAFE_NO_PAD.encode(&tampered);
            let result = decrypt_auth_code::<AuthorizationPayload>(&tampered, "test-secret");
            assert!(
                matches!(result, Err(CodeError::Decrypt)),
                "byte {i} flipped but decrypt did not fail"
            );
        }
    }

    #[test]
    fn test_short_input_rejected() {
        let short = URL_SAFE_NO_PAD.encode([0u8; IV_LEN + TAG_LEN - 1]);
        let result = decrypt_auth_code::<AuthorizationPayload>(&short, "test-secret");
        assert!(matches!(result, Err(CodeError::TooShort(27))));

        // Minimum length passes the length check and fails authentication.
        let minimal = URL_SAFE_NO_PAD.encode([0u8; IV_LEN + TAG_LEN]);
        let result = decrypt_auth_code::<AuthorizationPayload>(&minimal, "test-secret");
        assert!(matches!(result, Err(CodeError::Decrypt)));
    }

    #[test]
    fn test_garbage_input_fails() {
        assert!(matches!(
            decrypt_auth_code::<AuthorizationPayload>("not a code!", "test-secret"),
            Err(CodeError::Encoding)
        ));
        assert!(matches!(
            decrypt_auth_code::<AuthorizationPayload>("", "test-secret"),
            Err(CodeError::TooShort(0))
        ));
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(
            encrypt_auth_code(&sample(), ""),
            Err(CodeError::MissingSecret)
        ));
    }

    #[test]
    fn test_payload_shape_mismatch_fails() {
        let code = encrypt_auth_code(&serde_json::json!({ "access_token": "x" }), "s").unwrap();
        let result = decrypt_auth_code::<AuthorizationPayload>(&code, "s");
        assert!(matches!(result, Err(CodeError::Payload(_))));
    }

    #[test]
    fn test_derive_key_is_sha256() {
        let key = derive_key("abc");
        let hex: String = key.iter().map(|b| format!("{b:02x}")).collect();
        assert_eq!(
            hex,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    /// Produced by the cockpit's Node `encryptAuthCode` for `sample()`.
    const COCKPIT_CODE: &str = "aI1jmCgqTeSnUuJb6-ycqNpMR6KYrBTLKap0EX3b2ra8OA1zvahKcNPyUVX2bRGLwBPjQFjeQRWiEEhuK3y4dvnYI-pZ4UcGGp1sv7nzaSSLxrHsnZmWWckgFmdfPyK1EeLjjh3d1qfSJl_GcCVtvNh4FsDJ";

    #[test]
    fn test_opens_code_from_cockpit() {
        let decoded: AuthorizationPayload = decrypt_auth_code(COCKPIT_CODE, "test-secret").unwrap();
        assert_eq!(decoded, sample());

        assert!(matches!(
            decrypt_auth_code::<AuthorizationPayload>(COCKPIT_CODE, "wrong-secret"),
            Err(CodeError::Decrypt)
        ));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("abc"));
        assert!(!rendered.contains("def"));
        assert!(rendered.contains("3600"));
    }
}
