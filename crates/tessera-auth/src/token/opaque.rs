//! Refresh token codec.
//!
//! A refresh token is `base64url(generation || tag)` where `tag` is the first
//! 16 bytes of HMAC-SHA256 over the generation. Encoding is deterministic per
//! generation, so Identify can rebuild the refresh token for an access token's
//! generation and compare hashes. The tag keeps the token underivable from a
//! leaked access token without the server secret.

use base64::{Engine, engine::general_purpose::STANDARD, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::error::AuthError;
use crate::types::Generation;

type HmacSha256 = Hmac<Sha256>;

/// Minimum accepted secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

const GENERATION_LEN: usize = 16;
const TAG_LEN: usize = 16;
const TOKEN_LEN: usize = GENERATION_LEN + TAG_LEN;

/// Encodes generations into refresh tokens and back.
#[derive(Clone)]
pub struct RefreshTokenCodec {
    secret: Vec<u8>,
}

impl RefreshTokenCodec {
    /// Creates a codec from raw secret bytes.
    ///
    /// # Errors
    /// Returns `AuthError::Configuration` if the secret is shorter than
    /// [`MIN_SECRET_LEN`].
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, AuthError> {
        let secret = secret.into();
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::configuration(format!(
                "refresh codec secret must be at least {MIN_SECRET_LEN} bytes, got {}",
                secret.len()
            )));
        }
        Ok(Self { secret })
    }

    /// Creates a codec from a standard base64 secret, as found in configuration.
    ///
    /// # Errors
    /// Returns `AuthError::Configuration` if the value is not base64 or too short.
    pub fn from_base64(encoded: &str) -> Result<Self, AuthError> {
        let secret = STANDARD
            .decode(encoded.trim())
            .map_err(|e| AuthError::configuration(format!("refresh codec secret: {e}")))?;
        Self::new(secret)
    }

    /// Creates a codec with a random secret.
    #[must_use]
    pub fn generate() -> Self {
        let mut secret = vec![0u8; MIN_SECRET_LEN];
        rand::thread_rng().fill_bytes(&mut secret);
        Self { secret }
    }

    /// Encodes a generation into a refresh token.
    #[must_use]
    pub fn encode(&self, generation: &Generation) -> String {
        let mut raw = Vec::with_capacity(TOKEN_LEN);
        raw.extend_from_slice(generation.as_bytes());
        raw.extend_from_slice(&self.tag(generation.as_bytes())[..TAG_LEN]);
        URL_SAFE_NO_PAD.encode(raw)
    }

    /// Decodes a refresh token back into its generation.
    ///
    /// # Errors
    /// Returns `AuthError::MalformedToken` if the token is not valid base64url,
    /// has the wrong length, or fails tag verification.
    pub fn decode(&self, token: &str) -> Result<Generation, AuthError> {
        let raw = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| AuthError::malformed_token("refresh token is not base64url"))?;
        if raw.len() != TOKEN_LEN {
            return Err(AuthError::malformed_token("refresh token has wrong length"));
        }

        let (gen_bytes, tag) = raw.split_at(GENERATION_LEN);
        let mut mac = self.mac();
        mac.update(gen_bytes);
        mac.verify_truncated_left(tag)
            .map_err(|_| AuthError::malformed_token("refresh token failed verification"))?;

        let mut bytes = [0u8; GENERATION_LEN];
        bytes.copy_from_slice(gen_bytes);
        Ok(Generation::from_bytes(bytes))
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size")
    }

    fn tag(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = self.mac();
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }
}

impl std::fmt::Debug for RefreshTokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshTokenCodec").finish_non_exhaustive()
    }
}
