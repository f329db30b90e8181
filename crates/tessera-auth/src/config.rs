//! Token lifecycle configuration.
//!
//! Covers token lifetimes, signing key material, the refresh-token codec
//! secret, Argon2 cost parameters and anomaly notification.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root token lifecycle configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// issuer = "https://auth.example.com"
///
/// [auth.tokens]
/// access_token_lifetime = "15m"
/// refresh_token_lifetime = "30d"
///
/// [auth.signing]
/// algorithm = "ES384"
/// private_key_path = "/etc/tessera/signing.pem"
/// public_key_path = "/etc/tessera/signing.pub.pem"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Issuer written to and required in the `iss` claim.
    pub issuer: String,

    /// Token lifetimes.
    pub tokens: TokenLifetimeConfig,

    /// Access token signing.
    pub signing: SigningConfig,

    /// Refresh token codec.
    pub refresh: RefreshCodecConfig,

    /// Argon2 cost parameters for refresh token hashes.
    pub hashing: HashingConfig,

    /// Origin anomaly notification.
    pub anomaly: AnomalyConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080".to_string(),
            tokens: TokenLifetimeConfig::default(),
            signing: SigningConfig::default(),
            refresh: RefreshCodecConfig::default(),
            hashing: HashingConfig::default(),
            anomaly: AnomalyConfig::default(),
        }
    }
}

/// Token lifetime configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenLifetimeConfig {
    /// Access token lifetime, enforced by Identify and Revoke.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// How long after issuance a pair may still be refreshed.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,
}

impl Default for TokenLifetimeConfig {
    fn default() -> Self {
        Self {
            access_token_lifetime: Duration::from_secs(15 * 60), // 15 minutes
            refresh_token_lifetime: Duration::from_secs(30 * 24 * 3600), // 30 days
        }
    }
}

/// Access token signing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Signing algorithm.
    /// Supported: "RS256", "RS384", "ES384"
    pub algorithm: String,

    /// Path to the PEM-encoded private key.
    pub private_key_path: Option<PathBuf>,

    /// Path to the PEM-encoded public key.
    pub public_key_path: Option<PathBuf>,

    /// Key ID written to the JWT header.
    pub kid: Option<String>,

    /// Generate a throwaway key pair when none is configured.
    /// Every restart invalidates all outstanding tokens. Development only.
    pub allow_ephemeral_key: bool,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            algorithm: "RS384".to_string(),
            private_key_path: None,
            public_key_path: None,
            kid: None,
            allow_ephemeral_key: false,
        }
    }
}

/// Refresh token codec configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RefreshCodecConfig {
    /// Base64-encoded secret used to authenticate encoded generations.
    /// Must decode to at least 32 bytes.
    pub codec_secret: Option<String>,
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HashingConfig {
    /// Memory cost in KiB.
    pub memory_kib: u32,

    /// Number of passes.
    pub iterations: u32,

    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        // argon2 crate defaults (OWASP minimum for Argon2id)
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Origin anomaly notification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Emit notifications at all.
    pub enabled: bool,

    /// Deliver notifications to this URL instead of the log.
    pub webhook_url: Option<String>,

    /// HMAC secret for the `X-Signature-256` header.
    pub webhook_secret: Option<String>,

    /// Webhook request timeout.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook_url: None,
            webhook_secret: None,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// Key material is only checked for presence here; parsing happens when
    /// the keys are loaded.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The issuer is empty
    /// - The signing algorithm is not supported
    /// - A lifetime is zero or the refresh window is shorter than the access lifetime
    /// - Argon2 parameters are out of range
    ///
    /// Returns `ConfigError::Missing` if key material is absent and
    /// `allow_ephemeral_key` is off.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::InvalidValue(
                "issuer cannot be empty".to_string(),
            ));
        }

        match self.signing.algorithm.as_str() {
            "RS256" | "RS384" | "ES384" => {}
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "Invalid signing algorithm: '{}'. Must be RS256, RS384, or ES384",
                    other
                )));
            }
        }

        if self.tokens.access_token_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "tokens.access_token_lifetime must be > 0".to_string(),
            ));
        }
        if self.tokens.refresh_token_lifetime < self.tokens.access_token_lifetime {
            return Err(ConfigError::InvalidValue(
                "tokens.refresh_token_lifetime must be >= tokens.access_token_lifetime"
                    .to_string(),
            ));
        }

        if !self.signing.allow_ephemeral_key {
            if self.signing.private_key_path.is_none() {
                return Err(ConfigError::Missing("signing.private_key_path".to_string()));
            }
            if self.signing.public_key_path.is_none() {
                return Err(ConfigError::Missing("signing.public_key_path".to_string()));
            }
            if self.refresh.codec_secret.is_none() {
                return Err(ConfigError::Missing("refresh.codec_secret".to_string()));
            }
        }

        if self.hashing.iterations == 0 || self.hashing.parallelism == 0 {
            return Err(ConfigError::InvalidValue(
                "hashing.iterations and hashing.parallelism must be > 0".to_string(),
            ));
        }
        if self.hashing.memory_kib < 8 * self.hashing.parallelism {
            return Err(ConfigError::InvalidValue(
                "hashing.memory_kib must be at least 8 * hashing.parallelism".to_string(),
            ));
        }

        if self.anomaly.webhook_secret.is_some() && self.anomaly.webhook_url.is_none() {
            return Err(ConfigError::InvalidValue(
                "anomaly.webhook_secret requires anomaly.webhook_url".to_string(),
            ));
        }

        Ok(())
    }
}
