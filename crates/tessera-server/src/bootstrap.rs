//! Builds the rotation engine from configuration.
//!
//! Key material fails closed: configured paths must load, and an ephemeral
//! key is only generated when `auth.signing.allow_ephemeral_key` is set.

use std::{fs, sync::Arc};

use anyhow::{Context, bail};
use tessera_auth::{
    AuthConfig, InMemorySessionStore, JwtService, RefreshTokenCodec, RotationEngine,
    SecretHasher, SessionStore, SigningAlgorithm, SigningKeyPair, anomaly::notifier_from_config,
    config::SigningConfig,
};
use tessera_auth_postgres::{PostgresSessionStore, migrations};

use crate::config::{AppConfig, PostgresStorageConfig, StorageBackend};

const DEFAULT_KID: &str = "tessera-signing-1";

/// Loads the signing key pair from the configured PEM files.
pub fn load_signing_key(signing: &SigningConfig) -> anyhow::Result<SigningKeyPair> {
    let algorithm: SigningAlgorithm = signing
        .algorithm
        .parse()
        .map_err(|e| anyhow::anyhow!("auth.signing.algorithm: {e}"))?;

    match (&signing.private_key_path, &signing.public_key_path) {
        (Some(private_path), Some(public_path)) => {
            let private_pem = fs::read_to_string(private_path).with_context(|| {
                format!("reading signing private key {}", private_path.display())
            })?;
            let public_pem = fs::read_to_string(public_path).with_context(|| {
                format!("reading signing public key {}", public_path.display())
            })?;
            let kid = signing.kid.clone().unwrap_or_else(|| DEFAULT_KID.to_string());
            let key = SigningKeyPair::from_pem(kid, algorithm, &private_pem, &public_pem)
                .context("parsing signing key pair")?;
            tracing::info!(kid = %key.kid, algorithm = %algorithm, "Signing key loaded");
            Ok(key)
        }
        (None, None) if signing.allow_ephemeral_key => {
            let key = SigningKeyPair::generate(algorithm).context("generating signing key")?;
            tracing::warn!(
                kid = %key.kid,
                algorithm = %algorithm,
                "Using an ephemeral signing key; all tokens become invalid on restart"
            );
            Ok(key)
        }
        _ => bail!("auth.signing requires both private_key_path and public_key_path"),
    }
}

/// Builds the refresh token codec from the configured secret.
pub fn load_codec(auth: &AuthConfig) -> anyhow::Result<RefreshTokenCodec> {
    match &auth.refresh.codec_secret {
        Some(secret) => {
            RefreshTokenCodec::from_base64(secret).context("loading auth.refresh.codec_secret")
        }
        None if auth.signing.allow_ephemeral_key => {
            tracing::warn!("Using an ephemeral refresh codec secret");
            Ok(RefreshTokenCodec::generate())
        }
        None => bail!("auth.refresh.codec_secret is required"),
    }
}

/// Opens the configured session store, running migrations for Postgres.
pub async fn build_store(cfg: &AppConfig) -> anyhow::Result<Arc<dyn SessionStore>> {
    match cfg.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory session store; sessions are lost on restart");
            Ok(Arc::new(InMemorySessionStore::new()))
        }
        StorageBackend::Postgres => {
            let pool = connect_with_retry(&cfg.storage.postgres).await?;
            migrations::run(&pool)
                .await
                .context("running session store migrations")?;
            tracing::info!("Postgres session store ready");
            Ok(Arc::new(PostgresSessionStore::new(Arc::new(pool))))
        }
    }
}

async fn connect_with_retry(
    pg: &PostgresStorageConfig,
) -> anyhow::Result<tessera_auth_postgres::PgPool> {
    let url = pg.connection_url();
    let mut attempt = 0;
    loop {
        match tessera_auth_postgres::connect(&url, pg.pool_size, pg.connect_timeout()).await {
            Ok(pool) => return Ok(pool),
            Err(e) if attempt < pg.connect_retries && e.is_connection_error() => {
                attempt += 1;
                tracing::warn!(
                    error = %e,
                    attempt,
                    max_retries = pg.connect_retries,
                    "Postgres connection failed, retrying"
                );
                tokio::time::sleep(pg.connect_retry_delay).await;
            }
            Err(e) => return Err(e).context("connecting to Postgres"),
        }
    }
}

/// Assembles the rotation engine from configuration.
pub async fn build_engine(cfg: &AppConfig) -> anyhow::Result<RotationEngine> {
    let auth = &cfg.auth;

    let access_lifetime = time::Duration::try_from(auth.tokens.access_token_lifetime)
        .context("auth.tokens.access_token_lifetime out of range")?;
    let refresh_window = time::Duration::try_from(auth.tokens.refresh_token_lifetime)
        .context("auth.tokens.refresh_token_lifetime out of range")?;

    let key = load_signing_key(&auth.signing)?;
    let signer = Arc::new(JwtService::new(key, auth.issuer.clone(), access_lifetime));
    let codec = load_codec(auth)?;
    let hasher = SecretHasher::new(&auth.hashing).context("configuring auth.hashing")?;
    let store = build_store(cfg).await?;
    let notifier = notifier_from_config(&auth.anomaly).context("configuring auth.anomaly")?;
    if notifier.is_none() {
        tracing::info!("Origin anomaly notifications disabled");
    }

    Ok(RotationEngine::new(signer, codec, hasher, store)
        .with_notifier(notifier)
        .with_refresh_window(refresh_window))
}
