//! Token rotation engine.
//!
//! Each identity is either without a session or has exactly one active
//! generation, represented in storage by the hash of that generation's
//! refresh token. Every operation that changes the active generation
//! overwrites that hash, which is what invalidates older token pairs.
//!
//! # Operations
//!
//! - [`create`](RotationEngine::create) mints a generation and stores its hash unconditionally.
//! - [`refresh`](RotationEngine::refresh) redeems a pair once and swaps in the next generation.
//! - [`identify`](RotationEngine::identify) resolves an access token while its generation is live.
//! - [`revoke`](RotationEngine::revoke) rotates to a generation whose pair is discarded.
//!
//! Refresh and revoke write through [`SessionStore::compare_and_swap`] against
//! the hash they verified, so of two racing calls at most one commits. No lock
//! is held while hashing or while an anomaly notification is delivered.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tracing::{Span, debug, field, info, instrument, warn};

use crate::AuthResult;
use crate::anomaly::{AnomalyNotifier, OriginAnomaly};
use crate::error::AuthError;
use crate::secret::SecretHasher;
use crate::storage::SessionStore;
use crate::token::{AccessTokenClaims, JwtService, RefreshTokenCodec};
use crate::types::{Generation, Identity, RequestContext, SecretHash, TokenPair};

/// Default time after issuance during which a pair may be refreshed.
pub const DEFAULT_REFRESH_WINDOW: Duration = Duration::days(30);

/// A freshly minted generation, before it is committed to storage.
struct Issued {
    generation: Generation,
    pair: TokenPair,
    hash: SecretHash,
}

/// Issues, rotates, resolves and revokes token pairs.
pub struct RotationEngine {
    signer: Arc<JwtService>,
    codec: RefreshTokenCodec,
    hasher: SecretHasher,
    store: Arc<dyn SessionStore>,
    notifier: Option<Arc<dyn AnomalyNotifier>>,
    refresh_window: Duration,
}

impl RotationEngine {
    /// Creates an engine without anomaly notification and with the default
    /// refresh window.
    #[must_use]
    pub fn new(
        signer: Arc<JwtService>,
        codec: RefreshTokenCodec,
        hasher: SecretHasher,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            signer,
            codec,
            hasher,
            store,
            notifier: None,
            refresh_window: DEFAULT_REFRESH_WINDOW,
        }
    }

    /// Sets the receiver of origin anomaly events.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Option<Arc<dyn AnomalyNotifier>>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Sets how long after issuance a pair may still be refreshed.
    #[must_use]
    pub fn with_refresh_window(mut self, window: Duration) -> Self {
        self.refresh_window = window;
        self
    }

    /// Issues a new pair for `identity`, replacing any existing session.
    ///
    /// # Errors
    ///
    /// Returns infrastructure errors from the signer, hasher or store.
    #[instrument(name = "rotation.create", skip_all, fields(identity = %identity))]
    pub async fn create(
        &self,
        identity: Identity,
        context: &RequestContext,
    ) -> AuthResult<TokenPair> {
        let issued = self.issue(identity, context).await?;
        self.store.put(&identity, &issued.hash).await?;

        info!(generation = %issued.generation, "Issued token pair");
        Ok(issued.pair)
    }

    /// Redeems a token pair and issues the next one.
    ///
    /// The access token may be past its expiry, but must have been issued
    /// within the refresh window. The refresh token is single-use.
    ///
    /// # Errors
    ///
    /// - `InvalidToken` if the access token signature is bad or the refresh window elapsed
    /// - `DeviceMismatch` if the device differs; the session is revoked first
    ///   when the access token's generation is still live
    /// - `MalformedToken` if the refresh token cannot be decoded
    /// - `NoSession` if the identity has no session
    /// - `RefreshMismatch` if the refresh token is not the active one, or a
    ///   concurrent call rotated the session first
    /// - `GenerationMismatch` if the two tokens belong to different generations
    #[instrument(name = "rotation.refresh", skip_all, fields(identity = field::Empty))]
    pub async fn refresh(
        &self,
        access_token: &str,
        refresh_token: &str,
        context: &RequestContext,
    ) -> AuthResult<TokenPair> {
        let claims = self.signer.verify_signature_only(access_token)?;
        let identity = claims.sub;
        Span::current().record("identity", field::display(identity));

        let now = OffsetDateTime::now_utc();
        if now > claims.issued_at() + self.refresh_window {
            debug!("Refresh window elapsed");
            return Err(AuthError::invalid_token("refresh window elapsed"));
        }

        let issued_context = claims.context();
        if context.device != issued_context.device {
            warn!(
                generation = %claims.generation,
                "Device mismatch on refresh, revoking session"
            );
            self.force_revoke(&claims).await?;
            return Err(AuthError::DeviceMismatch);
        }

        if context.origin != issued_context.origin {
            self.report_origin_anomaly(&claims, context);
        }

        let token_generation = self.codec.decode(refresh_token)?;
        let stored = self
            .store
            .get(&identity)
            .await?
            .ok_or(AuthError::NoSession)?;

        if !self.verify_hash(&stored, refresh_token).await? {
            warn!(
                generation = %token_generation,
                "Refresh token does not match active session, possible replay"
            );
            return Err(AuthError::RefreshMismatch);
        }

        if token_generation != claims.generation {
            warn!(
                access_generation = %claims.generation,
                refresh_generation = %token_generation,
                "Token pair spans two generations"
            );
            return Err(AuthError::GenerationMismatch);
        }

        let issued = self.issue(identity, context).await?;
        if !self
            .store
            .compare_and_swap(&identity, &stored, &issued.hash)
            .await?
        {
            warn!("Lost refresh race for session");
            return Err(AuthError::RefreshMismatch);
        }

        info!(
            from = %claims.generation,
            to = %issued.generation,
            "Rotated token pair"
        );
        Ok(issued.pair)
    }

    /// Resolves an access token to its identity while its generation is live.
    ///
    /// # Errors
    ///
    /// - `InvalidToken` if the signature is bad or the token expired
    /// - `NoSession` if the identity has no session
    /// - `RevokedToken` if the token's generation was rotated away
    #[instrument(name = "rotation.identify", skip_all, fields(identity = field::Empty))]
    pub async fn identify(&self, access_token: &str) -> AuthResult<Identity> {
        let (claims, _) = self.resolve(access_token).await?;
        Ok(claims.sub)
    }

    /// Kills the session of the access token's identity.
    ///
    /// # Errors
    ///
    /// Same as [`identify`](Self::identify). A revoke racing a refresh that
    /// committed first fails `RevokedToken`.
    #[instrument(name = "rotation.revoke", skip_all, fields(identity = field::Empty))]
    pub async fn revoke(&self, access_token: &str) -> AuthResult<()> {
        let (claims, stored) = self.resolve(access_token).await?;
        let identity = claims.sub;

        let issued = self.issue(identity, &claims.context()).await?;
        if !self
            .store
            .compare_and_swap(&identity, &stored, &issued.hash)
            .await?
        {
            debug!("Session rotated before revoke committed");
            return Err(AuthError::RevokedToken);
        }

        info!(generation = %claims.generation, "Revoked session");
        Ok(())
    }

    /// Verifies an access token and checks that its generation is the live one.
    ///
    /// Returns the claims and the stored hash the check was made against.
    async fn resolve(&self, access_token: &str) -> AuthResult<(AccessTokenClaims, SecretHash)> {
        let claims = self.signer.verify(access_token)?;
        Span::current().record("identity", field::display(claims.sub));

        let stored = self
            .store
            .get(&claims.sub)
            .await?
            .ok_or(AuthError::NoSession)?;

        let expected = self.codec.encode(&claims.generation);
        if !self.verify_hash(&stored, &expected).await? {
            debug!(generation = %claims.generation, "Access token generation is no longer live");
            return Err(AuthError::RevokedToken);
        }

        Ok((claims, stored))
    }

    /// Rotates the session to a generation nobody holds, but only while the
    /// access token's generation is still the live one. Expiry is not checked.
    async fn force_revoke(&self, claims: &AccessTokenClaims) -> AuthResult<()> {
        let identity = claims.sub;
        let Some(stored) = self.store.get(&identity).await? else {
            return Ok(());
        };

        let expected = self.codec.encode(&claims.generation);
        if !self.verify_hash(&stored, &expected).await? {
            debug!(
                generation = %claims.generation,
                "Generation already superseded, nothing to revoke"
            );
            return Ok(());
        }

        let issued = self.issue(identity, &claims.context()).await?;
        if !self
            .store
            .compare_and_swap(&identity, &stored, &issued.hash)
            .await?
        {
            debug!("Session rotated before forced revoke committed");
        }
        Ok(())
    }

    fn report_origin_anomaly(&self, claims: &AccessTokenClaims, context: &RequestContext) {
        let Some(notifier) = &self.notifier else {
            debug!("Origin changed since issuance, notification disabled");
            return;
        };

        let anomaly = OriginAnomaly::new(
            claims.sub,
            claims.generation,
            claims.org.clone(),
            context.origin.clone(),
            context.device.clone(),
        );
        let notifier = Arc::clone(notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&anomaly).await {
                warn!(error = %e, "Failed to deliver origin anomaly notification");
            }
        });
    }

    async fn issue(&self, identity: Identity, context: &RequestContext) -> AuthResult<Issued> {
        let generation = Generation::mint();
        let access_token = self.signer.sign(identity, generation, context)?;
        let refresh_token = self.codec.encode(&generation);
        let hash = self.hash_token(refresh_token.clone()).await?;

        Ok(Issued {
            generation,
            pair: TokenPair {
                access_token,
                refresh_token,
            },
            hash,
        })
    }

    async fn hash_token(&self, token: String) -> AuthResult<SecretHash> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&token))
            .await
            .map_err(|e| AuthError::internal(format!("hashing task failed: {e}")))?
    }

    async fn verify_hash(&self, hash: &SecretHash, token: &str) -> AuthResult<bool> {
        let hasher = self.hasher.clone();
        let hash = hash.clone();
        let token = token.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&hash, &token))
            .await
            .map_err(|e| AuthError::internal(format!("hashing task failed: {e}")))?
    }
}

impl std::fmt::Debug for RotationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationEngine")
            .field("issuer", &self.signer.issuer())
            .field("refresh_window", &self.refresh_window)
            .field("notifier", &self.notifier.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::NotificationError;
    use crate::secret::test_hasher;
    use crate::storage::InMemorySessionStore;
    use crate::token::{SigningAlgorithm, SigningKeyPair};
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    const ISSUER: &str = "https://auth.test";

    struct ChannelNotifier(mpsc::UnboundedSender<OriginAnomaly>);

    #[async_trait]
    impl AnomalyNotifier for ChannelNotifier {
        async fn notify(&self, anomaly: &OriginAnomaly) -> Result<(), NotificationError> {
            self.0
                .send(anomaly.clone())
                .map_err(|e| NotificationError::SendFailed(e.to_string()))
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl AnomalyNotifier for FailingNotifier {
        async fn notify(&self, _anomaly: &OriginAnomaly) -> Result<(), NotificationError> {
            Err(NotificationError::SendFailed("unreachable".to_string()))
        }
    }

    struct Fixture {
        signer: Arc<JwtService>,
        codec: RefreshTokenCodec,
        store: Arc<InMemorySessionStore>,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_access_lifetime(Duration::minutes(15))
        }

        fn with_access_lifetime(lifetime: Duration) -> Self {
            let key = SigningKeyPair::generate(SigningAlgorithm::ES384).unwrap();
            Self {
                signer: Arc::new(JwtService::new(key, ISSUER, lifetime)),
                codec: RefreshTokenCodec::generate(),
                store: Arc::new(InMemorySessionStore::new()),
            }
        }

        fn engine(&self) -> RotationEngine {
            RotationEngine::new(
                self.signer.clone(),
                self.codec.clone(),
                test_hasher(),
                self.store.clone(),
            )
        }
    }

    fn identity() -> Identity {
        Identity::from_uuid(uuid::Uuid::new_v4())
    }

    fn browser() -> RequestContext {
        RequestContext::default()
            .with_device("Mozilla/5.0 (X11; Linux x86_64) Firefox/121.0")
            .with_origin("203.0.113.7")
    }

    #[tokio::test]
    async fn test_create_then_identify() {
        let fixture = Fixture::new();
        let engine = fixture.engine();
        let id = identity();

        let pair = engine.create(id, &browser()).await.unwrap();

        assert_eq!(engine.identify(&pair.access_token).await.unwrap(), id);
        assert_eq!(fixture.store.len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_succeeds_exactly_once() {
        let engine = Fixture::new().engine();
        let ctx = browser();
        let pair = engine.create(identity(), &ctx).await.unwrap();

        let next = engine
            .refresh(&pair.access_token, &pair.refresh_token, &ctx)
            .await
            .unwrap();
        assert_ne!(next.refresh_token, pair.refresh_token);

        let replay = engine
            .refresh(&pair.access_token, &pair.refresh_token, &ctx)
            .await;
        assert!(matches!(replay, Err(AuthError::RefreshMismatch)));
    }

    #[tokio::test]
    async fn test_rotation_scenario() {
        let engine = Fixture::new().engine();
        let ctx = browser();
        let a = identity();

        let first = engine.create(a, &ctx).await.unwrap();
        let second = engine
            .refresh(&first.access_token, &first.refresh_token, &ctx)
            .await
            .unwrap();

        assert!(matches!(
            engine
                .refresh(&first.access_token, &first.refresh_token, &ctx)
                .await,
            Err(AuthError::RefreshMismatch)
        ));
        assert_eq!(engine.identify(&second.access_token).await.unwrap(), a);
        assert!(matches!(
            engine.identify(&first.access_token).await,
            Err(AuthError::RevokedToken)
        ));
    }

    #[tokio::test]
    async fn test_superseded_by_create_is_revoked() {
        let engine = Fixture::new().engine();
        let id = identity();

        let old = engine.create(id, &browser()).await.unwrap();
        let new = engine.create(id, &browser()).await.unwrap();

        assert!(matches!(
            engine.identify(&old.access_token).await,
            Err(AuthError::RevokedToken)
        ));
        assert_eq!(engine.identify(&new.access_token).await.unwrap(), id);
    }

    #[tokio::test]
    async fn test_mixed_generations_rejected() {
        let engine = Fixture::new().engine();
        let ctx = browser();

        let first = engine.create(identity(), &ctx).await.unwrap();
        let second = engine
            .refresh(&first.access_token, &first.refresh_token, &ctx)
            .await
            .unwrap();

        let mixed = engine
            .refresh(&first.access_token, &second.refresh_token, &ctx)
            .await;
        assert!(matches!(mixed, Err(AuthError::GenerationMismatch)));

        // Nothing was committed; the live pair still works.
        assert!(
            engine
                .refresh(&second.access_token, &second.refresh_token, &ctx)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_new_access_with_old_refresh_rejected() {
        let engine = Fixture::new().engine();
        let ctx = browser();

        let first = engine.create(identity(), &ctx).await.unwrap();
        let second = engine
            .refresh(&first.access_token, &first.refresh_token, &ctx)
            .await
            .unwrap();

        let mixed = engine
            .refresh(&second.access_token, &first.refresh_token, &ctx)
            .await;
        assert!(matches!(mixed, Err(AuthError::RefreshMismatch)));
    }

    #[tokio::test]
    async fn test_revoke_then_identify() {
        let engine = Fixture::new().engine();
        let ctx = browser();
        let pair = engine.create(identity(), &ctx).await.unwrap();

        engine.revoke(&pair.access_token).await.unwrap();

        assert!(matches!(
            engine.identify(&pair.access_token).await,
            Err(AuthError::RevokedToken)
        ));
        assert!(matches!(
            engine
                .refresh(&pair.access_token, &pair.refresh_token, &ctx)
                .await,
            Err(AuthError::RefreshMismatch)
        ));
        assert!(matches!(
            engine.revoke(&pair.access_token).await,
            Err(AuthError::RevokedToken)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_refresh_single_winner() {
        let fixture = Fixture::new();
        let engine = Arc::new(fixture.engine());
        let ctx = browser();
        let id = identity();
        let pair = engine.create(id, &ctx).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..2 {
            let engine = engine.clone();
            let pair = pair.clone();
            let ctx = ctx.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .refresh(&pair.access_token, &pair.refresh_token, &ctx)
                    .await
            }));
        }

        let mut winners = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(next) => winners.push(next),
                Err(e) => assert!(matches!(e, AuthError::RefreshMismatch), "got {e:?}"),
            }
        }

        assert_eq!(winners.len(), 1);
        // The winner's pair is the live one.
        assert_eq!(engine.identify(&winners[0].access_token).await.unwrap(), id);
        assert!(
            engine
                .refresh(&winners[0].access_token, &winners[0].refresh_token, &ctx)
                .await
                .is_ok()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_revoke_racing_refresh_single_commit() {
        for _ in 0..8 {
            let fixture = Fixture::new();
            let engine = Arc::new(fixture.engine());
            let ctx = browser();
            let id = identity();
            let pair = engine.create(id, &ctx).await.unwrap();

            let revoking = {
                let engine = engine.clone();
                let access = pair.access_token.clone();
                tokio::spawn(async move { engine.revoke(&access).await })
            };
            let refreshing = {
                let engine = engine.clone();
                let pair = pair.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    engine
                        .refresh(&pair.access_token, &pair.refresh_token, &ctx)
                        .await
                })
            };
            let revoked = revoking.await.unwrap();
            let refreshed = refreshing.await.unwrap();

            let hasher = test_hasher();
            let stored = fixture.store.get(&id).await.unwrap().unwrap();
            assert_eq!(fixture.store.len(), 1);
            assert!(!hasher.verify(&stored, &pair.refresh_token).unwrap());

            match (revoked, refreshed) {
                (Ok(()), Err(e)) => {
                    assert!(matches!(e, AuthError::RefreshMismatch), "got {e:?}");
                }
                (Err(e), Ok(next)) => {
                    assert!(matches!(e, AuthError::RevokedToken), "got {e:?}");
                    // The stored hash is the refreshed generation's.
                    assert!(hasher.verify(&stored, &next.refresh_token).unwrap());
                    assert_eq!(engine.identify(&next.access_token).await.unwrap(), id);
                }
                (revoked, refreshed) => {
                    panic!("expected exactly one commit, got {revoked:?} and {refreshed:?}")
                }
            }
            assert!(matches!(
                engine.identify(&pair.access_token).await,
                Err(AuthError::RevokedToken)
            ));
        }
    }

    #[tokio::test]
    async fn test_device_mismatch_revokes_session() {
        let engine = Fixture::new().engine();
        let ctx = browser();
        let pair = engine.create(identity(), &ctx).await.unwrap();

        let thief = RequestContext::default()
            .with_device("python-requests/2.31")
            .with_origin("203.0.113.7");
        let result = engine
            .refresh(&pair.access_token, &pair.refresh_token, &thief)
            .await;
        assert!(matches!(result, Err(AuthError::DeviceMismatch)));

        // The legitimate holder is locked out too.
        assert!(matches!(
            engine.identify(&pair.access_token).await,
            Err(AuthError::RevokedToken)
        ));
        assert!(matches!(
            engine
                .refresh(&pair.access_token, &pair.refresh_token, &ctx)
                .await,
            Err(AuthError::RefreshMismatch)
        ));
    }

    #[tokio::test]
    async fn test_stale_access_on_new_device_keeps_live_session() {
        let engine = Fixture::new().engine();
        let ctx = browser();
        let id = identity();
        let first = engine.create(id, &ctx).await.unwrap();
        let second = engine
            .refresh(&first.access_token, &first.refresh_token, &ctx)
            .await
            .unwrap();

        let thief = RequestContext::default().with_device("python-requests/2.31");
        let result = engine.refresh(&first.access_token, "junk", &thief).await;
        assert!(matches!(result, Err(AuthError::DeviceMismatch)));

        // A superseded token cannot kill the session that replaced it.
        assert_eq!(engine.identify(&second.access_token).await.unwrap(), id);
        assert!(
            engine
                .refresh(&second.access_token, &second.refresh_token, &ctx)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_device_mismatch_with_expired_access_still_revokes() {
        let engine = Fixture::with_access_lifetime(Duration::minutes(-5)).engine();
        let ctx = browser();
        let pair = engine.create(identity(), &ctx).await.unwrap();

        let thief = RequestContext::default().with_device("curl/8.5.0");
        let result = engine
            .refresh(&pair.access_token, &pair.refresh_token, &thief)
            .await;
        assert!(matches!(result, Err(AuthError::DeviceMismatch)));
        assert!(matches!(
            engine
                .refresh(&pair.access_token, &pair.refresh_token, &ctx)
                .await,
            Err(AuthError::RefreshMismatch)
        ));
    }

    #[tokio::test]
    async fn test_device_mismatch_precedes_malformed_refresh() {
        let engine = Fixture::new().engine();
        let pair = engine.create(identity(), &browser()).await.unwrap();

        let result = engine
            .refresh(&pair.access_token, "garbage", &RequestContext::default())
            .await;
        assert!(matches!(result, Err(AuthError::DeviceMismatch)));
        assert!(matches!(
            engine.identify(&pair.access_token).await,
            Err(AuthError::RevokedToken)
        ));
    }

    #[tokio::test]
    async fn test_origin_change_notifies_and_continues() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let engine = Fixture::new()
            .engine()
            .with_notifier(Some(Arc::new(ChannelNotifier(tx))));
        let id = identity();
        let ctx = browser();
        let pair = engine.create(id, &ctx).await.unwrap();

        let moved = ctx.clone().with_origin("198.51.100.4");
        let next = engine
            .refresh(&pair.access_token, &pair.refresh_token, &moved)
            .await;
        assert!(next.is_ok());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.identity, id);
        assert_eq!(event.expected_origin.as_deref(), Some("203.0.113.7"));
        assert_eq!(event.observed_origin.as_deref(), Some("198.51.100.4"));
    }

    #[tokio::test]
    async fn test_notifier_failure_does_not_fail_refresh() {
        let engine = Fixture::new()
            .engine()
            .with_notifier(Some(Arc::new(FailingNotifier)));
        let ctx = browser();
        let pair = engine.create(identity(), &ctx).await.unwrap();

        let moved = ctx.clone().with_origin("198.51.100.4");
        assert!(
            engine
                .refresh(&pair.access_token, &pair.refresh_token, &moved)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_same_origin_does_not_notify() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let engine = Fixture::new()
            .engine()
            .with_notifier(Some(Arc::new(ChannelNotifier(tx))));
        let ctx = browser();
        let pair = engine.create(identity(), &ctx).await.unwrap();

        engine
            .refresh(&pair.access_token, &pair.refresh_token, &ctx)
            .await
            .unwrap();
        drop(engine);

        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_refresh_token() {
        let engine = Fixture::new().engine();
        let ctx = browser();
        let pair = engine.create(identity(), &ctx).await.unwrap();

        let result = engine.refresh(&pair.access_token, "not-a-token", &ctx).await;
        assert!(matches!(result, Err(AuthError::MalformedToken { .. })));

        // No state change.
        assert!(
            engine
                .refresh(&pair.access_token, &pair.refresh_token, &ctx)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_forged_access_token() {
        let engine = Fixture::new().engine();
        let other = Fixture::new().engine();
        let ctx = browser();
        let pair = other.create(identity(), &ctx).await.unwrap();

        assert!(matches!(
            engine
                .refresh(&pair.access_token, &pair.refresh_token, &ctx)
                .await,
            Err(AuthError::InvalidToken { .. })
        ));
        assert!(matches!(
            engine.identify(&pair.access_token).await,
            Err(AuthError::InvalidToken { .. })
        ));
    }

    #[tokio::test]
    async fn test_no_session() {
        let fixture = Fixture::new();
        let issuing = fixture.engine();
        let ctx = browser();
        let pair = issuing.create(identity(), &ctx).await.unwrap();

        // Same keys, empty store.
        let empty = RotationEngine::new(
            fixture.signer.clone(),
            fixture.codec.clone(),
            test_hasher(),
            Arc::new(InMemorySessionStore::new()),
        );

        assert!(matches!(
            empty.identify(&pair.access_token).await,
            Err(AuthError::NoSession)
        ));
        assert!(matches!(
            empty
                .refresh(&pair.access_token, &pair.refresh_token, &ctx)
                .await,
            Err(AuthError::NoSession)
        ));
    }

    #[tokio::test]
    async fn test_expired_access_token_still_refreshes() {
        let engine = Fixture::with_access_lifetime(Duration::minutes(-5)).engine();
        let ctx = browser();
        let pair = engine.create(identity(), &ctx).await.unwrap();

        assert!(matches!(
            engine.identify(&pair.access_token).await,
            Err(AuthError::InvalidToken { .. })
        ));
        assert!(matches!(
            engine.revoke(&pair.access_token).await,
            Err(AuthError::InvalidToken { .. })
        ));
        assert!(
            engine
                .refresh(&pair.access_token, &pair.refresh_token, &ctx)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_refresh_window_elapsed() {
        let engine = Fixture::new()
            .engine()
            .with_refresh_window(Duration::seconds(-1));
        let ctx = browser();
        let pair = engine.create(identity(), &ctx).await.unwrap();

        let result = engine
            .refresh(&pair.access_token, &pair.refresh_token, &ctx)
            .await;
        assert!(matches!(result, Err(AuthError::InvalidToken { .. })));
    }
}
