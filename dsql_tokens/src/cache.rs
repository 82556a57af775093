//! A shared, in-memory cache of minted tokens

use std::{collections::HashMap, error, fmt, sync::Arc};

use arc_swap::ArcSwap;
use dsql_clock::{Clock, System};
use thiserror::Error;

use crate::{
    minter::{MintKind, MintRequest, TokenMinter},
    AuthToken, CacheKey, CachedToken, DbUser, Hostname, RefreshPolicy, TokenStatus,
};

type Entries = HashMap<CacheKey, Arc<CachedToken>>;

/// Minting a token failed
///
/// The cache is left untouched when this is returned.
#[derive(Debug, Error)]
#[error("unable to generate {kind} token for {user} at {hostname}")]
pub struct AcquisitionError {
    kind: MintKind,
    hostname: Hostname,
    user: DbUser,
    #[source]
    source: Box<dyn error::Error + Send + Sync + 'static>,
}

impl AcquisitionError {
    /// Gets the minting operation that failed
    pub fn kind(&self) -> MintKind {
        self.kind
    }

    /// Gets the cluster endpoint the token was for
    pub fn hostname(&self) -> &Hostname {
        &self.hostname
    }

    /// Gets the database user the token was for
    pub fn user(&self) -> &DbUser {
        &self.user
    }

    /// Consumes the error, returning the error reported by the minter
    pub fn into_source(self) -> Box<dyn error::Error + Send + Sync + 'static> {
        self.source
    }
}

/// A cache of tokens keyed by their full scope
///
/// Lookups read an immutable snapshot of the map and never block. Writes
/// install a new snapshot. Minting happens outside of any critical section,
/// so concurrent misses on the same key may each mint, with the last one to
/// finish winning the entry.
///
/// Entries are only replaced lazily, when a lookup finds them stale, or all
/// at once by [`clear()`][Self::clear].
pub struct TokenCache<M, C = System> {
    minter: M,
    policy: RefreshPolicy,
    clock: C,
    entries: ArcSwap<Entries>,
}

impl<M> TokenCache<M, System> {
    /// Constructs an empty cache backed by `minter`, using the default refresh
    /// policy and the system clock
    pub fn new(minter: M) -> Self {
        Self {
            minter,
            policy: RefreshPolicy::default(),
            clock: System,
            entries: ArcSwap::default(),
        }
    }
}

impl<M, C> TokenCache<M, C> {
    /// Replaces the refresh policy
    pub fn with_policy(mut self, policy: RefreshPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets a custom clock to be used
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> TokenCache<M, D> {
        TokenCache {
            minter: self.minter,
            policy: self.policy,
            clock,
            entries: self.entries,
        }
    }

    /// Gets the refresh policy
    pub fn policy(&self) -> &RefreshPolicy {
        &self.policy
    }

    /// Gets the underlying minter
    pub fn minter(&self) -> &M {
        &self.minter
    }

    /// Gets the entry currently held for `key`, fresh or not
    pub fn cached(&self, key: &CacheKey) -> Option<Arc<CachedToken>> {
        self.entries.load().get(key).cloned()
    }

    /// Number of entries held, fresh or not
    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    /// Drops every cached token
    ///
    /// A mint already in flight may still insert its token afterwards.
    pub fn clear(&self) {
        tracing::debug!("clearing all cached tokens");
        self.entries.store(Arc::default());
    }

    fn store(&self, key: &CacheKey, token: Arc<CachedToken>) {
        self.entries.rcu(|current| {
            let mut next = Entries::clone(current);
            next.insert(key.clone(), Arc::clone(&token));
            next
        });
    }
}

impl<M: TokenMinter, C: Clock> TokenCache<M, C> {
    /// Gets a token for `key`, minting one if none is cached or the cached one
    /// is stale
    pub async fn get_token(&self, key: &CacheKey) -> Result<AuthToken, AcquisitionError> {
        if let Some(cached) = self.cached(key) {
            let now = self.clock.now();
            match cached.status_at(now) {
                TokenStatus::Fresh => {
                    tracing::debug!(
                        user = %key.user(),
                        hostname = %key.hostname(),
                        token.until_stale = cached.until_stale_at(now).0,
                        "returning cached token"
                    );
                    return Ok(cached.token().to_owned());
                }
                status => {
                    tracing::debug!(
                        user = %key.user(),
                        hostname = %key.hostname(),
                        ?status,
                        token.stale = cached.stale().0,
                        token.expiry = cached.expiry().0,
                        "cached token needs refresh"
                    );
                }
            }
        }

        self.acquire(key).await
    }

    /// Mints a new token for `key` regardless of what is cached, replacing any
    /// existing entry
    ///
    /// If minting fails, the previous entry is kept.
    pub async fn force_refresh(&self, key: &CacheKey) -> Result<AuthToken, AcquisitionError> {
        tracing::debug!(user = %key.user(), hostname = %key.hostname(), "forcing token refresh");
        self.acquire(key).await
    }

    #[tracing::instrument(
        level = "debug",
        skip(self, key),
        fields(
            user = %key.user(),
            hostname = %key.hostname(),
            region = %key.region(),
            kind = %MintKind::for_user(key.user()),
        ),
    )]
    async fn acquire(&self, key: &CacheKey) -> Result<AuthToken, AcquisitionError> {
        let kind = MintKind::for_user(key.user());

        tracing::trace!("requesting token from minter");

        let token = match self.minter.mint_token(kind, MintRequest::from(key)).await {
            Ok(token) => token,
            Err(error) => {
                tracing::error!(
                    error = (&error as &dyn error::Error),
                    "unable to generate token"
                );
                return Err(AcquisitionError {
                    kind,
                    hostname: key.hostname().to_owned(),
                    user: key.user().to_owned(),
                    source: Box::new(error),
                });
            }
        };

        let cached = Arc::new(self.policy.create_token(token, key.lifetime(), &self.clock));

        tracing::info!(
            token.lifetime = cached.lifetime().0,
            token.stale = cached.stale().0,
            token.expiry = cached.expiry().0,
            "generated new token"
        );

        let token = cached.token().to_owned();
        self.store(key, cached);
        Ok(token)
    }
}

impl<M, C> fmt::Debug for TokenCache<M, C>
where
    M: fmt::Debug,
    C: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TokenCache")
            .field("minter", &self.minter)
            .field("policy", &self.policy)
            .field("clock", &self.clock)
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use color_eyre::Result;
    use dsql_clock::{DurationSecs, TestClock, UnixTime};

    use super::*;
    use crate::CredentialSource;

    const START: UnixTime = UnixTime(1_700_000_000);

    #[derive(Debug, Default)]
    struct CountingMinter {
        standard: AtomicUsize,
        elevated: AtomicUsize,
        failing: AtomicBool,
    }

    impl CountingMinter {
        fn calls(&self) -> usize {
            self.standard.load(Ordering::SeqCst) + self.elevated.load(Ordering::SeqCst)
        }

        fn fail(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        fn mint(&self, counter: &AtomicUsize, prefix: &str) -> Result<AuthToken, io::Error> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "access denied"));
            }
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(AuthToken::new(format!("{}{}", prefix, n)))
        }
    }

    #[async_trait]
    impl TokenMinter for CountingMinter {
        type Error = io::Error;

        async fn mint_standard_token(&self, _: MintRequest<'_>) -> Result<AuthToken, io::Error> {
            self.mint(&self.standard, "T")
        }

        async fn mint_elevated_token(&self, _: MintRequest<'_>) -> Result<AuthToken, io::Error> {
            self.mint(&self.elevated, "A")
        }
    }

    fn cache() -> (TokenCache<Arc<CountingMinter>, TestClock>, Arc<CountingMinter>, TestClock) {
        let minter = Arc::new(CountingMinter::default());
        let clock = TestClock::new(START);
        let cache = TokenCache::new(Arc::clone(&minter)).with_clock(clock.clone());
        (cache, minter, clock)
    }

    fn key_for(user: &'static str, lifetime: Option<u64>) -> CacheKey {
        CacheKey::new(
            "cluster1.example",
            "us-east-1",
            user,
            CredentialSource::DefaultChain,
            lifetime.map(DurationSecs),
        )
    }

    fn app_key() -> CacheKey {
        key_for("app_user", Some(1800))
    }

    #[tokio::test]
    async fn second_call_is_a_cache_hit() -> Result<()> {
        let (cache, minter, _) = cache();

        assert_eq!(cache.get_token(&app_key()).await?.as_str(), "T1");
        assert_eq!(cache.get_token(&app_key()).await?.as_str(), "T1");
        assert_eq!(minter.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn stale_token_is_replaced() -> Result<()> {
        let (cache, minter, clock) = cache();

        assert_eq!(cache.get_token(&app_key()).await?.as_str(), "T1");
        let cached = cache.cached(&app_key()).expect("entry cached");
        assert_eq!(cached.expiry(), START + DurationSecs(1800));

        clock.advance(DurationSecs(1439));
        assert_eq!(cache.get_token(&app_key()).await?.as_str(), "T1");
        assert_eq!(minter.calls(), 1);

        clock.advance(DurationSecs(1));
        assert_eq!(cache.get_token(&app_key()).await?.as_str(), "T2");
        assert_eq!(minter.calls(), 2);

        let cached = cache.cached(&app_key()).expect("entry cached");
        assert_eq!(cached.issued(), START + DurationSecs(1440));
        Ok(())
    }

    #[tokio::test]
    async fn expired_token_is_replaced() -> Result<()> {
        let (cache, minter, clock) = cache();

        cache.get_token(&app_key()).await?;
        clock.advance(DurationSecs(10_000));

        assert_eq!(cache.get_token(&app_key()).await?.as_str(), "T2");
        assert_eq!(minter.calls(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn distinct_scopes_mint_separately() -> Result<()> {
        let (cache, minter, _) = cache();

        let keys = [
            app_key(),
            key_for("other_user", Some(1800)),
            key_for("app_user", Some(3600)),
            key_for("app_user", None),
            CacheKey::new(
                "cluster2.example",
                "us-east-1",
                "app_user",
                CredentialSource::DefaultChain,
                Some(DurationSecs(1800)),
            ),
            CacheKey::new(
                "cluster1.example",
                "us-west-2",
                "app_user",
                CredentialSource::DefaultChain,
                Some(DurationSecs(1800)),
            ),
            CacheKey::new(
                "cluster1.example",
                "us-east-1",
                "app_user",
                CredentialSource::profile("prod"),
                Some(DurationSecs(1800)),
            ),
        ];

        for key in &keys {
            cache.get_token(key).await?;
        }

        assert_eq!(minter.calls(), keys.len());
        assert_eq!(cache.len(), keys.len());
        Ok(())
    }

    #[tokio::test]
    async fn missing_lifetime_caches_for_fallback() -> Result<()> {
        let (cache, minter, clock) = cache();
        let key = key_for("app_user", None);

        cache.get_token(&key).await?;
        let cached = cache.cached(&key).expect("entry cached");
        assert_eq!(cached.lifetime(), DurationSecs(900));
        assert_eq!(cached.expiry(), START + DurationSecs(900));

        clock.advance(DurationSecs(719));
        cache.get_token(&key).await?;
        assert_eq!(minter.calls(), 1);

        clock.advance(DurationSecs(1));
        cache.get_token(&key).await?;
        assert_eq!(minter.calls(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn custom_policy_moves_stale_point() -> Result<()> {
        let (cache, minter, clock) = cache();
        let cache = cache.with_policy(
            RefreshPolicy::default()
                .with_refresh_buffer_percent(50)
                .with_fallback_lifetime(DurationSecs(600)),
        );
        assert_eq!(cache.policy().refresh_buffer_percent(), 50);

        let key = key_for("app_user", None);
        cache.get_token(&key).await?;
        let cached = cache.cached(&key).expect("entry cached");
        assert_eq!(cached.expiry(), START + DurationSecs(600));
        assert_eq!(cached.stale(), START + DurationSecs(300));

        clock.advance(DurationSecs(299));
        cache.get_token(&key).await?;
        assert_eq!(minter.calls(), 1);

        clock.advance(DurationSecs(1));
        cache.get_token(&key).await?;
        assert_eq!(minter.calls(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn force_refresh_always_mints() -> Result<()> {
        let (cache, minter, _) = cache();

        assert_eq!(cache.force_refresh(&app_key()).await?.as_str(), "T1");
        assert_eq!(cache.force_refresh(&app_key()).await?.as_str(), "T2");
        assert_eq!(minter.calls(), 2);

        assert_eq!(cache.get_token(&app_key()).await?.as_str(), "T2");
        assert_eq!(minter.calls(), 2);
        assert_eq!(cache.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn clear_forces_new_acquisition() -> Result<()> {
        let (cache, minter, _) = cache();

        cache.get_token(&app_key()).await?;
        cache.get_token(&key_for("other_user", None)).await?;
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());

        assert_eq!(cache.get_token(&app_key()).await?.as_str(), "T3");
        assert_eq!(minter.calls(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn admin_uses_elevated_mint() -> Result<()> {
        let (cache, minter, _) = cache();

        assert_eq!(cache.get_token(&key_for("admin", None)).await?.as_str(), "A1");
        assert_eq!(cache.get_token(&key_for("Admin", None)).await?.as_str(), "T1");
        assert_eq!(cache.get_token(&key_for("administrator", None)).await?.as_str(), "T2");

        assert_eq!(minter.elevated.load(Ordering::SeqCst), 1);
        assert_eq!(minter.standard.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn failure_is_surfaced_with_cause() {
        let (cache, minter, _) = cache();
        minter.fail(true);

        let err = cache
            .get_token(&key_for("admin", None))
            .await
            .expect_err("mint should fail");

        assert_eq!(err.kind(), MintKind::Elevated);
        assert_eq!(err.user().as_str(), "admin");
        assert_eq!(err.hostname().as_str(), "cluster1.example");
        let source = error::Error::source(&err).expect("cause preserved");
        assert_eq!(source.to_string(), "access denied");
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_entry() -> Result<()> {
        let (cache, minter, clock) = cache();

        cache.get_token(&app_key()).await?;
        minter.fail(true);

        assert!(cache.force_refresh(&app_key()).await.is_err());
        let cached = cache.cached(&app_key()).expect("entry kept");
        assert_eq!(cached.token().as_str(), "T1");
        assert_eq!(cache.get_token(&app_key()).await?.as_str(), "T1");

        clock.advance(DurationSecs(1440));
        assert!(cache.get_token(&app_key()).await.is_err());
        assert_eq!(
            cache.cached(&app_key()).expect("entry kept").token().as_str(),
            "T1"
        );
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_entries() -> Result<()> {
        let (cache, minter, _) = cache();
        let cache = Arc::new(cache);

        let users = ["u0", "u1", "u2", "u3", "u4", "u5", "u6", "u7"];
        let mut tasks = Vec::new();
        for _ in 0..8 {
            for user in users {
                let cache = Arc::clone(&cache);
                tasks.push(tokio::spawn(async move {
                    cache.get_token(&key_for(user, Some(1800))).await
                }));
            }
        }
        for task in tasks {
            task.await??;
        }

        assert_eq!(cache.len(), users.len());
        assert!(minter.calls() >= users.len());
        assert!(minter.calls() <= users.len() * 8);

        let before = minter.calls();
        for user in users {
            cache.get_token(&key_for(user, Some(1800))).await?;
        }
        assert_eq!(minter.calls(), before);
        Ok(())
    }
}
