use dsql_clock::{Clock, DurationSecs, UnixTime};

use crate::{AuthToken, AuthTokenRef};

/// A minted token along with the times that govern its reuse
///
/// Values are never mutated once created. A refresh produces a new
/// `CachedToken` which replaces the old one wholesale.
#[derive(Clone, Debug)]
pub struct CachedToken {
    token: AuthToken,
    lifetime: DurationSecs,
    issued: UnixTime,
    stale: UnixTime,
    expiry: UnixTime,
}

/// A token's lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenStatus {
    /// The token may be handed out
    Fresh,
    /// The token is still valid, but too close to expiry to hand out
    Stale,
    /// The token is no longer valid
    Expired,
}

impl CachedToken {
    /// Gets the token value
    #[inline]
    pub fn token(&self) -> &AuthTokenRef {
        &self.token
    }

    /// Gets the token's total lifetime
    #[inline]
    pub fn lifetime(&self) -> DurationSecs {
        self.lifetime
    }

    /// Gets the time that the token was issued
    #[inline]
    pub fn issued(&self) -> UnixTime {
        self.issued
    }

    /// Gets the time from which the token must be refreshed before reuse
    #[inline]
    pub fn stale(&self) -> UnixTime {
        self.stale
    }

    /// Gets the time that the token will expire
    #[inline]
    pub fn expiry(&self) -> UnixTime {
        self.expiry
    }

    /// Gets the token's lifetime status as of the provided time
    ///
    /// Reaching the stale time exactly already counts as stale.
    #[inline]
    pub fn status_at(&self, time: UnixTime) -> TokenStatus {
        if time < self.stale {
            TokenStatus::Fresh
        } else if time < self.expiry {
            TokenStatus::Stale
        } else {
            TokenStatus::Expired
        }
    }

    /// Whether the token may still be handed out at `time`
    #[inline]
    pub fn is_fresh_at(&self, time: UnixTime) -> bool {
        self.status_at(time) == TokenStatus::Fresh
    }

    /// Gets how much longer the token will remain fresh as of `time`
    #[inline]
    pub fn until_stale_at(&self, time: UnixTime) -> DurationSecs {
        self.stale - time
    }
}

/// Governs how long minted tokens are considered reusable
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshPolicy {
    refresh_buffer_percent: u32,
    fallback_lifetime: DurationSecs,
}

impl RefreshPolicy {
    /// Share of a token's lifetime, in percent, held back before expiry
    pub const DEFAULT_REFRESH_BUFFER_PERCENT: u32 = 20;

    /// Lifetime assumed when none is requested
    ///
    /// Matches the lifetime the token service applies by default.
    pub const DEFAULT_FALLBACK_LIFETIME: DurationSecs = DurationSecs::from_mins(15);

    /// Sets the trailing share of a token's lifetime, in percent, during which
    /// it is treated as stale
    ///
    /// Values above 100 are clamped to 100.
    pub fn with_refresh_buffer_percent(mut self, percent: u32) -> Self {
        self.refresh_buffer_percent = percent.min(100);
        self
    }

    /// Sets the lifetime recorded for tokens minted without a requested lifetime
    pub fn with_fallback_lifetime(mut self, lifetime: DurationSecs) -> Self {
        self.fallback_lifetime = lifetime;
        self
    }

    /// Gets the refresh buffer, in percent of a token's lifetime
    #[inline]
    pub fn refresh_buffer_percent(&self) -> u32 {
        self.refresh_buffer_percent
    }

    /// Gets the fallback lifetime
    #[inline]
    pub fn fallback_lifetime(&self) -> DurationSecs {
        self.fallback_lifetime
    }

    /// Resolves the lifetime a token will be recorded with
    ///
    /// A missing or zero requested lifetime yields the fallback lifetime.
    #[inline]
    pub fn effective_lifetime(&self, requested: Option<DurationSecs>) -> DurationSecs {
        requested
            .filter(|l| !l.is_zero())
            .unwrap_or(self.fallback_lifetime)
    }

    /// Wraps a freshly minted token, issued now according to `clock`
    pub fn create_token<C: Clock>(
        &self,
        token: AuthToken,
        requested: Option<DurationSecs>,
        clock: &C,
    ) -> CachedToken {
        self.create_token_at(token, requested, clock.now())
    }

    /// Wraps a token issued at `issued`
    pub fn create_token_at(
        &self,
        token: AuthToken,
        requested: Option<DurationSecs>,
        issued: UnixTime,
    ) -> CachedToken {
        let lifetime = self.effective_lifetime(requested);
        let expiry = issued + lifetime;
        CachedToken {
            token,
            lifetime,
            issued,
            stale: expiry - lifetime.percent(self.refresh_buffer_percent),
            expiry,
        }
    }
}

impl Default for RefreshPolicy {
    /// Holds back the final 20% of a token's lifetime, assuming 15 minutes
    /// when no lifetime is requested
    fn default() -> Self {
        Self {
            refresh_buffer_percent: Self::DEFAULT_REFRESH_BUFFER_PERCENT,
            fallback_lifetime: Self::DEFAULT_FALLBACK_LIFETIME,
        }
    }
}
