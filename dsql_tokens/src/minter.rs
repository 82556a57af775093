//! The capability that signs new tokens

use std::{error, fmt};

use async_trait::async_trait;
use dsql_clock::DurationSecs;

use crate::{AuthToken, CacheKey, CredentialSource, DbUserRef, HostnameRef, RegionNameRef};

#[cfg(feature = "aws")]
#[cfg_attr(docsrs, doc(cfg(feature = "aws")))]
pub mod aws;

/// The database user whose tokens are minted with the elevated operation
pub const ELEVATED_USER: &str = "admin";

/// Which of the service's two minting operations a token needs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MintKind {
    /// A token for an ordinary database role
    Standard,
    /// A token for the cluster's administrative role
    Elevated,
}

impl MintKind {
    /// Selects the operation for a database user
    ///
    /// Only the exact, case-sensitive user name `admin` is elevated.
    #[inline]
    pub fn for_user(user: &DbUserRef) -> Self {
        if user.as_str() == ELEVATED_USER {
            Self::Elevated
        } else {
            Self::Standard
        }
    }
}

impl fmt::Display for MintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Standard => "standard",
            Self::Elevated => "elevated",
        })
    }
}

/// The parameters of a single minting call
#[derive(Clone, Copy, Debug)]
pub struct MintRequest<'a> {
    /// The cluster endpoint the token grants access to
    pub hostname: &'a HostnameRef,
    /// The region to sign for
    pub region: &'a RegionNameRef,
    /// The lifetime to ask the service for; `None` leaves it to the service
    pub lifetime: Option<DurationSecs>,
    /// The credentials to sign with
    pub credentials: &'a CredentialSource,
}

impl<'a> From<&'a CacheKey> for MintRequest<'a> {
    fn from(key: &'a CacheKey) -> Self {
        Self {
            hostname: key.hostname(),
            region: key.region(),
            lifetime: key.lifetime(),
            credentials: key.credentials(),
        }
    }
}

/// A remote authority able to mint connection tokens
///
/// Implementations should not retry internally on behalf of the cache;
/// every failure is surfaced to the caller that triggered the mint.
#[async_trait]
pub trait TokenMinter: Send + Sync {
    /// The error type returned in the event that minting fails
    type Error: error::Error + Send + Sync + 'static;

    /// Mints a token for an ordinary database role
    async fn mint_standard_token(&self, request: MintRequest<'_>) -> Result<AuthToken, Self::Error>;

    /// Mints a token for the administrative role
    async fn mint_elevated_token(&self, request: MintRequest<'_>) -> Result<AuthToken, Self::Error>;

    /// Mints a token using the operation selected by `kind`
    async fn mint_token(
        &self,
        kind: MintKind,
        request: MintRequest<'_>,
    ) -> Result<AuthToken, Self::Error> {
        match kind {
            MintKind::Standard => self.mint_standard_token(request).await,
            MintKind::Elevated => self.mint_elevated_token(request).await,
        }
    }
}

#[async_trait]
impl<M: TokenMinter + ?Sized> TokenMinter for std::sync::Arc<M> {
    type Error = M::Error;

    async fn mint_standard_token(&self, request: MintRequest<'_>) -> Result<AuthToken, Self::Error> {
        (**self).mint_standard_token(request).await
    }

    async fn mint_elevated_token(&self, request: MintRequest<'_>) -> Result<AuthToken, Self::Error> {
        (**self).mint_elevated_token(request).await
    }
}
