//! Cached IAM authentication tokens for Aurora DSQL
//!
//! Connecting to a DSQL cluster uses a short-lived signed token in place of
//! a password. Signing one means resolving AWS credentials, which is slow
//! enough that doing it for every new connection is wasteful. This crate
//! keeps the most recently minted token for every distinct scope and reuses
//! it until it gets too close to expiring.
//!
//! # Scope
//!
//! A token is cached under a [`CacheKey`] made of the cluster hostname, the
//! region, the database user, the [`CredentialSource`] and the requested
//! lifetime. A lookup only hits when all five match.
//!
//! # Staleness
//!
//! A cached token is reused while more than 20% of its lifetime remains.
//! Once that point is reached, the next lookup mints a replacement. Tokens
//! minted without a requested lifetime are assumed to live 15 minutes, which
//! is what the service grants by default. Both values are carried by the
//! [`RefreshPolicy`].
//!
//! # Concurrency
//!
//! The cache is meant to be shared (typically in an `Arc`) by every
//! connection attempt in a process. Lookups never block one another.
//! Misses for the same key racing each other are not coalesced: each may
//! mint, and the last token minted is the one that stays cached. There are
//! no background tasks.
//!
//! ```no_run
//! # #[cfg(feature = "aws")]
//! # async fn run() -> Result<(), dsql_tokens::AcquisitionError> {
//! use dsql_clock::DurationSecs;
//! use dsql_tokens::{minter::aws::AwsTokenMinter, CacheKey, CredentialSource, TokenCache};
//!
//! let cache = TokenCache::new(AwsTokenMinter::new());
//!
//! let key = CacheKey::new(
//!     "abcdefghijklmnopqrstuvwxyz.dsql.us-east-1.on.aws",
//!     "us-east-1",
//!     "app_user",
//!     CredentialSource::DefaultChain,
//!     Some(DurationSecs(1800)),
//! );
//!
//! let password = cache.get_token(&key).await?;
//! # let _ = password;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! * `aws` (default): provides [`AwsTokenMinter`][minter::aws::AwsTokenMinter], which
//!   signs tokens with `aws-sdk-dsql`.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod braids;
mod cache;
pub mod credentials;
mod key;
pub mod minter;
mod tokens;

pub use braids::*;
pub use cache::{AcquisitionError, TokenCache};
pub use credentials::{CredentialSource, CustomCredentials};
pub use key::CacheKey;
pub use tokens::{CachedToken, RefreshPolicy, TokenStatus};
