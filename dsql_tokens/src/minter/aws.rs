//! A minter that signs tokens locally with the AWS SDK
//!
//! Connect tokens are SigV4-presigned requests. Producing one needs
//! credentials but no round trip to the cluster, so the cost of a mint is
//! dominated by resolving credentials for the source.

use std::error;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_dsql::auth_token::{AuthTokenGenerator, Config};
use thiserror::Error;

use super::{MintKind, MintRequest, TokenMinter};
use crate::{AuthToken, CredentialSource};

/// An error while attempting to sign a connect token
#[derive(Debug, Error)]
pub enum AwsMintError {
    /// The signing parameters were rejected
    #[error("invalid token signing configuration")]
    Config(#[source] Box<dyn error::Error + Send + Sync + 'static>),
    /// Credentials could not be resolved or the request could not be signed
    #[error("error signing connect token")]
    Sign(#[source] Box<dyn error::Error + Send + Sync + 'static>),
}

/// Signs tokens with `aws-sdk-dsql`
#[derive(Clone, Debug, Default)]
pub struct AwsTokenMinter {
    behavior_version: Option<BehaviorVersion>,
}

impl AwsTokenMinter {
    /// Constructs a minter using the latest SDK behavior version
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins the SDK behavior version used when loading credentials
    pub fn with_behavior_version(mut self, version: BehaviorVersion) -> Self {
        self.behavior_version = Some(version);
        self
    }

    async fn load_sdk_config(&self, request: &MintRequest<'_>) -> SdkConfig {
        let version = self
            .behavior_version
            .clone()
            .unwrap_or_else(BehaviorVersion::latest);
        let loader = aws_config::defaults(version)
            .region(Region::new(request.region.as_str().to_owned()));

        let loader = match request.credentials {
            CredentialSource::DefaultChain => loader,
            CredentialSource::Profile(name) => loader.profile_name(name.as_str()),
            CredentialSource::Custom(custom) => {
                loader.credentials_provider(custom.provider().clone())
            }
        };

        loader.load().await
    }

    #[tracing::instrument(
        level = "debug",
        err,
        skip(self, request),
        fields(
            hostname = %request.hostname,
            region = %request.region,
            credentials = %request.credentials,
            lifetime = request.lifetime.map(|l| l.0),
        ),
    )]
    async fn sign(&self, kind: MintKind, request: MintRequest<'_>) -> Result<AuthToken, AwsMintError> {
        let mut config = Config::builder()
            .hostname(request.hostname.as_str())
            .region(Region::new(request.region.as_str().to_owned()));
        if let Some(lifetime) = request.lifetime {
            config = config.expires_in(lifetime.0);
        }
        let generator =
            AuthTokenGenerator::new(config.build().map_err(|e| AwsMintError::Config(e.into()))?);

        let sdk_config = self.load_sdk_config(&request).await;

        let token = match kind {
            MintKind::Standard => generator.db_connect_auth_token(&sdk_config).await,
            MintKind::Elevated => generator.db_connect_admin_auth_token(&sdk_config).await,
        }
        .map_err(AwsMintError::Sign)?;

        tracing::trace!("signed connect token");

        Ok(AuthToken::new(token.as_str().to_owned()))
    }
}

#[async_trait]
impl TokenMinter for AwsTokenMinter {
    type Error = AwsMintError;

    async fn mint_standard_token(&self, request: MintRequest<'_>) -> Result<AuthToken, Self::Error> {
        self.sign(MintKind::Standard, request).await
    }

    async fn mint_elevated_token(&self, request: MintRequest<'_>) -> Result<AuthToken, Self::Error> {
        self.sign(MintKind::Elevated, request).await
    }
}
