use std::sync::Arc;

use dsql_clock::{Clock, DurationSecs, System};
use dsql_tokens::{minter::TokenMinter, CacheKey, DbUser, Hostname, RegionName, TokenCache};

use crate::{
    conn_url,
    properties::{PropertyDefinition, PropertyInfo, PASSWORD},
    ConnectError, CredentialsManager, PostgresDriver, Properties,
};

/// The connector's version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const BASE_APPLICATION_NAME: &str = concat!("dsql-connector/", env!("CARGO_PKG_VERSION"));

/// Builds the session application name
///
/// A framework name such as `hibernate` is prepended to the connector's own
/// identifier. Blank values and values containing `/` are ignored.
///
/// ```
/// use dsql_connector::build_application_name;
///
/// assert_eq!(
///     build_application_name(Some(" diesel ")),
///     concat!("diesel:dsql-connector/", env!("CARGO_PKG_VERSION")),
/// );
/// assert_eq!(
///     build_application_name(Some("app/1.0")),
///     concat!("dsql-connector/", env!("CARGO_PKG_VERSION")),
/// );
/// ```
pub fn build_application_name(prefix: Option<&str>) -> String {
    match prefix.map(str::trim) {
        Some(prefix) if !prefix.is_empty() && !prefix.contains('/') => {
            format!("{}:{}", prefix, BASE_APPLICATION_NAME)
        }
        _ => BASE_APPLICATION_NAME.to_owned(),
    }
}

/// Opens IAM-authenticated connections through a wrapped Postgres driver
///
/// The token cache is shared behind an `Arc`, so several connectors (for
/// example, one per driver) can reuse the same tokens.
#[derive(Debug)]
pub struct Connector<M, D, C = System> {
    tokens: Arc<TokenCache<M, C>>,
    credentials: CredentialsManager,
    driver: D,
}

impl<M, D> Connector<M, D, System> {
    /// Constructs a connector with its own token cache
    pub fn new(minter: M, driver: D) -> Self {
        Self::with_token_cache(Arc::new(TokenCache::new(minter)), driver)
    }
}

impl<M, D, C> Connector<M, D, C> {
    /// Constructs a connector sharing an existing token cache
    pub fn with_token_cache(tokens: Arc<TokenCache<M, C>>, driver: D) -> Self {
        Self {
            tokens,
            credentials: CredentialsManager::new(),
            driver,
        }
    }

    /// Replaces the credentials manager
    pub fn with_credentials(mut self, credentials: CredentialsManager) -> Self {
        self.credentials = credentials;
        self
    }

    /// Gets the token cache
    pub fn token_cache(&self) -> &Arc<TokenCache<M, C>> {
        &self.tokens
    }

    /// Gets the credentials manager
    pub fn credentials(&self) -> &CredentialsManager {
        &self.credentials
    }

    /// Gets the wrapped driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Whether `url` is addressed to this connector
    pub fn accepts_url(&self, url: &str) -> bool {
        conn_url::is_dsql_url(url)
    }

    /// Describes every property the connector understands, with the values
    /// that `url` and `properties` would give them
    pub fn property_info(
        &self,
        url: Option<&str>,
        properties: &Properties,
    ) -> Result<Vec<PropertyInfo>, ConnectError> {
        let mut properties = properties.clone();
        if let Some(url) = url {
            conn_url::merge_url_properties(&conn_url::parse(url)?, &mut properties);
        }

        Ok(PropertyDefinition::ALL
            .iter()
            .map(|p| p.info(&properties))
            .collect())
    }
}

impl<M, D, C> Connector<M, D, C>
where
    M: TokenMinter,
    D: PostgresDriver,
    C: Clock,
{
    /// Opens a connection to the cluster named by `url`
    ///
    /// Properties given in the URL query override `properties`. The token is
    /// taken from the cache when a fresh one is available.
    pub async fn connect(
        &self,
        url: &str,
        properties: &Properties,
    ) -> Result<D::Connection, ConnectError> {
        let mut properties = properties.sanitized();

        let target = conn_url::to_postgres_url(url, &properties)?;
        conn_url::merge_url_properties(&target, &mut properties);

        let user = PropertyDefinition::USER
            .get(&properties)
            .ok_or(ConnectError::MissingUser)?;
        let host = conn_url::host(&target)?;

        let region = match PropertyDefinition::REGION.get(&properties) {
            Some(region) => RegionName::new(region.to_lowercase()),
            None => RegionName::new(conn_url::region_from_host(host)?.as_str().to_lowercase()),
        };

        let lifetime = PropertyDefinition::TOKEN_DURATION.get_u64(&properties)?;
        let credentials = self
            .credentials
            .resolve(PropertyDefinition::PROFILE.get(&properties));

        let key = CacheKey::new(
            Hostname::new(host.to_owned()),
            region,
            DbUser::new(user.to_owned()),
            credentials,
            Some(DurationSecs(lifetime)),
        );

        tracing::debug!(scope = %key, "obtaining token for connection");
        let token = self.tokens.get_token(&key).await?;

        properties.set(PASSWORD, token.take());
        let application_name =
            build_application_name(PropertyDefinition::APPLICATION_NAME.get(&properties));
        PropertyDefinition::APPLICATION_NAME.set(&mut properties, Some(&application_name));

        self.driver
            .connect(&target, &properties)
            .await
            .map_err(|error| ConnectError::Driver(Box::new(error)))
    }
}
