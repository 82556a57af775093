//! The Postgres driver that connections are handed off to

use std::error;

use async_trait::async_trait;
use url::Url;

use crate::Properties;

/// A Postgres wire-protocol driver
///
/// Receives the translated `postgresql://` URL and the final property set,
/// which carries the database user in `user` and the token in `password`.
#[async_trait]
pub trait PostgresDriver: Send + Sync {
    /// An established connection
    type Connection: Send;

    /// The error type returned in the event that connecting fails
    type Error: error::Error + Send + Sync + 'static;

    /// Opens a connection
    async fn connect(
        &self,
        url: &Url,
        properties: &Properties,
    ) -> Result<Self::Connection, Self::Error>;
}

#[cfg(feature = "sqlx")]
mod sqlx_driver {
    use async_trait::async_trait;
    use sqlx::{
        postgres::{PgConnectOptions, PgSslMode},
        ConnectOptions, PgConnection,
    };
    use url::Url;

    use super::PostgresDriver;
    use crate::{
        properties::{PropertyDefinition, PASSWORD},
        Properties,
    };

    /// Connects with `sqlx`
    ///
    /// TLS is required unless the `sslmode` property says otherwise.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct SqlxDriver;

    impl SqlxDriver {
        /// Builds the options `sqlx` connects with
        pub fn connect_options(
            url: &Url,
            properties: &Properties,
        ) -> Result<PgConnectOptions, sqlx::Error> {
            let ssl_mode = properties
                .get("sslmode")
                .map(str::parse::<PgSslMode>)
                .transpose()?
                .unwrap_or(PgSslMode::Require);

            let mut options = PgConnectOptions::new_without_pgpass().ssl_mode(ssl_mode);

            if let Some(host) = url.host_str() {
                options = options.host(host);
            }
            if let Some(port) = url.port() {
                options = options.port(port);
            }
            if let Some(database) = url
                .path_segments()
                .and_then(|mut s| s.next())
                .filter(|s| !s.is_empty())
            {
                options = options.database(database);
            }
            if let Some(user) = PropertyDefinition::USER.get(properties) {
                options = options.username(user);
            }
            if let Some(password) = properties.get(PASSWORD) {
                options = options.password(password);
            }
            if let Some(name) = PropertyDefinition::APPLICATION_NAME.get(properties) {
                options = options.application_name(name);
            }

            Ok(options)
        }
    }

    #[async_trait]
    impl PostgresDriver for SqlxDriver {
        type Connection = PgConnection;
        type Error = sqlx::Error;

        async fn connect(
            &self,
            url: &Url,
            properties: &Properties,
        ) -> Result<Self::Connection, Self::Error> {
            Self::connect_options(url, properties)?.connect().await
        }
    }

}

#[cfg(feature = "sqlx")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlx")))]
pub use sqlx_driver::SqlxDriver;
