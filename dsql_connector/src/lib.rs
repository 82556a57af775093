//! Connect to Aurora DSQL through an existing Postgres driver
//!
//! DSQL clusters speak the Postgres wire protocol but authenticate with
//! short-lived IAM tokens instead of passwords. The [`Connector`] sits in
//! front of a [`PostgresDriver`]: it accepts `aws-dsql:postgresql://` URLs,
//! works out the user, region and credentials for the connection, fetches a
//! token from a shared [`TokenCache`][dsql_tokens::TokenCache] and hands the
//! driver a plain `postgresql://` URL with the token as the password.
//!
//! # Properties
//!
//! Connection settings are read from [`Properties`] and from the URL query,
//! with the URL winning. The recognized ones are listed in
//! [`PropertyDefinition::ALL`]; anything else is passed through to the
//! driver untouched. Values are trimmed and stripped of surrounding quotes.
//!
//! | Property              | Meaning                                          |
//! |-----------------------|--------------------------------------------------|
//! | `user`                | Database user (required); `admin` is elevated     |
//! | `profile`             | Named AWS profile, overriding configured creds   |
//! | `region`              | Region, if not derivable from the hostname       |
//! | `token-duration-secs` | Requested token lifetime in seconds              |
//! | `database`            | Database name, defaulting to `postgres`          |
//! | `ApplicationName`     | Framework name prefixed to the session name      |
//!
//! ```no_run
//! # #[cfg(all(feature = "aws", feature = "sqlx"))]
//! # async fn run() -> Result<(), dsql_connector::ConnectError> {
//! use dsql_connector::{Connector, Properties, SqlxDriver};
//! use dsql_tokens::minter::aws::AwsTokenMinter;
//!
//! let connector = Connector::new(AwsTokenMinter::new(), SqlxDriver);
//!
//! let mut properties = Properties::new();
//! properties.set("user", "admin");
//!
//! let connection = connector
//!     .connect(
//!         "aws-dsql:postgresql://abcdefghijklmnopqrstuvwxyz.dsql.us-east-1.on.aws/postgres",
//!         &properties,
//!     )
//!     .await?;
//! # let _ = connection;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! * `aws` (default): enables the `aws-sdk-dsql` minter in `dsql_tokens`.
//! * `sqlx`: provides [`SqlxDriver`], a driver backed by `sqlx`'s Postgres
//!   connections.

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

pub mod conn_url;
mod connector;
pub mod credentials;
pub mod driver;
mod error;
pub mod properties;

pub use connector::{build_application_name, Connector, VERSION};
pub use credentials::CredentialsManager;
#[cfg(feature = "sqlx")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlx")))]
pub use driver::SqlxDriver;
pub use driver::PostgresDriver;
pub use error::{ConnectError, InvalidPropertyError};
pub use properties::{Properties, PropertyDefinition, PropertyInfo};
