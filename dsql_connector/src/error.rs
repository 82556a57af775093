use std::{error, num::ParseIntError};

use dsql_tokens::AcquisitionError;
use thiserror::Error;

/// A connection property held a value of the wrong shape
#[derive(Debug, Error)]
#[error("invalid value {value:?} for property `{name}`")]
pub struct InvalidPropertyError {
    pub(crate) name: &'static str,
    pub(crate) value: String,
    #[source]
    pub(crate) source: ParseIntError,
}

impl InvalidPropertyError {
    /// Gets the name of the offending property
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Gets the rejected value
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// An error while establishing a connection
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The URL does not use the connector's scheme
    #[error("URL must start with `{}`", crate::conn_url::CONNECTOR_PREFIX)]
    NotDsqlUrl,
    /// The URL could not be parsed
    #[error("invalid connection URL")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL names no host
    #[error("invalid connection URL: no host found")]
    MissingHost,
    /// No database user was given
    #[error("missing `user` property")]
    MissingUser,
    /// No region was given and none could be read from the hostname
    #[error("cannot determine region from host `{0}`")]
    UndeterminedRegion(String),
    /// A property held a malformed value
    #[error(transparent)]
    InvalidProperty(#[from] InvalidPropertyError),
    /// No authentication token could be obtained
    #[error("unable to obtain authentication token")]
    TokenAcquisition(#[from] AcquisitionError),
    /// The wrapped driver failed to connect
    #[error("driver failed to connect")]
    Driver(#[source] Box<dyn error::Error + Send + Sync + 'static>),
}
