//! Connector URLs and their translation for the wrapped driver
//!
//! Applications address a cluster as
//! `aws-dsql:postgresql://host[:port][/database][?key=value&...]`. The
//! wrapped driver receives the same URL with the `aws-dsql:` marker removed
//! and the database always spelled out.

use dsql_tokens::RegionName;
use url::Url;

use crate::{properties::PropertyDefinition, ConnectError, Properties};

/// The prefix every connector URL starts with
pub const CONNECTOR_PREFIX: &str = "aws-dsql:postgresql://";

const MARKER: &str = "aws-dsql:";
const POSTGRES_PREFIX: &str = "postgresql://";

/// Whether `url` is addressed to this connector
pub fn is_dsql_url(url: &str) -> bool {
    !url.is_empty() && url.starts_with(CONNECTOR_PREFIX)
}

/// Parses a connector URL without rewriting it
pub fn parse(url: &str) -> Result<Url, ConnectError> {
    if !is_dsql_url(url) {
        return Err(ConnectError::NotDsqlUrl);
    }
    Ok(Url::parse(&url[MARKER.len()..])?)
}

/// Translates a connector URL into the URL handed to the wrapped driver
///
/// The database comes from the URL path if present, else from the
/// `database` property or its default.
pub fn to_postgres_url(url: &str, properties: &Properties) -> Result<Url, ConnectError> {
    let parsed = parse(url)?;
    let host = host(&parsed)?;

    let database = database_from_url(url)
        .or_else(|| {
            PropertyDefinition::DATABASE
                .get_or_default(properties)
                .map(ToOwned::to_owned)
        })
        .unwrap_or_default();

    let mut target = String::with_capacity(url.len() + database.len());
    target.push_str(POSTGRES_PREFIX);
    target.push_str(host);
    if let Some(port) = parsed.port() {
        target.push(':');
        target.push_str(&port.to_string());
    }
    target.push('/');
    target.push_str(&database);
    if let Some(query) = parsed.query().filter(|q| !q.is_empty()) {
        target.push('?');
        target.push_str(query);
    }

    Ok(Url::parse(&target)?)
}

/// Folds the database and query parameters of `url` into `properties`
///
/// The database only fills in a missing `database` property. Query
/// parameters override properties of the same name; a parameter without a
/// value is recorded as the empty string.
pub fn merge_url_properties(url: &Url, properties: &mut Properties) {
    if !properties.contains(PropertyDefinition::DATABASE.name()) {
        if let Some(database) = first_path_segment(url) {
            PropertyDefinition::DATABASE.set(properties, Some(database));
        }
    }

    for (key, value) in url.query_pairs() {
        if key.is_empty() {
            continue;
        }
        properties.set(key, value);
    }
}

/// Gets the host of a parsed URL
pub fn host(url: &Url) -> Result<&str, ConnectError> {
    url.host_str()
        .filter(|h| !h.is_empty())
        .ok_or(ConnectError::MissingHost)
}

/// Reads the database named by a URL, with or without the connector marker
///
/// Returns `None` if the URL has no database or cannot be parsed.
pub fn database_from_url(url: &str) -> Option<String> {
    let url = url.strip_prefix(MARKER).unwrap_or(url);
    let parsed = if url.starts_with(POSTGRES_PREFIX) {
        Url::parse(url)
    } else {
        Url::parse(&format!("{}{}", POSTGRES_PREFIX, url))
    };

    match parsed {
        Ok(parsed) => first_path_segment(&parsed).map(ToOwned::to_owned),
        Err(error) => {
            tracing::warn!(%error, "could not parse database from URL");
            None
        }
    }
}

/// Reads the region out of a cluster hostname
///
/// Cluster endpoints look like `<id>.dsql.<region>.on.aws`, so the region is
/// the third label.
pub fn region_from_host(host: &str) -> Result<RegionName, ConnectError> {
    host.split('.')
        .nth(2)
        .filter(|label| !label.is_empty())
        .map(|label| RegionName::new(label.to_owned()))
        .ok_or_else(|| ConnectError::UndeterminedRegion(host.to_owned()))
}

fn first_path_segment(url: &Url) -> Option<&str> {
    url.path_segments()
        .and_then(|mut segments| segments.next())
        .filter(|segment| !segment.is_empty())
}
