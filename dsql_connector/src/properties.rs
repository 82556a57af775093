//! Connection properties and the ones this connector understands

use std::{collections::BTreeMap, fmt};

use crate::InvalidPropertyError;

/// The property the wrapped driver reads the token from
pub const PASSWORD: &str = "password";

/// A set of string connection properties
///
/// `Debug` output never shows the value of the `password` property.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Properties(BTreeMap<String, String>);

impl Properties {
    /// Constructs an empty property set
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the value of a property
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Sets a property, replacing any previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Removes a property, returning its value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Whether the property is set
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of properties set
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no properties are set
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over properties in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copies the property set with every value passed through [`sanitize_value`]
    pub fn sanitized(&self) -> Self {
        self.iter()
            .map(|(k, v)| (k.to_owned(), sanitize_value(v).to_owned()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Properties {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.0
            .extend(iter.into_iter().map(|(k, v)| (k.into(), v.into())));
    }
}

impl fmt::Debug for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(k, v)| {
                if k == PASSWORD {
                    (k, "***")
                } else {
                    (k, v)
                }
            }))
            .finish()
    }
}

/// Trims whitespace and one pair of matching surrounding quotes
///
/// ```
/// use dsql_connector::properties::sanitize_value;
///
/// assert_eq!(sanitize_value("  'prod' "), "prod");
/// assert_eq!(sanitize_value("\"it's\""), "it's");
/// assert_eq!(sanitize_value("'mismatched\""), "'mismatched\"");
/// ```
pub fn sanitize_value(value: &str) -> &str {
    let trimmed = value.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            tracing::trace!(from = value, to = inner, "sanitized property value");
            return inner;
        }
    }
    trimmed
}

/// A connection property understood by the connector
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PropertyDefinition {
    name: &'static str,
    default: Option<&'static str>,
    description: &'static str,
    required: bool,
}

impl PropertyDefinition {
    /// The database user to connect as
    ///
    /// The user must be associated with an IAM role allowed to connect to
    /// the cluster.
    pub const USER: Self = Self {
        name: "user",
        default: None,
        description: "The user to connect with Aurora DSQL",
        required: true,
    };

    /// A named AWS profile to sign tokens with
    ///
    /// Takes precedence over the connector's configured credentials.
    pub const PROFILE: Self = Self {
        name: "profile",
        default: None,
        description: "The profile to be used for Aurora DSQL connections",
        required: false,
    };

    /// The AWS region of the cluster
    ///
    /// Only needed when it cannot be read from the hostname.
    pub const REGION: Self = Self {
        name: "region",
        default: None,
        description: "The AWS region for Aurora DSQL connections",
        required: false,
    };

    /// Requested token lifetime in seconds; zero leaves it to the service
    pub const TOKEN_DURATION: Self = Self {
        name: "token-duration-secs",
        default: None,
        description: "The duration in seconds for cached tokens",
        required: false,
    };

    /// The database within the cluster
    pub const DATABASE: Self = Self {
        name: "database",
        default: Some("postgres"),
        description: "The database name to connect to (default: postgres)",
        required: false,
    };

    /// A prefix identifying the calling framework in the session's
    /// application name
    pub const APPLICATION_NAME: Self = Self {
        name: "ApplicationName",
        default: None,
        description: "Application name for connection tracking. ORM frameworks can set this to \
                      identify themselves (e.g., 'hibernate'). Values containing '/' are ignored.",
        required: false,
    };

    /// Every property the connector understands
    pub const ALL: [Self; 6] = [
        Self::USER,
        Self::PROFILE,
        Self::REGION,
        Self::TOKEN_DURATION,
        Self::DATABASE,
        Self::APPLICATION_NAME,
    ];

    /// Gets the property's name
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Gets the property's default value, if it has one
    #[inline]
    pub fn default_value(&self) -> Option<&'static str> {
        self.default
    }

    /// Gets a human-readable description of the property
    #[inline]
    pub fn description(&self) -> &'static str {
        self.description
    }

    /// Whether connections cannot be made without this property
    #[inline]
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Gets the property's value
    pub fn get<'a>(&self, properties: &'a Properties) -> Option<&'a str> {
        properties.get(self.name)
    }

    /// Gets the property's value, falling back to its default
    pub fn get_or_default<'a>(&self, properties: &'a Properties) -> Option<&'a str> {
        self.get(properties).or(self.default)
    }

    /// Gets the property's value as an integer
    ///
    /// A property that is unset and has no default reads as zero.
    pub fn get_u64(&self, properties: &Properties) -> Result<u64, InvalidPropertyError> {
        match self.get_or_default(properties) {
            None => Ok(0),
            Some(value) => value.trim().parse().map_err(|source| InvalidPropertyError {
                name: self.name,
                value: value.to_owned(),
                source,
            }),
        }
    }

    /// Sets the property, or removes it when `value` is `None`
    pub fn set(&self, properties: &mut Properties, value: Option<&str>) {
        match value {
            Some(value) => properties.set(self.name, value),
            None => {
                properties.remove(self.name);
            }
        }
    }

    /// Describes the property along with its current value
    pub fn info(&self, properties: &Properties) -> PropertyInfo {
        PropertyInfo {
            name: self.name,
            value: self.get(properties).map(ToOwned::to_owned),
            description: self.description,
            required: self.required,
        }
    }
}

/// A description of a property and its current value, for tooling
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyInfo {
    /// The property's name
    pub name: &'static str,
    /// The value currently set, if any
    pub value: Option<String>,
    /// A human-readable description
    pub description: &'static str,
    /// Whether the property must be set
    pub required: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_whitespace_and_quotes() {
        assert_eq!(sanitize_value("  value  "), "value");
        assert_eq!(sanitize_value("\"value\""), "value");
        assert_eq!(sanitize_value(" 'value' "), "value");
        assert_eq!(sanitize_value("\"\""), "");
        assert_eq!(sanitize_value("\""), "\"");
        assert_eq!(sanitize_value("'value\""), "'value\"");
        assert_eq!(sanitize_value("\"\"nested\"\""), "\"nested\"");
    }

    #[test]
    fn sanitized_copy_cleans_every_value() {
        let props: Properties = [("user", " 'admin' "), ("profile", "\"prod\"")]
            .into_iter()
            .collect();
        let clean = props.sanitized();

        assert_eq!(clean.get("user"), Some("admin"));
        assert_eq!(clean.get("profile"), Some("prod"));
        assert_eq!(props.get("user"), Some(" 'admin' "));
    }

    #[test]
    fn database_defaults_to_postgres() {
        let mut props = Properties::new();
        assert_eq!(PropertyDefinition::DATABASE.get(&props), None);
        assert_eq!(PropertyDefinition::DATABASE.get_or_default(&props), Some("postgres"));

        PropertyDefinition::DATABASE.set(&mut props, Some("orders"));
        assert_eq!(PropertyDefinition::DATABASE.get_or_default(&props), Some("orders"));

        PropertyDefinition::DATABASE.set(&mut props, None);
        assert!(!props.contains("database"));
    }

    #[test]
    fn token_duration_parses() {
        let mut props = Properties::new();
        assert_eq!(PropertyDefinition::TOKEN_DURATION.get_u64(&props).unwrap(), 0);

        props.set("token-duration-secs", "3600");
        assert_eq!(PropertyDefinition::TOKEN_DURATION.get_u64(&props).unwrap(), 3600);

        props.set("token-duration-secs", "an hour");
        let err = PropertyDefinition::TOKEN_DURATION
            .get_u64(&props)
            .expect_err("not a number");
        assert_eq!(err.name(), "token-duration-secs");
        assert_eq!(err.value(), "an hour");
    }

    #[test]
    fn info_reports_current_values() {
        let props: Properties = [("user", "admin")].into_iter().collect();
        let infos: Vec<_> = PropertyDefinition::ALL
            .iter()
            .map(|p| p.info(&props))
            .collect();

        assert_eq!(infos.len(), 6);
        assert_eq!(infos[0].name, "user");
        assert_eq!(infos[0].value.as_deref(), Some("admin"));
        assert!(infos[0].required);
        assert!(infos[1..].iter().all(|i| i.value.is_none() && !i.required));
    }

    #[test]
    fn debug_hides_password() {
        let props: Properties = [("user", "admin"), (PASSWORD, "secret-token")]
            .into_iter()
            .collect();
        let rendered = format!("{:?}", props);

        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("secret-token"));
    }
}
