use std::fmt;

use dsql_clock::DurationSecs;

use crate::{
    CredentialSource, DbUser, DbUserRef, Hostname, HostnameRef, RegionName, RegionNameRef,
};

/// The scope a token is valid for
///
/// Two keys are equal only when every component matches. A requested
/// lifetime of zero is recorded as no requested lifetime, since both mean
/// "use the service default".
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    hostname: Hostname,
    region: RegionName,
    user: DbUser,
    credentials: CredentialSource,
    lifetime: Option<DurationSecs>,
}

impl CacheKey {
    /// Constructs a new cache key
    pub fn new(
        hostname: impl Into<Hostname>,
        region: impl Into<RegionName>,
        user: impl Into<DbUser>,
        credentials: CredentialSource,
        lifetime: Option<DurationSecs>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            region: region.into(),
            user: user.into(),
            credentials,
            lifetime: lifetime.filter(|l| !l.is_zero()),
        }
    }

    /// Gets the cluster endpoint
    #[inline]
    pub fn hostname(&self) -> &HostnameRef {
        &self.hostname
    }

    /// Gets the region the token is signed for
    #[inline]
    pub fn region(&self) -> &RegionNameRef {
        &self.region
    }

    /// Gets the database user
    #[inline]
    pub fn user(&self) -> &DbUserRef {
        &self.user
    }

    /// Gets the credential source used for signing
    #[inline]
    pub fn credentials(&self) -> &CredentialSource {
        &self.credentials
    }

    /// Gets the requested token lifetime, if any
    #[inline]
    pub fn lifetime(&self) -> Option<DurationSecs> {
        self.lifetime
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} ({}, {})",
            self.user, self.hostname, self.region, self.credentials
        )?;
        if let Some(lifetime) = self.lifetime {
            write!(f, " for {}s", lifetime.0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn key(
        hostname: &'static str,
        region: &'static str,
        user: &'static str,
        credentials: CredentialSource,
        lifetime: Option<u64>,
    ) -> CacheKey {
        CacheKey::new(
            hostname,
            region,
            user,
            credentials,
            lifetime.map(DurationSecs),
        )
    }

    fn base() -> CacheKey {
        key(
            "cluster1.example",
            "us-east-1",
            "app_user",
            CredentialSource::DefaultChain,
            Some(1800),
        )
    }

    #[test]
    fn identical_components_are_equal() {
        let mut set = HashSet::new();
        set.insert(base());
        assert!(set.contains(&base()));
    }

    #[test]
    fn any_differing_component_is_distinct() {
        let variants = [
            key("cluster2.example", "us-east-1", "app_user", CredentialSource::DefaultChain, Some(1800)),
            key("cluster1.example", "us-west-2", "app_user", CredentialSource::DefaultChain, Some(1800)),
            key("cluster1.example", "us-east-1", "admin", CredentialSource::DefaultChain, Some(1800)),
            key("cluster1.example", "us-east-1", "app_user", CredentialSource::profile("prod"), Some(1800)),
            key("cluster1.example", "us-east-1", "app_user", CredentialSource::DefaultChain, Some(3600)),
            key("cluster1.example", "us-east-1", "app_user", CredentialSource::DefaultChain, None),
        ];

        let mut set: HashSet<_> = variants.iter().cloned().collect();
        assert_eq!(set.len(), variants.len());
        assert!(set.insert(base()));
    }

    #[test]
    fn zero_lifetime_matches_absent_lifetime() {
        let zero = key("c", "r", "u", CredentialSource::DefaultChain, Some(0));
        let absent = key("c", "r", "u", CredentialSource::DefaultChain, None);

        assert_eq!(zero, absent);
        assert_eq!(zero.lifetime(), None);
    }

    #[test]
    fn display_names_the_scope() {
        assert_eq!(
            base().to_string(),
            "app_user@cluster1.example (us-east-1, default chain) for 1800s"
        );
    }
}
