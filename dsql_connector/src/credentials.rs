//! The connector's fallback credential source

use arc_swap::ArcSwap;
use aws_credential_types::provider::ProvideCredentials;
use dsql_tokens::{CredentialSource, ProfileName};

/// Holds the credential source used for connections that name no `profile`
///
/// Starts out with the SDK's default provider chain. Safe to update while
/// other tasks are connecting; each connection uses whichever source was
/// current when it looked.
#[derive(Debug, Default)]
pub struct CredentialsManager {
    source: ArcSwap<CredentialSource>,
}

impl CredentialsManager {
    /// Constructs a manager using the default provider chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs a manager using `source`
    pub fn with_provider(source: CredentialSource) -> Self {
        Self {
            source: ArcSwap::from_pointee(source),
        }
    }

    /// Replaces the credential source for subsequent connections
    pub fn set_provider(&self, source: CredentialSource) {
        tracing::debug!(credentials = %source, "credential source replaced");
        self.source.store(source.into());
    }

    /// Registers an application-supplied provider as the credential source
    ///
    /// Returns the registered source. Tokens are cached per registration, so
    /// registering the same provider again starts from an empty cache scope.
    pub fn set_custom_provider(
        &self,
        provider: impl ProvideCredentials + 'static,
    ) -> CredentialSource {
        let source = CredentialSource::custom(provider);
        self.set_provider(source.clone());
        source
    }

    /// Restores the default provider chain
    pub fn reset_provider(&self) {
        self.set_provider(CredentialSource::DefaultChain);
    }

    /// Gets the current credential source
    pub fn provider(&self) -> CredentialSource {
        CredentialSource::clone(&self.source.load())
    }

    /// Picks the credential source for a connection
    ///
    /// A named profile wins over the configured source.
    pub fn resolve(&self, profile: Option<&str>) -> CredentialSource {
        match profile {
            Some(name) => CredentialSource::Profile(ProfileName::new(name.to_owned())),
            None => self.provider(),
        }
    }
}

#[cfg(test)]
mod tests {
    use aws_credential_types::Credentials;

    use super::*;

    #[test]
    fn defaults_to_provider_chain() {
        assert_eq!(CredentialsManager::new().provider(), CredentialSource::DefaultChain);
    }

    #[test]
    fn custom_provider_is_used_until_reset() {
        let manager = CredentialsManager::new();
        let registered = manager
            .set_custom_provider(Credentials::new("AKIDEXAMPLE", "secret", None, None, "test"));

        assert_eq!(manager.provider(), registered);
        assert_eq!(manager.resolve(None), registered);

        manager.reset_provider();
        assert_eq!(manager.provider(), CredentialSource::DefaultChain);
    }

    #[test]
    fn profile_wins_over_configured_source() {
        let manager = CredentialsManager::with_provider(CredentialSource::profile("ops"));

        assert_eq!(manager.resolve(Some("prod")), CredentialSource::profile("prod"));
        assert_eq!(manager.resolve(None), CredentialSource::profile("ops"));
    }
}
