//! Where signing credentials come from

use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::atomic::{AtomicU64, Ordering},
};

use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};

use crate::{ProfileName, ProfileNameRef};

/// The origin of the credentials used to sign tokens
///
/// Part of every cache key: tokens signed with one source are never served
/// to a caller asking for another.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum CredentialSource {
    /// The SDK's default provider chain
    #[default]
    DefaultChain,
    /// A named profile from the shared configuration files
    Profile(ProfileName),
    /// A provider supplied by the application
    Custom(CustomCredentials),
}

impl CredentialSource {
    /// Constructs a source reading the given named profile
    pub fn profile(name: impl Into<ProfileName>) -> Self {
        Self::Profile(name.into())
    }

    /// Constructs a source around an application-supplied provider
    pub fn custom(provider: impl ProvideCredentials + 'static) -> Self {
        Self::Custom(CustomCredentials::new(provider))
    }

    /// Gets the profile name, if this source reads a profile
    pub fn profile_name(&self) -> Option<&ProfileNameRef> {
        match self {
            Self::Profile(name) => Some(name),
            _ => None,
        }
    }
}

impl From<CustomCredentials> for CredentialSource {
    fn from(custom: CustomCredentials) -> Self {
        Self::Custom(custom)
    }
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DefaultChain => f.write_str("default chain"),
            Self::Profile(name) => write!(f, "profile {}", name),
            Self::Custom(custom) => write!(f, "custom provider #{}", custom.id),
        }
    }
}

static NEXT_CUSTOM_ID: AtomicU64 = AtomicU64::new(1);

/// An application-supplied credentials provider
///
/// Two values are equal only if one was cloned from the other. Wrapping the
/// same provider twice yields two distinct sources.
#[derive(Clone)]
pub struct CustomCredentials {
    id: u64,
    provider: SharedCredentialsProvider,
}

impl CustomCredentials {
    /// Registers a provider under a fresh identity
    pub fn new(provider: impl ProvideCredentials + 'static) -> Self {
        Self {
            id: NEXT_CUSTOM_ID.fetch_add(1, Ordering::Relaxed),
            provider: SharedCredentialsProvider::new(provider),
        }
    }

    /// Gets the wrapped provider
    pub fn provider(&self) -> &SharedCredentialsProvider {
        &self.provider
    }
}

impl PartialEq for CustomCredentials {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CustomCredentials {}

impl Hash for CustomCredentials {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for CustomCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomCredentials")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
