//! Credential supply for gateway calls.

use async_trait::async_trait;

/// Supplies bearer credentials to the gateway.
///
/// Acquiring credentials (sign-in flows, token storage) is the
/// implementor's business. The gateway only asks for the current token,
/// checks it, and asks for a fresh one at most once per call.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Returns the current credential, if any.
    async fn credential(&self) -> Option<String>;

    /// Returns true if the credential looks usable.
    fn is_valid(&self, token: &str) -> bool {
        !token.is_empty()
    }

    /// Obtains a fresh credential, if possible.
    async fn refresh_credential(&self) -> Option<String>;
}

/// A fixed credential, for scripts and tools.
///
/// Refreshing yields the same token, so a rejected token fails the call
/// after one retry.
#[derive(Debug, Clone)]
pub struct StaticCredential {
    token: String,
}

impl StaticCredential {
    /// Creates a provider for the given token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl AuthProvider for StaticCredential {
    async fn credential(&self) -> Option<String> {
        Some(self.token.clone())
    }

    async fn refresh_credential(&self) -> Option<String> {
        Some(self.token.clone())
    }
}
