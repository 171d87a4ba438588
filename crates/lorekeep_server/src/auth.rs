//! Bearer token authentication for the reference backend.
//!
//! Tokens are signed with HMAC-SHA256 and carry their issue time so the
//! server can expire them. A revocation epoch lets tests invalidate every
//! outstanding token at once, which is how an expired session is simulated.
//!
//! ## Token Format
//!
//! Tokens are composed of:
//! - 16 bytes: subject (user or device)
//! - 8 bytes: revocation epoch (big-endian)
//! - 8 bytes: timestamp (Unix millis, big-endian)
//! - 32 bytes: HMAC-SHA256 signature
//!
//! Total: 64 bytes, hex-encoded for transport.

use crate::error::{ServerError, ServerResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

const SIGNED_LEN: usize = 32;
const TOKEN_LEN: usize = SIGNED_LEN + 32;

/// Authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret key for HMAC.
    pub secret: Vec<u8>,
    /// Token expiration duration.
    pub token_expiry: Duration,
}

impl AuthConfig {
    /// Creates a new auth configuration.
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            token_expiry: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Sets the token expiration duration.
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }
}

/// Issues and validates bearer tokens.
pub struct TokenValidator {
    mac: HmacSha256,
    token_expiry: Duration,
    epoch: AtomicU64,
}

impl TokenValidator {
    /// Creates a new token validator.
    pub fn new(config: AuthConfig) -> ServerResult<Self> {
        let mac = HmacSha256::new_from_slice(&config.secret)
            .map_err(|e| ServerError::Internal(format!("hmac key: {e}")))?;
        Ok(Self {
            mac,
            token_expiry: config.token_expiry,
            epoch: AtomicU64::new(0),
        })
    }

    /// Issues a token for `subject`, stamped with the current time.
    pub fn issue(&self, subject: [u8; 16]) -> String {
        self.issue_at(subject, SystemTime::now())
    }

    /// Issues a token for `subject` as if issued at `issued_at`.
    pub fn issue_at(&self, subject: [u8; 16], issued_at: SystemTime) -> String {
        let mut token = Vec::with_capacity(TOKEN_LEN);
        token.extend_from_slice(&subject);
        token.extend_from_slice(&self.epoch().to_be_bytes());
        token.extend_from_slice(&unix_millis(issued_at).to_be_bytes());

        let signature = self.sign(&token);
        token.extend_from_slice(&signature);
        hex::encode(token)
    }

    /// Validates a token and returns its subject.
    pub fn validate(&self, token: &str) -> ServerResult<[u8; 16]> {
        let bytes = hex::decode(token)
            .map_err(|_| ServerError::NotAuthorized("token is not hex".into()))?;
        if bytes.len() != TOKEN_LEN {
            return Err(ServerError::NotAuthorized("invalid token length".into()));
        }

        let (signed, signature) = bytes.split_at(SIGNED_LEN);
        let mut mac = self.mac.clone();
        mac.update(signed);
        mac.verify_slice(signature)
            .map_err(|_| ServerError::NotAuthorized("invalid signature".into()))?;

        let mut subject = [0u8; 16];
        let mut epoch = [0u8; 8];
        let mut issued = [0u8; 8];
        subject.copy_from_slice(&signed[0..16]);
        epoch.copy_from_slice(&signed[16..24]);
        issued.copy_from_slice(&signed[24..32]);

        if u64::from_be_bytes(epoch) != self.epoch() {
            return Err(ServerError::NotAuthorized("token revoked".into()));
        }

        let expiry = self.token_expiry.as_millis() as u64;
        if unix_millis(SystemTime::now()) > u64::from_be_bytes(issued).saturating_add(expiry) {
            return Err(ServerError::NotAuthorized("token expired".into()));
        }

        Ok(subject)
    }

    /// Invalidates every token issued so far.
    pub fn revoke_all(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn sign(&self, data: &[u8]) -> [u8; 32] {
        let mut mac = self.mac.clone();
        mac.update(data);
        mac.finalize().into_bytes().into()
    }
}

fn unix_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> TokenValidator {
        TokenValidator::new(AuthConfig::new(b"test-secret-key-32-bytes-long!!".to_vec())).unwrap()
    }

    #[test]
    fn issue_and_validate_token() {
        let validator = validator();
        let token = validator.issue([1u8; 16]);
        assert_eq!(token.len(), TOKEN_LEN * 2);
        assert_eq!(validator.validate(&token).unwrap(), [1u8; 16]);
    }

    #[test]
    fn reject_tampered_token() {
        let validator = validator();
        let mut bytes = hex::decode(validator.issue([1u8; 16])).unwrap();
        bytes[50] ^= 0xFF;
        assert!(validator.validate(&hex::encode(bytes)).is_err());
    }

    #[test]
    fn reject_foreign_secret() {
        let other =
            TokenValidator::new(AuthConfig::new(b"another-secret".to_vec())).unwrap();
        let token = other.issue([1u8; 16]);
        assert!(validator().validate(&token).is_err());
    }

    #[test]
    fn reject_garbage() {
        let validator = validator();
        assert!(validator.validate("not-a-token").is_err());
        assert!(validator.validate("abcd").is_err());
        assert!(validator.validate("").is_err());
    }

    #[test]
    fn reject_expired_token() {
        let validator = validator();
        let issued = SystemTime::now() - Duration::from_secs(48 * 60 * 60);
        let token = validator.issue_at([1u8; 16], issued);

        let err = validator.validate(&token).unwrap_err();
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn revoke_all_invalidates_outstanding_tokens() {
        let validator = validator();
        let old = validator.issue([1u8; 16]);
        validator.revoke_all();

        let err = validator.validate(&old).unwrap_err();
        assert!(err.to_string().contains("revoked"));
        assert!(validator.validate(&validator.issue([1u8; 16])).is_ok());
    }
}
