//! Secret resolution.
//!
//! The managed vault itself is an external collaborator; everything here is
//! the contract (`SecretStore`), a process-scoped single-flight cache, and
//! the environment-backed store used in deployment.

mod cache;

pub use cache::SecretCache;

use async_trait::async_trait;
use thiserror::Error;

/// SHA passphrase used to sign outbound payloads.
pub const SECRET_EPDQ_SHAPHRASE: &str = "epdq-shaphrase";
/// Merchant PSPID.
pub const SECRET_EPDQ_PSPID: &str = "epdq-pspid";

#[derive(Debug, Clone, Error)]
pub enum SecretError {
    #[error("secret not found: {name}")]
    NotFound { name: String },

    #[error("secret store unavailable: {message}")]
    Unavailable { message: String },
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError>;
}

/// Secret store backed by environment variables: `epdq-shaphrase` resolves
/// from `EPDQ_SHAPHRASE`, and so on.
pub struct EnvSecretStore;

impl EnvSecretStore {
    fn env_key(name: &str) -> String {
        name.to_uppercase().replace('-', "_")
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        std::env::var(Self::env_key(name)).map_err(|_| SecretError::NotFound {
            name: name.to_string(),
        })
    }
}
