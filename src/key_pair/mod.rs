//! Access key pair provisioning.
//!
//! The provider only reveals private key material in the creation response,
//! so every creation persists that material immediately through
//! [`KeyMaterialStore`]. A key pair found already present yields no material.

mod store;

use camino::Utf8PathBuf;
use thiserror::Error;
use tracing::{info, warn};

use crate::fallback::{EnsureError, Ensured, ensure_resource};
use crate::provider::{AccessKeyPair, ControlPlane, ProviderError};

pub use store::KeyMaterialStore;

/// How an existing key pair of the same name is treated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyPairPolicy {
    /// Reuse an existing key pair; only a fresh creation yields material.
    CreateIfAbsent,
    /// Delete any existing key pair and create a new one, invalidating the
    /// previous material.
    ResetAndRecreate,
}

/// Key material written to local storage.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PersistedKey {
    /// Key pair name.
    pub name: String,
    /// File holding the private key.
    pub path: Utf8PathBuf,
}

/// Errors raised while ensuring a key pair.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum KeyPairError {
    /// A provider call failed outright.
    #[error("key pair {name}: {source}")]
    Provider {
        /// Key pair name.
        name: String,
        /// Underlying provider error.
        #[source]
        source: ProviderError,
    },
    /// Creation failed and the existing key pair could not be confirmed.
    #[error("key pair {name}: {source}")]
    Ensure {
        /// Key pair name.
        name: String,
        /// Create and lookup failures.
        #[source]
        source: EnsureError,
    },
    /// The creation response carried no private key.
    #[error("provider returned no private key material for {name}")]
    MissingMaterial {
        /// Key pair name.
        name: String,
    },
    /// Writing the private key to disk failed.
    #[error("failed to save private key for {name}: {message}")]
    Persist {
        /// Key pair name.
        name: String,
        /// Underlying I/O error message.
        message: String,
    },
}

impl KeyPairError {
    /// Returns `true` for failures of the local machine rather than the
    /// provider.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Persist { .. })
    }
}

/// Ensures key pairs exist and captures their material.
#[derive(Clone, Debug)]
pub struct CredentialProvisioner {
    store: KeyMaterialStore,
}

impl CredentialProvisioner {
    /// Creates a provisioner persisting material into `store`.
    #[must_use]
    pub const fn new(store: KeyMaterialStore) -> Self {
        Self { store }
    }

    /// Ensures the key pair `name` exists under `policy`.
    ///
    /// Returns the persisted key when this call created the key pair, or
    /// `None` when an existing one was reused.
    ///
    /// # Errors
    ///
    /// Returns [`KeyPairError`] when the provider refuses, no material comes
    /// back from a creation, or the material cannot be written.
    pub async fn ensure<P: ControlPlane + ?Sized>(
        &self,
        plane: &P,
        name: &str,
        policy: KeyPairPolicy,
    ) -> Result<Option<PersistedKey>, KeyPairError> {
        let created = match policy {
            KeyPairPolicy::CreateIfAbsent => {
                let ensured = ensure_resource(
                    || plane.create_key_pair(name),
                    || plane.describe_key_pair(name),
                    ProviderError::is_conflict,
                )
                .await
                .map_err(|source| KeyPairError::Ensure {
                    name: name.to_owned(),
                    source,
                })?;
                match ensured {
                    Ensured::Created(key) => key,
                    Ensured::Existing(_) => {
                        info!(
                            region = %plane.region(),
                            key_name = name,
                            "reusing existing key pair"
                        );
                        return Ok(None);
                    }
                }
            }
            KeyPairPolicy::ResetAndRecreate => {
                delete_if_present(plane, name).await?;
                plane
                    .create_key_pair(name)
                    .await
                    .map_err(|source| KeyPairError::Provider {
                        name: name.to_owned(),
                        source,
                    })?
            }
        };
        self.persist(plane, created).map(Some)
    }

    fn persist<P: ControlPlane + ?Sized>(
        &self,
        plane: &P,
        key: AccessKeyPair,
    ) -> Result<PersistedKey, KeyPairError> {
        let AccessKeyPair {
            name,
            private_key_material,
        } = key;
        let Some(material) = private_key_material else {
            return Err(KeyPairError::MissingMaterial { name });
        };
        let path = self
            .store
            .persist(&name, &material)
            .map_err(|message| KeyPairError::Persist {
                name: name.clone(),
                message,
            })?;
        info!(region = %plane.region(), key_name = %name, path = %path, "saved private key");
        Ok(PersistedKey { name, path })
    }
}

async fn delete_if_present<P: ControlPlane + ?Sized>(
    plane: &P,
    name: &str,
) -> Result<(), KeyPairError> {
    match plane.delete_key_pair(name).await {
        Ok(()) => {
            info!(region = %plane.region(), key_name = name, "deleted previous key pair");
            Ok(())
        }
        Err(err) if err.is_not_found() => {
            warn!(key_name = name, error = %err, "no previous key pair to delete");
            Ok(())
        }
        Err(source) => Err(KeyPairError::Provider {
            name: name.to_owned(),
            source,
        }),
    }
}
