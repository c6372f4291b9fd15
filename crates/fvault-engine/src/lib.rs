//! fvault-engine: the encrypt and decrypt workflows
//!
//! A [`Vault`] ties the key derivation and AEAD primitives from
//! `fvault-crypto` to the files on disk:
//!
//! ```text
//! encrypt(source)   → <encrypted_dir>/<name><suffix>   + one metadata record
//! decrypt(blob)     → <decrypted_dir>/<name>            − blob − record
//! ```
//!
//! Each operation is a single unit of work. A failure after the ciphertext
//! blob was written is logged with `partial_failure = true` and surfaced to
//! the caller; [`Vault::check`] reports whatever inconsistency remains.

pub mod check;
pub mod decrypt;
pub mod encrypt;
mod fsutil;

pub use check::ConsistencyReport;

use fvault_core::config::{CryptoConfig, StorageConfig, VaultConfig};
use fvault_core::{KdfParams, VaultResult};
use fvault_store::{CsvStore, MetadataRecord, RecordStore};
use tracing::debug;

/// Encrypted-file vault over a metadata store.
#[derive(Debug)]
pub struct Vault<S = CsvStore> {
    storage: StorageConfig,
    crypto: CryptoConfig,
    kdf_params: KdfParams,
    store: S,
}

impl Vault<CsvStore> {
    /// Open the vault described by `config`, creating the metadata store if
    /// it does not exist yet.
    pub fn open(config: &VaultConfig) -> VaultResult<Self> {
        let store = CsvStore::new(&config.storage.store_file);
        Self::with_store(config.storage.clone(), config.crypto.clone(), store)
    }
}

impl<S: RecordStore> Vault<S> {
    /// Build a vault over any [`RecordStore`].
    ///
    /// Fails with `InvalidParameter` if the configured KDF costs are unusable.
    pub fn with_store(storage: StorageConfig, crypto: CryptoConfig, store: S) -> VaultResult<Self> {
        let kdf_params = crypto.kdf_params()?;
        store.ensure_initialized()?;
        debug!(
            store = %storage.store_file.display(),
            kdf = %kdf_params.algorithm,
            aead = %crypto.aead,
            "vault opened"
        );
        Ok(Self {
            storage,
            crypto,
            kdf_params,
            store,
        })
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn crypto(&self) -> &CryptoConfig {
        &self.crypto
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Every live record, in insertion order.
    pub fn list(&self) -> VaultResult<Vec<MetadataRecord>> {
        self.store.records()
    }
}
