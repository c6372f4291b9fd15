use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{VaultError, VaultResult};
use crate::types::{AeadAlgorithm, KdfAlgorithm, KdfParams};

/// Top-level configuration (loaded from fvault.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub storage: StorageConfig,
    pub crypto: CryptoConfig,
    pub logging: LoggingConfig,
}

impl VaultConfig {
    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: &Path) -> VaultResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| VaultError::Config(format!("reading {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| VaultError::Config(format!("parsing {}: {e}", path.display())))
    }
}

/// Where the metadata store, ciphertext blobs and restored plaintext live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Metadata store file (default: authenticate.csv)
    pub store_file: PathBuf,
    /// Directory receiving ciphertext blobs (default: encrypted)
    pub encrypted_dir: PathBuf,
    /// Directory receiving restored plaintext (default: decrypted)
    pub decrypted_dir: PathBuf,
    /// Appended to the source base name to form the blob name
    pub ciphertext_suffix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_file: PathBuf::from("authenticate.csv"),
            encrypted_dir: PathBuf::from("encrypted"),
            decrypted_dir: PathBuf::from("decrypted"),
            ciphertext_suffix: "_encrypted.enc".into(),
        }
    }
}

impl StorageConfig {
    /// Resolve every relative path against `base`.
    pub fn rooted_at(&self, base: &Path) -> Self {
        Self {
            store_file: base.join(&self.store_file),
            encrypted_dir: base.join(&self.encrypted_dir),
            decrypted_dir: base.join(&self.decrypted_dir),
            ciphertext_suffix: self.ciphertext_suffix.clone(),
        }
    }
}

/// Algorithms and costs applied to new encryptions.
///
/// Existing records keep the values they were written with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Key derivation algorithm (default: scrypt)
    pub kdf: KdfAlgorithm,
    /// scrypt N or Argon2id memory cost in KiB (default: 65536)
    pub kdf_cost_n: u32,
    /// scrypt r or Argon2id iterations (default: 8)
    pub kdf_cost_r: u32,
    /// scrypt p or Argon2id lanes (default: 1)
    pub kdf_cost_p: u32,
    /// Authenticated encryption algorithm (default: AES-256-GCM)
    pub aead: AeadAlgorithm,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            kdf: KdfAlgorithm::Scrypt,
            kdf_cost_n: 65536,
            kdf_cost_r: 8,
            kdf_cost_p: 1,
            aead: AeadAlgorithm::Aes256Gcm,
        }
    }
}

impl CryptoConfig {
    /// Validated KDF parameters for new encryptions.
    pub fn kdf_params(&self) -> VaultResult<KdfParams> {
        let params = KdfParams {
            algorithm: self.kdf,
            n: self.kdf_cost_n,
            r: self.kdf_cost_r,
            p: self.kdf_cost_p,
        };
        params.validate()?;
        Ok(params)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (default: info); RUST_LOG takes precedence
    pub level: String,
    /// Log format: "json" or "text"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Text,
        }
    }
}
