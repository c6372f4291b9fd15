use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::VaultError;

/// Largest KDF working set accepted from config or a store row (2 GiB)
pub const MAX_KDF_MEMORY_BYTES: u64 = 2 << 30;

/// Largest scrypt `p` / Argon2id lane count accepted
pub const MAX_KDF_PARALLELISM: u32 = 64;

/// Largest Argon2id iteration count accepted
pub const MAX_ARGON2_ITERATIONS: u32 = 256;

/// Password-based key derivation algorithm recorded with every encrypted file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KdfAlgorithm {
    /// scrypt: n = CPU/memory cost (power of two), r = block size, p = parallelism
    #[serde(rename = "scrypt")]
    Scrypt,
    /// Argon2id: n = memory cost in KiB, r = iterations, p = lanes
    #[serde(rename = "argon2id")]
    Argon2id,
}

impl KdfAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            KdfAlgorithm::Scrypt => "scrypt",
            KdfAlgorithm::Argon2id => "argon2id",
        }
    }
}

impl fmt::Display for KdfAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KdfAlgorithm {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scrypt" => Ok(KdfAlgorithm::Scrypt),
            "argon2id" => Ok(KdfAlgorithm::Argon2id),
            other => Err(VaultError::InvalidParameter(format!(
                "unknown KDF algorithm: {other}"
            ))),
        }
    }
}

/// Authenticated encryption algorithm recorded with every encrypted file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AeadAlgorithm {
    /// AES-256-GCM with a 96-bit nonce
    #[serde(rename = "AES-256-GCM")]
    Aes256Gcm,
    /// AES-128-GCM with a 128-bit nonce, as written by the earlier Python tool
    #[serde(rename = "AES-GCM")]
    Aes128GcmLegacy,
    /// XChaCha20-Poly1305 with a 192-bit nonce
    #[serde(rename = "XChaCha20-Poly1305")]
    XChaCha20Poly1305,
}

impl AeadAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            AeadAlgorithm::Aes256Gcm => "AES-256-GCM",
            AeadAlgorithm::Aes128GcmLegacy => "AES-GCM",
            AeadAlgorithm::XChaCha20Poly1305 => "XChaCha20-Poly1305",
        }
    }

    /// Symmetric key size in bytes; this is the KDF output length.
    pub fn key_len(&self) -> usize {
        match self {
            AeadAlgorithm::Aes256Gcm => 32,
            AeadAlgorithm::Aes128GcmLegacy => 16,
            AeadAlgorithm::XChaCha20Poly1305 => 32,
        }
    }

    pub fn nonce_len(&self) -> usize {
        match self {
            AeadAlgorithm::Aes256Gcm => 12,
            AeadAlgorithm::Aes128GcmLegacy => 16,
            AeadAlgorithm::XChaCha20Poly1305 => 24,
        }
    }

    pub fn tag_len(&self) -> usize {
        16
    }
}

impl fmt::Display for AeadAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AeadAlgorithm {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AES-256-GCM" => Ok(AeadAlgorithm::Aes256Gcm),
            "AES-GCM" => Ok(AeadAlgorithm::Aes128GcmLegacy),
            "XChaCha20-Poly1305" => Ok(AeadAlgorithm::XChaCha20Poly1305),
            other => Err(VaultError::InvalidParameter(format!(
                "unknown AEAD algorithm: {other}"
            ))),
        }
    }
}

/// KDF algorithm plus its three cost parameters.
///
/// The meaning of `n`, `r` and `p` depends on the algorithm (see
/// [`KdfAlgorithm`]). The same four values are persisted per record so a file
/// is always decrypted with the costs it was encrypted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub algorithm: KdfAlgorithm,
    pub n: u32,
    pub r: u32,
    pub p: u32,
}

impl KdfParams {
    pub fn scrypt(n: u32, r: u32, p: u32) -> Self {
        Self {
            algorithm: KdfAlgorithm::Scrypt,
            n,
            r,
            p,
        }
    }

    pub fn argon2id(mem_cost_kib: u32, time_cost: u32, parallelism: u32) -> Self {
        Self {
            algorithm: KdfAlgorithm::Argon2id,
            n: mem_cost_kib,
            r: time_cost,
            p: parallelism,
        }
    }

    /// Bytes of working memory the KDF will allocate, or `None` on overflow.
    pub fn memory_bytes(&self) -> Option<u64> {
        let (n, r, p) = (u64::from(self.n), u64::from(self.r), u64::from(self.p));
        match self.algorithm {
            // V = 128 * r * n, plus B and XY scratch of 128 * r * p and 256 * r
            KdfAlgorithm::Scrypt => {
                let v = 128u64.checked_mul(r)?.checked_mul(n)?;
                let b = 128u64.checked_mul(r)?.checked_mul(p)?;
                v.checked_add(b)?.checked_add(256u64.checked_mul(r)?)
            }
            KdfAlgorithm::Argon2id => n.checked_mul(1024),
        }
    }

    /// Reject costs that are invalid for the algorithm or exceed
    /// [`MAX_KDF_MEMORY_BYTES`], [`MAX_KDF_PARALLELISM`] or
    /// [`MAX_ARGON2_ITERATIONS`].
    ///
    /// Runs before any allocation so a hostile store row or config value
    /// cannot exhaust memory.
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.n == 0 || self.r == 0 || self.p == 0 {
            return Err(VaultError::InvalidParameter(format!(
                "{} costs must be positive (n={}, r={}, p={})",
                self.algorithm, self.n, self.r, self.p
            )));
        }
        if self.algorithm == KdfAlgorithm::Scrypt && (self.n < 2 || !self.n.is_power_of_two()) {
            return Err(VaultError::InvalidParameter(format!(
                "scrypt n must be a power of two greater than 1, got {}",
                self.n
            )));
        }
        if self.p > MAX_KDF_PARALLELISM {
            return Err(VaultError::InvalidParameter(format!(
                "{} p={} exceeds the limit of {MAX_KDF_PARALLELISM}",
                self.algorithm, self.p
            )));
        }
        if self.algorithm == KdfAlgorithm::Argon2id && self.r > MAX_ARGON2_ITERATIONS {
            return Err(VaultError::InvalidParameter(format!(
                "argon2id iterations {} exceed the limit of {MAX_ARGON2_ITERATIONS}",
                self.r
            )));
        }
        match self.memory_bytes() {
            Some(bytes) if bytes <= MAX_KDF_MEMORY_BYTES => Ok(()),
            _ => Err(VaultError::InvalidParameter(format!(
                "{} costs (n={}, r={}, p={}) need more than {} MiB of memory",
                self.algorithm,
                self.n,
                self.r,
                self.p,
                MAX_KDF_MEMORY_BYTES >> 20
            ))),
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::scrypt(65536, 8, 1)
    }
}
