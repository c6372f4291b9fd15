//! Key derivation: password + salt → symmetric key (scrypt or Argon2id)

use argon2::{Algorithm, Argon2, Params, Version};
use fvault_core::{KdfAlgorithm, KdfParams, VaultError, VaultResult};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

use crate::SALT_SIZE;

/// A password-derived symmetric key.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct DerivedKey {
    bytes: Zeroizing<Vec<u8>>,
}

impl DerivedKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("len", &self.bytes.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a fresh random salt from the thread-local CSPRNG.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Derive an `output_len`-byte key from a password and salt.
///
/// Deterministic for identical inputs. Blocks for the full cost of the KDF.
pub fn derive_key(
    password: &SecretString,
    salt: &[u8],
    params: &KdfParams,
    output_len: usize,
) -> VaultResult<DerivedKey> {
    params.validate()?;
    if output_len == 0 {
        return Err(VaultError::InvalidParameter(
            "KDF output length must be positive".into(),
        ));
    }

    let password = password.expose_secret().as_bytes();
    let mut key = Zeroizing::new(vec![0u8; output_len]);

    match params.algorithm {
        KdfAlgorithm::Scrypt => {
            let log_n = params.n.trailing_zeros() as u8;
            let scrypt_params = scrypt::Params::new(log_n, params.r, params.p, output_len)
                .map_err(|e| VaultError::InvalidParameter(format!("invalid scrypt params: {e}")))?;
            scrypt::scrypt(password, salt, &scrypt_params, &mut key)
                .map_err(|e| VaultError::InvalidParameter(format!("scrypt KDF failed: {e}")))?;
        }
        KdfAlgorithm::Argon2id => {
            let argon2_params = Params::new(params.n, params.r, params.p, Some(output_len))
                .map_err(|e| {
                    VaultError::InvalidParameter(format!("invalid Argon2id params: {e}"))
                })?;
            Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params)
                .hash_password_into(password, salt, &mut key)
                .map_err(|e| VaultError::InvalidParameter(format!("Argon2id KDF failed: {e}")))?;
        }
    }

    tracing::trace!(
        kdf = %params.algorithm,
        n = params.n,
        r = params.r,
        p = params.p,
        output_len,
        "derived key"
    );

    Ok(DerivedKey { bytes: key })
}
