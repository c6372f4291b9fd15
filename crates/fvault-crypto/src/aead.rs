//! Whole-file authenticated encryption with a detached nonce and tag
//!
//! ```text
//! encrypt(alg, key, plaintext) → { nonce, ciphertext, tag }
//!   len(ciphertext) == len(plaintext), len(tag) == 16, no associated data
//! ```
//!
//! The nonce is drawn from the thread-local CSPRNG on every call. Tag
//! verification happens inside the AEAD implementations (constant time)
//! and no plaintext is released unless it succeeds.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::typenum::Unsigned;
use aes_gcm::aead::{AeadInPlace, KeyInit, Nonce, Tag};
use aes_gcm::aes::Aes128;
use aes_gcm::{Aes256Gcm, AesGcm};
use chacha20poly1305::XChaCha20Poly1305;
use fvault_core::{AeadAlgorithm, VaultError, VaultResult};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::kdf::DerivedKey;

/// AES-128-GCM with the 16-byte nonce produced by the earlier Python tool.
type Aes128GcmLegacy = AesGcm<Aes128, U16>;

/// Output of [`encrypt`]: everything except the key needed to reverse it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub tag: Vec<u8>,
}

/// Encrypt `plaintext` under `key` with a fresh random nonce.
pub fn encrypt(alg: AeadAlgorithm, key: &DerivedKey, plaintext: &[u8]) -> VaultResult<Sealed> {
    match alg {
        AeadAlgorithm::Aes256Gcm => seal::<Aes256Gcm>(alg, key, plaintext),
        AeadAlgorithm::Aes128GcmLegacy => seal::<Aes128GcmLegacy>(alg, key, plaintext),
        AeadAlgorithm::XChaCha20Poly1305 => seal::<XChaCha20Poly1305>(alg, key, plaintext),
    }
}

/// Verify `tag` and decrypt `ciphertext`.
///
/// Returns [`VaultError::AuthenticationFailure`] for a wrong key, a modified
/// ciphertext/nonce/tag, or a nonce/tag of the wrong length.
pub fn decrypt(
    alg: AeadAlgorithm,
    key: &DerivedKey,
    nonce: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> VaultResult<Zeroizing<Vec<u8>>> {
    match alg {
        AeadAlgorithm::Aes256Gcm => open::<Aes256Gcm>(alg, key, nonce, ciphertext, tag),
        AeadAlgorithm::Aes128GcmLegacy => {
            open::<Aes128GcmLegacy>(alg, key, nonce, ciphertext, tag)
        }
        AeadAlgorithm::XChaCha20Poly1305 => {
            open::<XChaCha20Poly1305>(alg, key, nonce, ciphertext, tag)
        }
    }
}

fn cipher_for<C: KeyInit>(alg: AeadAlgorithm, key: &DerivedKey) -> VaultResult<C> {
    C::new_from_slice(key.as_bytes()).map_err(|_| {
        VaultError::InvalidParameter(format!(
            "{alg} requires a {}-byte key, got {} bytes",
            alg.key_len(),
            key.len()
        ))
    })
}

fn seal<C>(alg: AeadAlgorithm, key: &DerivedKey, plaintext: &[u8]) -> VaultResult<Sealed>
where
    C: AeadInPlace + KeyInit,
{
    let cipher = cipher_for::<C>(alg, key)?;

    let mut nonce = Nonce::<C>::default();
    rand::thread_rng().fill_bytes(&mut nonce);

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(&nonce, &[], &mut buffer)
        .map_err(|e| VaultError::InvalidParameter(format!("{alg} encryption failed: {e}")))?;

    Ok(Sealed {
        nonce: nonce.to_vec(),
        ciphertext: buffer,
        tag: tag.to_vec(),
    })
}

fn open<C>(
    alg: AeadAlgorithm,
    key: &DerivedKey,
    nonce: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> VaultResult<Zeroizing<Vec<u8>>>
where
    C: AeadInPlace + KeyInit,
{
    let cipher = cipher_for::<C>(alg, key)?;

    if nonce.len() != <C::NonceSize as Unsigned>::USIZE
        || tag.len() != <C::TagSize as Unsigned>::USIZE
    {
        tracing::debug!(
            aead = %alg,
            nonce_len = nonce.len(),
            tag_len = tag.len(),
            "nonce or tag has the wrong length"
        );
        return Err(VaultError::AuthenticationFailure);
    }

    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    cipher
        .decrypt_in_place_detached(
            Nonce::<C>::from_slice(nonce),
            &[],
            &mut buffer,
            Tag::<C>::from_slice(tag),
        )
        .map_err(|_| VaultError::AuthenticationFailure)?;

    Ok(buffer)
}
