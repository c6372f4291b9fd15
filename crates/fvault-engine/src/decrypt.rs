//! Decrypt a ciphertext blob back to plaintext and retire its record.
//!
//! Order matters: the plaintext is durable before the blob is deleted, and
//! the blob is deleted before the record. A crash in between leaves an extra
//! blob or record behind, never lost data.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use fvault_core::{VaultError, VaultResult};
use fvault_crypto::{aead, derive_key};
use fvault_store::RecordStore;
use secrecy::SecretString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::{fsutil, Vault};

impl<S: RecordStore> Vault<S> {
    /// Decrypt the blob at `ciphertext_ref` with `password`.
    ///
    /// On success the plaintext is written to `<decrypted_dir>/<basename>`,
    /// the blob is deleted and the record removed. A wrong password or any
    /// tampering yields `AuthenticationFailure` and changes nothing on disk.
    pub fn decrypt(&self, ciphertext_ref: &Path, password: &SecretString) -> VaultResult<PathBuf> {
        if !ciphertext_ref.is_file() {
            return Err(VaultError::CiphertextNotFound(ciphertext_ref.to_path_buf()));
        }
        let record = self
            .store
            .find_by_ciphertext_ref(ciphertext_ref)?
            .ok_or_else(|| VaultError::RecordNotFound(ciphertext_ref.display().to_string()))?;

        let raw = fs::read(ciphertext_ref)?;
        let ciphertext = std::str::from_utf8(&raw)
            .ok()
            .and_then(|text| STANDARD.decode(text.trim()).ok())
            .ok_or_else(|| {
                debug!(blob = %ciphertext_ref.display(), "blob is not valid base64");
                VaultError::AuthenticationFailure
            })?;

        let key = derive_key(
            password,
            &record.salt,
            &record.kdf_params(),
            record.aead.key_len(),
        )?;
        let plaintext = aead::decrypt(record.aead, &key, &record.nonce, &ciphertext, &record.tag)
            .map_err(|e| {
                warn!(blob = %ciphertext_ref.display(), "decryption rejected: {e}");
                e
            })?;

        let name = record.original_name().ok_or_else(|| {
            VaultError::InvalidParameter(format!("record has no file name: {:?}", record.filename))
        })?;
        let output = fsutil::prepare_dir(&self.storage.decrypted_dir)?.join(name);
        if output.exists() {
            warn!(output = %output.display(), "replacing existing decrypted file");
        }
        // The restored file and its directory entry are durable before the
        // blob goes away.
        fsutil::write_replace(&output, &plaintext)?;

        if let Err(e) = fs::remove_file(ciphertext_ref) {
            error!(
                blob = %ciphertext_ref.display(),
                output = %output.display(),
                partial_failure = true,
                "plaintext restored but ciphertext blob could not be deleted: {e}"
            );
            return Err(e.into());
        }
        if let Err(e) = self.store.remove_by_identity(&record.filename) {
            error!(
                source = %record.filename,
                output = %output.display(),
                partial_failure = true,
                "plaintext restored but metadata record could not be removed: {e}"
            );
            return Err(e);
        }

        info!(
            blob = %ciphertext_ref.display(),
            output = %output.display(),
            aead = %record.aead,
            bytes = plaintext.len(),
            "decrypted"
        );
        Ok(output)
    }
}
