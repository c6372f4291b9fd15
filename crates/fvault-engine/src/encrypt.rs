//! Encrypt a source file into a ciphertext blob plus one metadata record.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use fvault_core::{VaultError, VaultResult};
use fvault_crypto::{aead, derive_key, generate_salt};
use fvault_store::{MetadataRecord, RecordStore};
use secrecy::SecretString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use zeroize::Zeroizing;

use crate::{fsutil, Vault};

impl<S: RecordStore> Vault<S> {
    /// Encrypt `source` under `password`.
    ///
    /// Writes `<encrypted_dir>/<basename><suffix>` and appends a record keyed
    /// by the canonical path of `source`. The source file is left in place.
    /// Returns the path of the new blob. Paths that are not valid UTF-8 are
    /// rejected with `InvalidParameter`.
    pub fn encrypt(&self, source: &Path, password: &SecretString) -> VaultResult<PathBuf> {
        if !source.is_file() {
            return Err(VaultError::SourceNotFound(source.to_path_buf()));
        }
        let canonical = fs::canonicalize(source)?;
        // Identities round-trip through the text store, so they must be UTF-8
        let identity = canonical
            .to_str()
            .ok_or_else(|| {
                VaultError::InvalidParameter(format!(
                    "source path is not valid UTF-8: {}",
                    canonical.display()
                ))
            })?
            .to_owned();

        if self.store.find_by_identity(&identity)?.is_some() {
            return Err(VaultError::DuplicateEntry(identity));
        }

        let Some(name) = canonical.file_name() else {
            return Err(VaultError::SourceNotFound(source.to_path_buf()));
        };
        let mut blob_name = name.to_os_string();
        blob_name.push(&self.storage.ciphertext_suffix);
        let blob_path = fsutil::prepare_dir(&self.storage.encrypted_dir)?.join(blob_name);
        if blob_path.exists() {
            return Err(VaultError::BlobExists(blob_path));
        }

        let plaintext = Zeroizing::new(fs::read(&canonical)?);
        let salt = generate_salt();
        let key = derive_key(password, &salt, &self.kdf_params, self.crypto.aead.key_len())?;
        let sealed = aead::encrypt(self.crypto.aead, &key, &plaintext)?;

        let encoded = STANDARD.encode(&sealed.ciphertext);
        fsutil::write_new(&blob_path, encoded.as_bytes()).map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => VaultError::BlobExists(blob_path.clone()),
            _ => VaultError::Io(e),
        })?;

        let record = MetadataRecord {
            kdf: self.kdf_params.algorithm,
            n: self.kdf_params.n,
            r: self.kdf_params.r,
            p: self.kdf_params.p,
            salt: salt.to_vec(),
            aead: self.crypto.aead,
            nonce: sealed.nonce,
            ciphertext_ref: blob_path.clone(),
            tag: sealed.tag,
            filename: identity.clone(),
        };

        if let Err(e) = self.store.append(&record) {
            error!(
                source = %identity,
                blob = %blob_path.display(),
                partial_failure = true,
                "metadata append failed after ciphertext was written: {e}"
            );
            match fs::remove_file(&blob_path) {
                Ok(()) => warn!(blob = %blob_path.display(), "removed unreferenced ciphertext blob"),
                Err(rm) => error!(
                    blob = %blob_path.display(),
                    partial_failure = true,
                    "could not remove unreferenced ciphertext blob: {rm}"
                ),
            }
            return Err(e);
        }

        info!(
            source = %identity,
            blob = %blob_path.display(),
            kdf = %record.kdf,
            aead = %record.aead,
            bytes = plaintext.len(),
            "encrypted"
        );
        Ok(blob_path)
    }
}
