//! Cross-check the metadata store against the blob directory.

use fvault_core::VaultResult;
use fvault_store::{MetadataRecord, RecordStore};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::Vault;

/// Result of [`Vault::check`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Number of live records inspected
    pub records: usize,
    /// Records whose ciphertext blob no longer exists
    pub missing_blobs: Vec<MetadataRecord>,
    /// Files in the blob directory carrying the ciphertext suffix that no
    /// record refers to
    pub orphaned_blobs: Vec<PathBuf>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.missing_blobs.is_empty() && self.orphaned_blobs.is_empty()
    }
}

impl<S: RecordStore> Vault<S> {
    /// Report records without blobs and blobs without records. Read-only.
    pub fn check(&self) -> VaultResult<ConsistencyReport> {
        let records = self.store.records()?;
        let mut report = ConsistencyReport {
            records: records.len(),
            ..Default::default()
        };

        // Blobs are matched the same way decrypt matches them: by path or by
        // file name.
        let mut referenced_paths = HashSet::new();
        let mut referenced_names = HashSet::new();
        for record in &records {
            if !record.ciphertext_ref.is_file() {
                warn!(
                    source = %record.filename,
                    blob = %record.ciphertext_ref.display(),
                    "record refers to a missing blob"
                );
                report.missing_blobs.push(record.clone());
            }
            referenced_paths.insert(
                fs::canonicalize(&record.ciphertext_ref)
                    .unwrap_or_else(|_| record.ciphertext_ref.clone()),
            );
            if let Some(name) = record.ciphertext_ref.file_name() {
                referenced_names.insert(name.to_os_string());
            }
        }

        let entries = match fs::read_dir(&self.storage.encrypted_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(report);
            }
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let path = entry?.path();
            let is_blob = path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.ends_with(&self.storage.ciphertext_suffix));
            if !is_blob {
                continue;
            }
            let canonical = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
            let named = path
                .file_name()
                .is_some_and(|name| referenced_names.contains(name));
            if !referenced_paths.contains(&canonical) && !named {
                warn!(blob = %path.display(), "blob has no metadata record");
                report.orphaned_blobs.push(path);
            }
        }
        report.orphaned_blobs.sort();

        info!(
            records = report.records,
            missing_blobs = report.missing_blobs.len(),
            orphaned_blobs = report.orphaned_blobs.len(),
            "consistency check finished"
        );
        Ok(report)
    }
}
