//! Durable metadata store.
//!
//! `RecordStore` is the repository interface the engine talks to; `CsvStore`
//! keeps one row per encrypted file in a text table. Every call is a complete
//! unit of work against the file on disk: nothing is cached between calls.
//!
//! Deletes never modify the live file in place. The surviving rows are written
//! to a sibling staging file, fsynced, and renamed over the original, so an
//! interrupted rewrite leaves either the old store or the new one.

use fvault_core::{VaultError, VaultResult};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::record::{self, MetadataRecord, HEADER};
use crate::table;

/// Repository interface over the metadata store.
pub trait RecordStore {
    /// Create the store with its header row if it does not exist yet.
    /// Never truncates an existing store.
    fn ensure_initialized(&self) -> VaultResult<()>;

    /// All live records, in insertion order.
    fn records(&self) -> VaultResult<Vec<MetadataRecord>>;

    /// Append one record. Uniqueness of `filename` is the caller's job.
    fn append(&self, record: &MetadataRecord) -> VaultResult<()>;

    /// Remove every record whose `filename` equals `identity`, returning how
    /// many were removed. Removing an unknown identity is a no-op.
    fn remove_by_identity(&self, identity: &str) -> VaultResult<usize>;

    /// Look up the record for a source identity. If duplicates exist the
    /// last one wins.
    fn find_by_identity(&self, identity: &str) -> VaultResult<Option<MetadataRecord>> {
        Ok(self
            .records()?
            .into_iter()
            .rev()
            .find(|record| record.filename == identity))
    }

    /// Look up the record owning a ciphertext blob: an exact path match
    /// first, otherwise the first record whose blob has the same file name.
    fn find_by_ciphertext_ref(&self, ciphertext: &Path) -> VaultResult<Option<MetadataRecord>> {
        let records = self.records()?;
        let wanted = path_key(ciphertext);

        if let Some(record) = records
            .iter()
            .find(|record| path_key(&record.ciphertext_ref) == wanted)
        {
            return Ok(Some(record.clone()));
        }

        let Some(name) = ciphertext.file_name() else {
            return Ok(None);
        };
        Ok(records
            .into_iter()
            .find(|record| record.ciphertext_ref.file_name() == Some(name)))
    }
}

/// Moves the staged store over the live one.
type ReplaceFn = fn(staged: &Path, live: &Path) -> std::io::Result<()>;

/// Metadata store persisted as a comma-separated text file
#[derive(Clone)]
pub struct CsvStore {
    path: PathBuf,
    replace: ReplaceFn,
}

impl std::fmt::Debug for CsvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvStore").field("path", &self.path).finish()
    }
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            replace: |staged, live| fs::rename(staged, live),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file the store is rewritten into before the atomic rename.
    pub fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn header_line() -> String {
        format!("{}\n", table::encode_row(&HEADER))
    }

    /// Read and parse the store. A missing store has no records.
    fn load(&self) -> VaultResult<Vec<MetadataRecord>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut rows = table::parse(&content)
            .map_err(|reason| VaultError::malformed(&self.path, reason))?
            .into_iter();

        match rows.next() {
            Some(header) if record::is_header(&header) => {}
            Some(header) => {
                return Err(VaultError::malformed(
                    &self.path,
                    format!("unexpected header: {}", header.join(",")),
                ))
            }
            None => return Err(VaultError::malformed(&self.path, "missing header row")),
        }

        rows.enumerate()
            .map(|(i, fields)| {
                MetadataRecord::from_fields(&fields).map_err(|reason| {
                    VaultError::malformed(&self.path, format!("record {}: {reason}", i + 1))
                })
            })
            .collect()
    }

    /// Write header plus `records` to the staging file and fsync it.
    fn write_staged(&self, staged: &Path, records: &[MetadataRecord]) -> std::io::Result<()> {
        let mut file = File::create(staged)?;
        file.write_all(Self::header_line().as_bytes())?;
        for record in records {
            let line = table::encode_row(&record.to_fields());
            file.write_all(line.as_bytes())?;
            file.write_all(b"\n")?;
        }
        file.sync_all()
    }
}

impl RecordStore for CsvStore {
    fn ensure_initialized(&self) -> VaultResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        match OpenOptions::new().write(true).create_new(true).open(&self.path) {
            Ok(mut file) => {
                file.write_all(Self::header_line().as_bytes())?;
                file.sync_all()?;
                info!(store = %self.path.display(), "created metadata store");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                // A zero-length store can only come from a crash between
                // create and the header write; there is nothing to lose.
                if fs::metadata(&self.path)?.len() == 0 {
                    let mut file = OpenOptions::new().append(true).open(&self.path)?;
                    file.write_all(Self::header_line().as_bytes())?;
                    file.sync_all()?;
                    info!(store = %self.path.display(), "wrote header to empty metadata store");
                }
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn records(&self) -> VaultResult<Vec<MetadataRecord>> {
        self.load()
    }

    fn append(&self, record: &MetadataRecord) -> VaultResult<()> {
        self.ensure_initialized()?;

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&self.path)?;

        // Start on a fresh line if the file was left without a terminator
        let mut line = String::new();
        if file.seek(SeekFrom::End(-1)).is_ok() {
            let mut last = [0u8; 1];
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                line.push('\n');
            }
        }
        line.push_str(&table::encode_row(&record.to_fields()));
        line.push('\n');

        file.write_all(line.as_bytes())?;
        file.sync_all()?;

        debug!(
            store = %self.path.display(),
            filename = %record.filename,
            "appended metadata record"
        );
        Ok(())
    }

    fn remove_by_identity(&self, identity: &str) -> VaultResult<usize> {
        if !self.path.exists() {
            return Ok(0);
        }

        let records = self.load()?;
        let total = records.len();
        let kept: Vec<MetadataRecord> = records
            .into_iter()
            .filter(|record| record.filename != identity)
            .collect();
        let removed = total - kept.len();

        if removed == 0 {
            debug!(store = %self.path.display(), identity, "no record to remove");
            return Ok(0);
        }

        let staged = self.staging_path();
        if let Err(e) = self.write_staged(&staged, &kept) {
            // The live store has not been touched
            let _ = fs::remove_file(&staged);
            return Err(e.into());
        }

        if let Err(source) = (self.replace)(&staged, &self.path) {
            error!(
                store = %self.path.display(),
                staged = %staged.display(),
                error = %source,
                partial_failure = true,
                "failed to replace metadata store; staged copy kept for recovery"
            );
            return Err(VaultError::StoreCorruptionRisk {
                path: self.path.clone(),
                staged,
                source,
            });
        }

        sync_parent_dir(&self.path);
        info!(store = %self.path.display(), identity, removed, "removed metadata record");
        Ok(removed)
    }
}

/// Persist the rename itself. Best effort: not every platform allows
/// opening a directory for fsync.
fn sync_parent_dir(path: &Path) {
    #[cfg(unix)]
    {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
                debug!(dir = %parent.display(), "directory fsync failed: {e}");
            }
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}

/// Normalized key for comparing paths that may or may not exist
fn path_key(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
