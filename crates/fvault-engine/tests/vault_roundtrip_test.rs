//! End-to-end encrypt/decrypt workflows against a real on-disk vault.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use fvault_core::config::{CryptoConfig, StorageConfig, VaultConfig};
use fvault_core::{AeadAlgorithm, KdfAlgorithm, VaultError};
use fvault_engine::Vault;
use fvault_store::{CsvStore, RecordStore};
use secrecy::SecretString;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

fn fast_crypto(kdf: KdfAlgorithm, aead: AeadAlgorithm) -> CryptoConfig {
    let (n, r, p) = match kdf {
        KdfAlgorithm::Scrypt => (16, 1, 1),
        KdfAlgorithm::Argon2id => (1024, 1, 1),
    };
    CryptoConfig {
        kdf,
        kdf_cost_n: n,
        kdf_cost_r: r,
        kdf_cost_p: p,
        aead,
    }
}

fn open_vault(root: &Path, crypto: CryptoConfig) -> Vault {
    let config = VaultConfig {
        storage: StorageConfig::default().rooted_at(root),
        crypto,
        ..Default::default()
    };
    Vault::open(&config).unwrap()
}

fn default_vault(root: &Path) -> Vault {
    open_vault(root, fast_crypto(KdfAlgorithm::Scrypt, AeadAlgorithm::Aes256Gcm))
}

fn write_source(root: &Path, rel: &str, contents: &[u8]) -> PathBuf {
    let path = root.join("src").join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, contents).unwrap();
    path
}

fn password(s: &str) -> SecretString {
    SecretString::from(s)
}

#[test]
fn test_hello_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let vault = default_vault(dir.path());
    let source = write_source(dir.path(), "hello.txt", b"0123456789");
    let pw = password("correct horse");

    let blob = vault.encrypt(&source, &pw).unwrap();
    let encrypted_dir = fs::canonicalize(dir.path().join("encrypted")).unwrap();
    assert_eq!(blob, encrypted_dir.join("hello.txt_encrypted.enc"));
    assert!(blob.is_file());
    // Source is left in place
    assert!(source.is_file());

    let records = vault.list().unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(
        record.filename,
        fs::canonicalize(&source).unwrap().to_string_lossy()
    );
    assert_eq!(record.kdf, KdfAlgorithm::Scrypt);
    assert_eq!((record.n, record.r, record.p), (16, 1, 1));
    assert_eq!(record.aead, AeadAlgorithm::Aes256Gcm);
    assert_eq!(record.salt.len(), 16);
    assert_eq!(record.nonce.len(), 12);
    assert_eq!(record.tag.len(), 16);
    assert_eq!(record.ciphertext_ref, blob);

    // Blob is base64 of exactly as many bytes as the plaintext
    let ciphertext = STANDARD.decode(fs::read_to_string(&blob).unwrap()).unwrap();
    assert_eq!(ciphertext.len(), 10);
    assert_ne!(ciphertext, b"0123456789");

    let output = vault.decrypt(&blob, &pw).unwrap();
    let decrypted_dir = fs::canonicalize(dir.path().join("decrypted")).unwrap();
    assert_eq!(output, decrypted_dir.join("hello.txt"));
    assert_eq!(fs::read(&output).unwrap(), b"0123456789");
    assert!(!blob.exists());
    assert!(vault.list().unwrap().is_empty());

    // Store keeps its header after the last record is removed
    let store = fs::read_to_string(dir.path().join("authenticate.csv")).unwrap();
    assert_eq!(store, "kdf,n,r,p,salt,aead,nonce,ciphertext_enc,tag,filename\n");

    let err = vault.decrypt(&blob, &pw).unwrap_err();
    assert!(matches!(err, VaultError::CiphertextNotFound(_)));
}

#[test]
fn test_wrong_password_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let vault = default_vault(dir.path());
    let source = write_source(dir.path(), "hello.txt", b"0123456789");
    let blob = vault.encrypt(&source, &password("correct horse")).unwrap();

    let store_path = dir.path().join("authenticate.csv");
    let store_before = fs::read(&store_path).unwrap();
    let blob_before = fs::read(&blob).unwrap();

    let err = vault.decrypt(&blob, &password("wrong password")).unwrap_err();
    assert!(matches!(err, VaultError::AuthenticationFailure));

    assert_eq!(fs::read(&store_path).unwrap(), store_before);
    assert_eq!(fs::read(&blob).unwrap(), blob_before);
    assert!(!dir.path().join("decrypted/hello.txt").exists());

    // The right password still works afterwards
    vault.decrypt(&blob, &password("correct horse")).unwrap();
}

#[test]
fn test_duplicate_source_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let vault = default_vault(dir.path());
    let source = write_source(dir.path(), "dup/notes.txt", b"notes");
    let pw = password("pw");

    vault.encrypt(&source, &pw).unwrap();

    let err = vault.encrypt(&source, &pw).unwrap_err();
    assert!(matches!(err, VaultError::DuplicateEntry(_)));

    // Same file through a different spelling of the path
    let roundabout = dir.path().join("src/dup/../dup/./notes.txt");
    let err = vault.encrypt(&roundabout, &pw).unwrap_err();
    assert!(matches!(err, VaultError::DuplicateEntry(_)));

    assert_eq!(vault.list().unwrap().len(), 1);
}

#[test]
fn test_missing_source_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let vault = default_vault(dir.path());

    let err = vault
        .encrypt(&dir.path().join("nope.txt"), &password("pw"))
        .unwrap_err();
    assert!(matches!(err, VaultError::SourceNotFound(_)));

    // Directories are not encryptable sources
    let err = vault.encrypt(dir.path(), &password("pw")).unwrap_err();
    assert!(matches!(err, VaultError::SourceNotFound(_)));
    assert!(vault.list().unwrap().is_empty());
}

#[cfg(target_os = "linux")]
#[test]
fn test_non_utf8_source_path_rejected() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempfile::tempdir().unwrap();
    let vault = default_vault(dir.path());
    let source = dir.path().join(OsStr::from_bytes(b"report-\xff.txt"));
    fs::write(&source, b"latin-1 name").unwrap();

    let err = vault.encrypt(&source, &password("pw")).unwrap_err();
    assert!(matches!(err, VaultError::InvalidParameter(_)), "{err:?}");
    assert!(vault.list().unwrap().is_empty());
    assert!(vault.check().unwrap().is_consistent());
}

#[test]
fn test_blob_without_record_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let vault = default_vault(dir.path());
    let stray = dir.path().join("stray_encrypted.enc");
    fs::write(&stray, "AAAA").unwrap();

    let err = vault.decrypt(&stray, &password("pw")).unwrap_err();
    assert!(matches!(err, VaultError::RecordNotFound(_)));
    assert!(stray.exists());
}

#[test]
fn test_same_basename_collision_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let vault = default_vault(dir.path());
    let first = write_source(dir.path(), "a/report.txt", b"first");
    let second = write_source(dir.path(), "b/report.txt", b"second");
    let pw = password("pw");

    let blob = vault.encrypt(&first, &pw).unwrap();
    let blob_before = fs::read(&blob).unwrap();
    let err = vault.encrypt(&second, &pw).unwrap_err();
    assert!(matches!(err, VaultError::BlobExists(_)));
    assert_eq!(vault.list().unwrap().len(), 1);
    assert_eq!(fs::read(&blob).unwrap(), blob_before);

    // Once the first blob is retired the name is free again
    vault.decrypt(&blob, &pw).unwrap();
    vault.encrypt(&second, &pw).unwrap();
    assert_eq!(vault.list().unwrap().len(), 1);
}

#[test]
fn test_tampered_blob_fails_authentication() {
    let dir = tempfile::tempdir().unwrap();
    let vault = default_vault(dir.path());
    let source = write_source(dir.path(), "secret.bin", &[7u8; 64]);
    let pw = password("pw");
    let blob = vault.encrypt(&source, &pw).unwrap();

    let mut ciphertext = STANDARD.decode(fs::read_to_string(&blob).unwrap()).unwrap();
    ciphertext[10] ^= 0x01;
    fs::write(&blob, STANDARD.encode(&ciphertext)).unwrap();

    let err = vault.decrypt(&blob, &pw).unwrap_err();
    assert!(matches!(err, VaultError::AuthenticationFailure));
    assert_eq!(vault.list().unwrap().len(), 1);
    assert!(blob.exists());
}

#[test]
fn test_garbled_blob_fails_authentication() {
    let dir = tempfile::tempdir().unwrap();
    let vault = default_vault(dir.path());
    let source = write_source(dir.path(), "secret.bin", b"payload");
    let blob = vault.encrypt(&source, &password("pw")).unwrap();

    fs::write(&blob, "this is not base64 !!").unwrap();
    let err = vault.decrypt(&blob, &password("pw")).unwrap_err();
    assert!(matches!(err, VaultError::AuthenticationFailure));
}

#[test]
fn test_tampered_tag_fails_authentication() {
    let dir = tempfile::tempdir().unwrap();
    let vault = default_vault(dir.path());
    let source = write_source(dir.path(), "secret.bin", b"payload");
    let pw = password("pw");
    let blob = vault.encrypt(&source, &pw).unwrap();

    let store = CsvStore::new(dir.path().join("authenticate.csv"));
    let mut record = store.records().unwrap().remove(0);
    record.tag[0] ^= 0x80;
    store.remove_by_identity(&record.filename).unwrap();
    store.append(&record).unwrap();

    let err = vault.decrypt(&blob, &pw).unwrap_err();
    assert!(matches!(err, VaultError::AuthenticationFailure));
}

#[test]
fn test_oversized_kdf_cost_in_store_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let vault = default_vault(dir.path());
    let source = write_source(dir.path(), "secret.bin", b"payload");
    let pw = password("pw");
    let blob = vault.encrypt(&source, &pw).unwrap();

    // A hand-edited row asking scrypt for a terabyte of memory
    let store = CsvStore::new(dir.path().join("authenticate.csv"));
    let mut record = store.records().unwrap().remove(0);
    record.n = 1 << 30;
    store.remove_by_identity(&record.filename).unwrap();
    store.append(&record).unwrap();

    let store_before = fs::read(store.path()).unwrap();
    let blob_before = fs::read(&blob).unwrap();

    let err = vault.decrypt(&blob, &pw).unwrap_err();
    assert!(matches!(err, VaultError::InvalidParameter(_)), "{err:?}");
    assert_eq!(fs::read(store.path()).unwrap(), store_before);
    assert_eq!(fs::read(&blob).unwrap(), blob_before);
    assert!(!dir.path().join("decrypted/secret.bin").exists());
}

#[test]
fn test_oversized_kdf_cost_in_config_rejected_at_open() {
    let dir = tempfile::tempdir().unwrap();
    let mut crypto = fast_crypto(KdfAlgorithm::Scrypt, AeadAlgorithm::Aes256Gcm);
    crypto.kdf_cost_n = 1 << 30;
    let config = VaultConfig {
        storage: StorageConfig::default().rooted_at(dir.path()),
        crypto,
        ..Default::default()
    };

    let err = Vault::open(&config).unwrap_err();
    assert!(matches!(err, VaultError::InvalidParameter(_)));
}

#[test]
fn test_trailing_newline_in_blob_tolerated() {
    let dir = tempfile::tempdir().unwrap();
    let vault = default_vault(dir.path());
    let source = write_source(dir.path(), "notes.txt", b"line one\nline two\n");
    let pw = password("pw");
    let blob = vault.encrypt(&source, &pw).unwrap();

    let mut encoded = fs::read_to_string(&blob).unwrap();
    encoded.push_str("\r\n");
    fs::write(&blob, encoded).unwrap();

    let output = vault.decrypt(&blob, &pw).unwrap();
    assert_eq!(fs::read(output).unwrap(), b"line one\nline two\n");
}

#[test]
fn test_empty_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let vault = default_vault(dir.path());
    let source = write_source(dir.path(), "empty", b"");
    let pw = password("pw");

    let blob = vault.encrypt(&source, &pw).unwrap();
    assert_eq!(fs::read_to_string(&blob).unwrap(), "");
    let output = vault.decrypt(&blob, &pw).unwrap();
    assert!(fs::read(output).unwrap().is_empty());
}

#[test]
fn test_decrypt_replaces_existing_output() {
    let dir = tempfile::tempdir().unwrap();
    let vault = default_vault(dir.path());
    let source = write_source(dir.path(), "hello.txt", b"fresh");
    let pw = password("pw");
    let blob = vault.encrypt(&source, &pw).unwrap();

    fs::create_dir_all(dir.path().join("decrypted")).unwrap();
    fs::write(dir.path().join("decrypted/hello.txt"), b"stale").unwrap();

    let output = vault.decrypt(&blob, &pw).unwrap();
    assert_eq!(fs::read(output).unwrap(), b"fresh");
}

#[test]
fn test_blob_kept_when_output_cannot_be_written() {
    let dir = tempfile::tempdir().unwrap();
    let vault = default_vault(dir.path());
    let source = write_source(dir.path(), "hello.txt", b"keep me");
    let pw = password("pw");
    let blob = vault.encrypt(&source, &pw).unwrap();

    // A directory where the restored file should go makes the final rename fail
    fs::create_dir_all(dir.path().join("decrypted/hello.txt")).unwrap();

    assert!(vault.decrypt(&blob, &pw).is_err());
    assert!(blob.is_file());
    assert_eq!(vault.list().unwrap().len(), 1);
    assert!(vault.check().unwrap().is_consistent());

    fs::remove_dir(dir.path().join("decrypted/hello.txt")).unwrap();
    let output = vault.decrypt(&blob, &pw).unwrap();
    assert_eq!(fs::read(output).unwrap(), b"keep me");
}

#[test]
fn test_every_algorithm_combination_roundtrips() {
    for kdf in [KdfAlgorithm::Scrypt, KdfAlgorithm::Argon2id] {
        for aead in [
            AeadAlgorithm::Aes256Gcm,
            AeadAlgorithm::Aes128GcmLegacy,
            AeadAlgorithm::XChaCha20Poly1305,
        ] {
            let dir = tempfile::tempdir().unwrap();
            let vault = open_vault(dir.path(), fast_crypto(kdf, aead));
            let source = write_source(dir.path(), "data.bin", b"algorithm matrix");
            let pw = password("pw");

            let blob = vault.encrypt(&source, &pw).unwrap();
            let record = vault.list().unwrap().remove(0);
            assert_eq!(record.kdf, kdf);
            assert_eq!(record.aead, aead);
            assert_eq!(record.nonce.len(), aead.nonce_len());

            let output = vault.decrypt(&blob, &pw).unwrap();
            assert_eq!(fs::read(output).unwrap(), b"algorithm matrix", "{kdf}/{aead}");
        }
    }
}

#[test]
fn test_old_records_survive_config_change() {
    let dir = tempfile::tempdir().unwrap();
    let old = open_vault(
        dir.path(),
        fast_crypto(KdfAlgorithm::Scrypt, AeadAlgorithm::Aes128GcmLegacy),
    );
    let source = write_source(dir.path(), "legacy.txt", b"written long ago");
    let pw = password("pw");
    let blob = old.encrypt(&source, &pw).unwrap();

    // New defaults apply to new encryptions only
    let mut crypto = fast_crypto(KdfAlgorithm::Argon2id, AeadAlgorithm::XChaCha20Poly1305);
    crypto.kdf_cost_n = 2048;
    let new = open_vault(dir.path(), crypto);

    let output = new.decrypt(&blob, &pw).unwrap();
    assert_eq!(fs::read(output).unwrap(), b"written long ago");
}

#[test]
fn test_blob_found_by_name_after_move() {
    let dir = tempfile::tempdir().unwrap();
    let vault = default_vault(dir.path());
    let source = write_source(dir.path(), "moved.txt", b"travels well");
    let pw = password("pw");
    let blob = vault.encrypt(&source, &pw).unwrap();

    let moved_dir = dir.path().join("usb-stick");
    fs::create_dir_all(&moved_dir).unwrap();
    let moved = moved_dir.join(blob.file_name().unwrap());
    fs::rename(&blob, &moved).unwrap();

    let output = vault.decrypt(&moved, &pw).unwrap();
    assert_eq!(fs::read(output).unwrap(), b"travels well");
    assert!(!moved.exists());
    assert!(vault.list().unwrap().is_empty());
}

#[test]
fn test_salts_and_nonces_never_repeat() {
    let dir = tempfile::tempdir().unwrap();
    let vault = default_vault(dir.path());
    let pw = password("same password for all");

    for i in 0..200 {
        let source = write_source(dir.path(), &format!("file-{i}.txt"), b"identical content");
        vault.encrypt(&source, &pw).unwrap();
    }

    let records = vault.list().unwrap();
    assert_eq!(records.len(), 200);
    let salts: HashSet<_> = records.iter().map(|r| r.salt.clone()).collect();
    let nonces: HashSet<_> = records.iter().map(|r| r.nonce.clone()).collect();
    assert_eq!(salts.len(), 200);
    assert_eq!(nonces.len(), 200);
}

#[test]
fn test_store_and_blobs_stay_in_step() {
    let dir = tempfile::tempdir().unwrap();
    let vault = default_vault(dir.path());
    let pw = password("pw");

    let mut blobs = Vec::new();
    for name in ["a.txt", "b.txt", "c.txt", "d.txt"] {
        let source = write_source(dir.path(), name, name.as_bytes());
        blobs.push(vault.encrypt(&source, &pw).unwrap());
    }
    vault.decrypt(&blobs[1], &pw).unwrap();
    let _ = vault.decrypt(&blobs[2], &password("wrong"));
    vault.decrypt(&blobs[3], &pw).unwrap();

    let report = vault.check().unwrap();
    assert!(report.is_consistent(), "{report:?}");
    assert_eq!(report.records, 2);

    let remaining: Vec<_> = vault
        .list()
        .unwrap()
        .into_iter()
        .map(|r| r.ciphertext_ref)
        .collect();
    assert_eq!(remaining, vec![blobs[0].clone(), blobs[2].clone()]);
}

#[test]
fn test_bad_kdf_config_rejected_at_open() {
    let dir = tempfile::tempdir().unwrap();
    let mut crypto = fast_crypto(KdfAlgorithm::Scrypt, AeadAlgorithm::Aes256Gcm);
    crypto.kdf_cost_n = 1000;
    let config = VaultConfig {
        storage: StorageConfig::default().rooted_at(dir.path()),
        crypto,
        ..Default::default()
    };

    let err = Vault::open(&config).unwrap_err();
    assert!(matches!(err, VaultError::InvalidParameter(_)));
}
