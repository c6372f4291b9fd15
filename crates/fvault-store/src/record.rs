//! One row of the metadata store: everything needed to reverse an encryption
//! except the password.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use fvault_core::{AeadAlgorithm, KdfAlgorithm, KdfParams};
use std::path::{Path, PathBuf};

/// Column names, in order. Frozen: changing them requires a store version bump.
pub const HEADER: [&str; 10] = [
    "kdf",
    "n",
    "r",
    "p",
    "salt",
    "aead",
    "nonce",
    "ciphertext_enc",
    "tag",
    "filename",
];

/// Alternate name for the `ciphertext_enc` column, accepted on read.
pub const CIPHERTEXT_COLUMN_ALIAS: &str = "ciphertext_ref";

/// Whether `row` is a store header. Either spelling of the ciphertext column
/// is accepted; stores are always written with [`HEADER`].
pub fn is_header(row: &[String]) -> bool {
    row.len() == HEADER.len()
        && row.iter().zip(HEADER).enumerate().all(|(i, (field, expected))| {
            field == expected || (i == 7 && field == CIPHERTEXT_COLUMN_ALIAS)
        })
}

/// Metadata for a single encrypted file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    /// KDF used to derive the key
    pub kdf: KdfAlgorithm,
    /// KDF cost parameters as they were when the file was encrypted
    pub n: u32,
    pub r: u32,
    pub p: u32,
    /// Random per-record salt
    pub salt: Vec<u8>,
    /// AEAD used to encrypt the content
    pub aead: AeadAlgorithm,
    /// Random per-record nonce
    pub nonce: Vec<u8>,
    /// Location of the base64 ciphertext blob
    pub ciphertext_ref: PathBuf,
    /// Detached authentication tag
    pub tag: Vec<u8>,
    /// Canonical absolute path of the source file; unique among live records
    pub filename: String,
}

impl MetadataRecord {
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            algorithm: self.kdf,
            n: self.n,
            r: self.r,
            p: self.p,
        }
    }

    /// Base name of the original file, used to name restored output.
    pub fn original_name(&self) -> Option<&str> {
        Path::new(&self.filename)
            .file_name()
            .and_then(|name| name.to_str())
    }

    /// Serialize to the store's column order.
    pub fn to_fields(&self) -> [String; 10] {
        [
            self.kdf.to_string(),
            self.n.to_string(),
            self.r.to_string(),
            self.p.to_string(),
            STANDARD.encode(&self.salt),
            self.aead.to_string(),
            STANDARD.encode(&self.nonce),
            self.ciphertext_ref.to_string_lossy().into_owned(),
            STANDARD.encode(&self.tag),
            self.filename.clone(),
        ]
    }

    /// Parse a row in the store's column order. The error is a human-readable
    /// reason; the caller attaches the store path and row number.
    pub fn from_fields(fields: &[String]) -> Result<Self, String> {
        let [kdf, n, r, p, salt, aead, nonce, ciphertext_ref, tag, filename] = fields else {
            return Err(format!(
                "expected {} fields, found {}",
                HEADER.len(),
                fields.len()
            ));
        };

        Ok(Self {
            kdf: kdf.parse().map_err(|e| format!("{e}"))?,
            n: parse_cost("n", n)?,
            r: parse_cost("r", r)?,
            p: parse_cost("p", p)?,
            salt: decode_field("salt", salt)?,
            aead: aead.parse().map_err(|e| format!("{e}"))?,
            nonce: decode_field("nonce", nonce)?,
            ciphertext_ref: PathBuf::from(ciphertext_ref),
            tag: decode_field("tag", tag)?,
            filename: filename.clone(),
        })
    }
}

fn parse_cost(name: &str, value: &str) -> Result<u32, String> {
    value
        .trim()
        .parse()
        .map_err(|e| format!("{name}: invalid cost {value:?}: {e}"))
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, String> {
    STANDARD
        .decode(value.trim())
        .map_err(|e| format!("{name}: base64 decode: {e}"))
}
