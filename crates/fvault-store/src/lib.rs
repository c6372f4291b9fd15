//! fvault-store: the metadata store recording how to reverse each encryption
//!
//! One row per live encrypted file:
//! ```text
//! kdf,n,r,p,salt,aead,nonce,ciphertext_enc,tag,filename
//! scrypt,65536,8,1,<b64>,AES-256-GCM,<b64>,/abs/encrypted/a.txt_encrypted.enc,<b64>,/abs/a.txt
//! ```
//!
//! A record exists exactly as long as its ciphertext blob does; keeping the
//! two in step is the engine's job, keeping the table intact across crashes
//! is this crate's.

pub mod record;
pub mod store;
pub mod table;

pub use record::{MetadataRecord, HEADER};
pub use store::{CsvStore, RecordStore};
