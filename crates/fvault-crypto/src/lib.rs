//! fvault-crypto: password-based whole-file encryption
//!
//! Pipeline: password + random salt → KDF → key → AEAD(plaintext) → { nonce, ciphertext, tag }
//!
//! ```text
//! KDF:  scrypt (default, n/r/p) | Argon2id (memory KiB / iterations / lanes)
//! AEAD: AES-256-GCM (default) | AES-GCM (legacy AES-128, 16-byte nonce) | XChaCha20-Poly1305
//! ```
//!
//! Nothing here touches the filesystem; the salt, nonce, tag and KDF costs
//! are handed back to the caller to persist next to the ciphertext.

pub mod aead;
pub mod kdf;

pub use aead::{decrypt, encrypt, Sealed};
pub use kdf::{derive_key, generate_salt, DerivedKey};

/// Size of the per-file random salt in bytes
pub const SALT_SIZE: usize = 16;
