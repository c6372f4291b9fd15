pub mod config;
pub mod error;
pub mod types;

pub use error::{VaultError, VaultResult};
pub use types::{
    AeadAlgorithm, KdfAlgorithm, KdfParams, MAX_ARGON2_ITERATIONS, MAX_KDF_MEMORY_BYTES,
    MAX_KDF_PARALLELISM,
};
