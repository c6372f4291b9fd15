//! fvault: password-based file encryption vault
//!
//! Commands:
//!   init                 - create the metadata store and vault directories
//!   encrypt <file>       - encrypt a file into the encrypted directory
//!   decrypt <blob>       - restore a file into the decrypted directory
//!   list [--json]        - show every live record
//!   check                - report records without blobs and blobs without records
//!   config show          - display the active configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::path::{Path, PathBuf};

use fvault_core::config::{LogFormat, VaultConfig};
use fvault_engine::Vault;
use fvault_store::MetadataRecord;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "fvault",
    version,
    about = "Password-based file encryption vault",
    long_about = "fvault: encrypt files under a password and keep per-file KDF/AEAD parameters in a local metadata store"
)]
struct Cli {
    /// Path to fvault.toml configuration file
    #[arg(long, short = 'c', env = "FVAULT_CONFIG", default_value = "fvault.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the metadata store if it does not exist yet
    Init,

    /// Encrypt a file; the source is left in place
    Encrypt {
        /// File to encrypt
        path: PathBuf,
        /// Read the password from this environment variable instead of prompting
        #[arg(long, value_name = "VAR")]
        password_env: Option<String>,
    },

    /// Decrypt a ciphertext blob and retire its record
    Decrypt {
        /// Ciphertext blob (e.g. encrypted/notes.txt_encrypted.enc)
        blob: PathBuf,
        /// Read the password from this environment variable instead of prompting
        #[arg(long, value_name = "VAR")]
        password_env: Option<String>,
    },

    /// List every encrypted file known to the metadata store
    List {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Cross-check the metadata store against the encrypted directory
    Check,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = VaultConfig::load(&cli.config)?;
    init_logging(&config.logging.level, &config.logging.format);
    tracing::debug!(config = %cli.config.display(), "configuration loaded");

    match cli.command {
        Commands::Init => cmd_init(&config),
        Commands::Encrypt { path, password_env } => {
            cmd_encrypt(&config, &path, password_env.as_deref())
        }
        Commands::Decrypt { blob, password_env } => {
            cmd_decrypt(&config, &blob, password_env.as_deref())
        }
        Commands::List { json } => cmd_list(&config, json),
        Commands::Check => cmd_check(&config),
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &cli.config),
    }
}

/// Logs go to stderr so that `list --json` output stays machine-readable.
fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Password input ────────────────────────────────────────────────────────────

/// Obtain the password from `env_var` if given, otherwise prompt on the
/// terminal. `confirm` asks twice and requires both entries to match.
fn read_password(env_var: Option<&str>, confirm: bool) -> Result<SecretString> {
    if let Some(var) = env_var {
        let value = std::env::var(var)
            .with_context(|| format!("password environment variable {var} is not set"))?;
        return non_empty(SecretString::from(value));
    }

    let password = SecretString::from(
        rpassword::prompt_password("Password: ").context("reading password")?,
    );
    if confirm {
        let again = SecretString::from(
            rpassword::prompt_password("Confirm password: ").context("reading password")?,
        );
        if password.expose_secret() != again.expose_secret() {
            anyhow::bail!("passwords do not match");
        }
    }
    non_empty(password)
}

fn non_empty(password: SecretString) -> Result<SecretString> {
    if password.expose_secret().is_empty() {
        anyhow::bail!("password must not be empty");
    }
    Ok(password)
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn cmd_init(config: &VaultConfig) -> Result<()> {
    Vault::open(config).context("opening vault")?;
    std::fs::create_dir_all(&config.storage.encrypted_dir).with_context(|| {
        format!("creating {}", config.storage.encrypted_dir.display())
    })?;
    std::fs::create_dir_all(&config.storage.decrypted_dir).with_context(|| {
        format!("creating {}", config.storage.decrypted_dir.display())
    })?;
    println!("Metadata store: {}", config.storage.store_file.display());
    println!("Encrypted dir:  {}", config.storage.encrypted_dir.display());
    println!("Decrypted dir:  {}", config.storage.decrypted_dir.display());
    Ok(())
}

fn cmd_encrypt(config: &VaultConfig, path: &Path, password_env: Option<&str>) -> Result<()> {
    let vault = Vault::open(config).context("opening vault")?;
    let password = read_password(password_env, true)?;
    let blob = vault
        .encrypt(path, &password)
        .with_context(|| format!("encrypting {}", path.display()))?;
    println!("{} → {}", path.display(), blob.display());
    Ok(())
}

fn cmd_decrypt(config: &VaultConfig, blob: &Path, password_env: Option<&str>) -> Result<()> {
    let vault = Vault::open(config).context("opening vault")?;
    let password = read_password(password_env, false)?;
    let output = vault
        .decrypt(blob, &password)
        .with_context(|| format!("decrypting {}", blob.display()))?;
    println!("{} → {}", blob.display(), output.display());
    Ok(())
}

/// Public view of a record for listing; salts, nonces and tags stay out.
#[derive(Debug, Serialize)]
struct RecordSummary<'a> {
    source: &'a str,
    blob: &'a Path,
    kdf: String,
    n: u32,
    r: u32,
    p: u32,
    aead: String,
    blob_present: bool,
}

impl<'a> From<&'a MetadataRecord> for RecordSummary<'a> {
    fn from(record: &'a MetadataRecord) -> Self {
        Self {
            source: &record.filename,
            blob: &record.ciphertext_ref,
            kdf: record.kdf.to_string(),
            n: record.n,
            r: record.r,
            p: record.p,
            aead: record.aead.to_string(),
            blob_present: record.ciphertext_ref.is_file(),
        }
    }
}

fn cmd_list(config: &VaultConfig, json: bool) -> Result<()> {
    let vault = Vault::open(config).context("opening vault")?;
    let records = vault.list()?;
    let summaries: Vec<RecordSummary> = records.iter().map(RecordSummary::from).collect();

    if json {
        let rendered =
            serde_json::to_string_pretty(&summaries).context("serializing records to JSON")?;
        println!("{rendered}");
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No encrypted files in {}", config.storage.store_file.display());
        return Ok(());
    }
    for summary in &summaries {
        println!("{}", summary.source);
        let missing = if summary.blob_present { "" } else { "  (missing)" };
        println!("  blob:  {}{missing}", summary.blob.display());
        println!(
            "  kdf:   {} (n={}, r={}, p={})",
            summary.kdf, summary.n, summary.r, summary.p
        );
        println!("  aead:  {}", summary.aead);
    }
    println!();
    println!("{} file(s)", summaries.len());
    Ok(())
}

fn cmd_check(config: &VaultConfig) -> Result<()> {
    let vault = Vault::open(config).context("opening vault")?;
    let report = vault.check()?;

    println!("Records: {}", report.records);
    for record in &report.missing_blobs {
        println!(
            "  missing blob: {} (source {})",
            record.ciphertext_ref.display(),
            record.filename
        );
    }
    for blob in &report.orphaned_blobs {
        println!("  orphaned blob: {}", blob.display());
    }

    if report.is_consistent() {
        println!("Store and encrypted directory are consistent");
        Ok(())
    } else {
        eprintln!(
            "fvault: {} missing blob(s), {} orphaned blob(s)",
            report.missing_blobs.len(),
            report.orphaned_blobs.len()
        );
        std::process::exit(1);
    }
}

fn cmd_config_show(config: &VaultConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
