//! cvault: CryptoVault client-side encryption CLI
//!
//! Key commands:
//!   key init                 - create (or show) the user's key
//!   key export [--protect]   - print the key, optionally passphrase-sealed
//!   key import <value>       - restore a key from an export or sealed backup
//!   key clear --yes          - delete the user's key
//!
//! File commands:
//!   encrypt <input> [-o out]              - encrypt a file, print upload metadata
//!   decrypt <input> -o out --iv <b64>     - decrypt a downloaded file
//!   config show                           - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::SecretString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cvault_core::config::{expand_tilde, VaultConfig};
use cvault_crypto::{DownloadedPayload, FileCrypto, FileMetadata, KeyStore, UserScope};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "cvault",
    version,
    about = "CryptoVault client-side encryption",
    long_about = "cvault: manage per-user encryption keys and encrypt/decrypt files before upload"
)]
struct Cli {
    /// Path to cvault.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "CVAULT_CONFIG",
        default_value = "~/.config/cvault/cvault.toml"
    )]
    config: PathBuf,

    /// User whose key is used (default: $USER)
    #[arg(long, short = 'u', env = "CVAULT_USER")]
    user: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides config
    #[arg(long, env = "CVAULT_LOG")]
    log: Option<String>,

    /// Log format (json, text); overrides config
    #[arg(long, env = "CVAULT_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum, PartialEq)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Per-user key management
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Encrypt a file for upload
    ///
    /// Writes the ciphertext and prints the metadata (iv, algo, sizes) the
    /// server stores alongside it.
    Encrypt {
        /// Plaintext input file
        input: PathBuf,
        /// Ciphertext output (default: <input>.enc)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Decrypt a downloaded file
    Decrypt {
        /// Ciphertext input file
        input: PathBuf,
        /// Plaintext output file
        #[arg(long, short = 'o')]
        output: PathBuf,
        /// Base64 nonce from the X-File-IV header or metadata
        #[arg(long, required_unless_present = "meta", conflicts_with = "meta")]
        iv: Option<String>,
        /// Algorithm tag (default: the configured security level's algorithm)
        #[arg(long, conflicts_with = "meta")]
        algo: Option<String>,
        /// Metadata JSON as printed by `cvault encrypt`
        #[arg(long)]
        meta: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum KeyAction {
    /// Create the user's key if missing and print its fingerprint
    Init,

    /// Print the user's key for backup or transfer to another device
    Export {
        /// Seal the key under a passphrase (Argon2id + AES-256-GCM)
        #[arg(long)]
        protect: bool,
    },

    /// Restore a key previously printed by `key export`
    Import {
        /// Exported value, or `-` to read it from stdin
        value: String,
        /// The value is a passphrase-sealed backup
        #[arg(long)]
        protected: bool,
    },

    /// Delete the user's key. Files encrypted under it become unreadable.
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config = VaultConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.logging.level.clone());
    let format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| parse_log_format(&config.logging.format));
    init_logging(&level, &format);

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        backend = ?config.keystore.backend,
        "cvault starting"
    );

    match cli.command {
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &config_path),
        Commands::Key { action } => {
            let scope = resolve_scope(cli.user.as_deref())?;
            let store = open_store(&config)?;
            match action {
                KeyAction::Init => cmd_key_init(&store, &scope).await,
                KeyAction::Export { protect } => {
                    cmd_key_export(&config, &store, &scope, protect).await
                }
                KeyAction::Import { value, protected } => {
                    cmd_key_import(&config, &store, &scope, &value, protected).await
                }
                KeyAction::Clear { yes } => cmd_key_clear(&store, &scope, yes).await,
            }
        }
        Commands::Encrypt { input, output } => {
            let scope = resolve_scope(cli.user.as_deref())?;
            let crypto = FileCrypto::new(Arc::new(open_store(&config)?));
            cmd_encrypt(&crypto, &scope, &input, output.as_deref()).await
        }
        Commands::Decrypt {
            input,
            output,
            iv,
            algo,
            meta,
        } => {
            let scope = resolve_scope(cli.user.as_deref())?;
            let default_algo = config.crypto.security_level.algorithm();
            let crypto = FileCrypto::new(Arc::new(open_store(&config)?));
            let source = match (meta, iv) {
                (Some(path), _) => NonceSource::Metadata(path),
                (None, Some(iv)) => NonceSource::Explicit {
                    iv,
                    algo: algo.unwrap_or_else(|| default_algo.to_string()),
                },
                (None, None) => anyhow::bail!("either --iv or --meta is required"),
            };
            cmd_decrypt(&crypto, &scope, &input, &output, source).await
        }
    }
}

// ── Logging ───────────────────────────────────────────────────────────────────

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

fn parse_log_format(s: &str) -> LogFormat {
    LogFormat::from_str(s, true).unwrap_or(LogFormat::Text)
}

// ── Key store wiring ──────────────────────────────────────────────────────────

fn resolve_scope(user: Option<&str>) -> Result<UserScope> {
    let id = match user {
        Some(u) => u.to_string(),
        None => std::env::var("USER")
            .context("no user given: pass --user or set CVAULT_USER")?,
    };
    UserScope::new(id).context("invalid user")
}

fn open_store(config: &VaultConfig) -> Result<KeyStore> {
    cvault_secrets::open_key_store(&config.keystore, config.crypto.security_level)
        .context("opening key store")
}

fn read_passphrase(confirm: bool) -> Result<SecretString> {
    if let Ok(p) = std::env::var("CVAULT_PASSPHRASE") {
        return Ok(SecretString::from(p));
    }
    let first = rpassword::prompt_password("Passphrase: ").context("reading passphrase")?;
    if first.is_empty() {
        anyhow::bail!("passphrase must not be empty");
    }
    if confirm {
        let second =
            rpassword::prompt_password("Confirm passphrase: ").context("reading passphrase")?;
        if first != second {
            anyhow::bail!("passphrases do not match");
        }
    }
    Ok(SecretString::from(first))
}

// ── `cvault key init` ─────────────────────────────────────────────────────────

async fn cmd_key_init(store: &KeyStore, scope: &UserScope) -> Result<()> {
    let existed = store.has_key(scope).await?;
    let key = store.get_or_create_key(scope).await?;

    if existed {
        println!("Key already exists for {scope}");
    } else {
        println!("Created key for {scope}");
    }
    println!("  fingerprint: {}", key.fingerprint());
    println!("  algorithm:   {}", key.algorithm());
    Ok(())
}

// ── `cvault key export` ───────────────────────────────────────────────────────

async fn cmd_key_export(
    config: &VaultConfig,
    store: &KeyStore,
    scope: &UserScope,
    protect: bool,
) -> Result<()> {
    let key = store.get_key(scope).await?;

    if protect {
        let passphrase = read_passphrase(true)?;
        let sealed = cvault_crypto::seal_key(&key, &passphrase, &config.crypto.kdf_params())?;
        println!("{sealed}");
    } else {
        eprintln!("warning: anyone holding this value can decrypt your files");
        println!("{}", cvault_crypto::export_key(&key));
    }
    tracing::info!(scope = %scope, key = %key.fingerprint(), protect, "exported key");
    Ok(())
}

// ── `cvault key import` ───────────────────────────────────────────────────────

async fn cmd_key_import(
    config: &VaultConfig,
    store: &KeyStore,
    scope: &UserScope,
    value: &str,
    protected: bool,
) -> Result<()> {
    let value = if value == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading key from stdin")?;
        buf
    } else {
        value.to_string()
    };

    let key = if protected {
        let passphrase = read_passphrase(false)?;
        cvault_crypto::open_key(&value, &passphrase, &config.crypto.kdf_params())?
    } else {
        cvault_crypto::import_key(&value)?
    };

    store.store_key(scope, &key).await?;
    println!("Imported key for {scope}");
    println!("  fingerprint: {}", key.fingerprint());
    println!("  algorithm:   {}", key.algorithm());
    Ok(())
}

// ── `cvault key clear` ────────────────────────────────────────────────────────

async fn cmd_key_clear(store: &KeyStore, scope: &UserScope, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!(
            "refusing to delete the key for {scope} without --yes \
             (files encrypted under it become unrecoverable)"
        );
    }
    store.clear_key(scope).await?;
    println!("Cleared key for {scope}");
    Ok(())
}

// ── `cvault encrypt` ──────────────────────────────────────────────────────────

async fn cmd_encrypt(
    crypto: &FileCrypto,
    scope: &UserScope,
    input: &Path,
    output: Option<&Path>,
) -> Result<()> {
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_encrypted_path(input));
    let metadata = encrypt_file(crypto, scope, input, &output).await?;

    let rendered = serde_json::to_string_pretty(&metadata).context("serializing metadata")?;
    println!("{rendered}");
    eprintln!(
        "Encrypted {} → {} ({})",
        input.display(),
        output.display(),
        fmt_bytes(metadata.encrypted_size)
    );
    Ok(())
}

async fn encrypt_file(
    crypto: &FileCrypto,
    scope: &UserScope,
    input: &Path,
    output: &Path,
) -> Result<FileMetadata> {
    let plaintext = tokio::fs::read(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;

    let upload = crypto.encrypt_for_upload(scope, plaintext).await?;
    tokio::fs::write(output, &upload.ciphertext)
        .await
        .with_context(|| format!("writing {}", output.display()))?;
    Ok(upload.metadata())
}

fn default_encrypted_path(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_os_string();
    name.push(".enc");
    PathBuf::from(name)
}

// ── `cvault decrypt` ──────────────────────────────────────────────────────────

enum NonceSource {
    Explicit { iv: String, algo: String },
    Metadata(PathBuf),
}

async fn cmd_decrypt(
    crypto: &FileCrypto,
    scope: &UserScope,
    input: &Path,
    output: &Path,
    source: NonceSource,
) -> Result<()> {
    let ciphertext = tokio::fs::read(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;

    let download = match source {
        NonceSource::Explicit { iv, algo } => DownloadedPayload::new(ciphertext, iv, algo),
        NonceSource::Metadata(path) => {
            let content = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading metadata: {}", path.display()))?;
            let metadata: FileMetadata = serde_json::from_str(&content)
                .with_context(|| format!("parsing metadata: {}", path.display()))?;
            DownloadedPayload::from_metadata(ciphertext, &metadata)
        }
    };

    let plaintext = crypto.decrypt_download(scope, download).await?;
    tokio::fs::write(output, &plaintext)
        .await
        .with_context(|| format!("writing {}", output.display()))?;

    println!(
        "Decrypted {} → {} ({})",
        input.display(),
        output.display(),
        fmt_bytes(plaintext.len() as u64)
    );
    Ok(())
}

// ── `cvault config show` ──────────────────────────────────────────────────────

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

// ── Utilities ─────────────────────────────────────────────────────────────────

fn fmt_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    const GIB: u64 = 1024 * MIB;
    if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}
