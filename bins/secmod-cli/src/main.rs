//! Operator utility for the PKCS11 security module.
//!
//! Parses the plugin options, registers the soft-token security module in a
//! registry under its module name, resolves it the way a host node would,
//! and runs one of the three module operations.
//!
//! ```bash
//! RUST_LOG=debug secmod-cli \
//!     --plugin-pkcs11-softhsm-config-path /etc/node/token.json \
//!     --plugin-pkcs11-softhsm-secret-path /etc/node/token.pin \
//!     --plugin-pkcs11-softhsm-key-alias node-key \
//!     public-key
//! ```

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use secmod::{
    ModuleConfig, Pkcs11SecurityModule, SecurityModule, SecurityModuleRegistry,
};
use secmod_crypto::PublicKeyPoint;

/// Name under which the module is registered with the host.
const SECURITY_MODULE_NAME: &str = "pkcs11-softhsm";

#[derive(Parser)]
#[command(name = "secmod-cli", about = "Token-backed security module utility")]
struct Cli {
    /// Path to the token provider configuration file.
    #[arg(long = "plugin-pkcs11-softhsm-config-path", value_name = "PATH")]
    config_path: PathBuf,

    /// Path to the file holding the token access secret (PIN).
    #[arg(long = "plugin-pkcs11-softhsm-secret-path", value_name = "PATH")]
    secret_path: PathBuf,

    /// Alias of the node key inside the token keystore.
    #[arg(long = "plugin-pkcs11-softhsm-key-alias", value_name = "ALIAS")]
    key_alias: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the node's public curve point.
    PublicKey,

    /// ECDSA-sign a pre-hashed 32-byte digest (hex) and print R and S.
    Sign {
        /// The digest to sign, 64 hex characters.
        digest: String,
    },

    /// Derive the ECDH shared secret with a counterparty public key
    /// (hex, 65-byte uncompressed SEC1 point).
    Ecdh {
        /// The counterparty public key.
        party_key: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = ModuleConfig::new(cli.config_path, cli.secret_path, cli.key_alias);

    // -----------------------------------------------------------------------
    // Registration: the host looks the module up by name and runs its
    // factory once.
    // -----------------------------------------------------------------------

    let registry = SecurityModuleRegistry::new();
    let factory_config = config.clone();
    registry
        .register(
            SECURITY_MODULE_NAME,
            Box::new(move || {
                Pkcs11SecurityModule::connect(&factory_config)
                    .map(|module| Arc::new(module) as Arc<dyn SecurityModule>)
            }),
        )
        .expect("fresh registry cannot hold a duplicate name");

    let module = match registry.resolve(SECURITY_MODULE_NAME) {
        Ok(module) => module,
        Err(e) => fail(&format!("{e}")),
    };
    tracing::info!(module = SECURITY_MODULE_NAME, "security module ready");

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    match cli.command {
        Command::PublicKey => {
            let point = module.public_key();
            println!("x: {}", hex::encode(point.x()));
            println!("y: {}", hex::encode(point.y()));
        }

        Command::Sign { digest } => {
            let digest = parse_digest(&digest).unwrap_or_else(|e| fail(&e));
            match module.sign(&digest) {
                Ok(signature) => {
                    println!("r: {}", hex::encode(signature.r()));
                    println!("s: {}", hex::encode(signature.s()));
                }
                Err(e) => fail(&format!("signing failed: {e}")),
            }
        }

        Command::Ecdh { party_key } => {
            let point = parse_point(&party_key).unwrap_or_else(|e| fail(&e));
            match module.calculate_ecdh_key_agreement(&point) {
                Ok(secret) => println!("{}", hex::encode(secret.as_bytes())),
                Err(e) => fail(&format!("key agreement failed: {e}")),
            }
        }
    }
}

fn parse_digest(input: &str) -> Result<[u8; 32], String> {
    let bytes = hex::decode(input).map_err(|_| format!("digest is not valid hex: {input}"))?;
    bytes
        .try_into()
        .map_err(|_| "digest must be exactly 32 bytes".to_string())
}

fn parse_point(input: &str) -> Result<PublicKeyPoint, String> {
    let bytes = hex::decode(input).map_err(|_| "party key is not valid hex".to_string())?;
    PublicKeyPoint::from_uncompressed(&bytes)
        .map_err(|e| format!("party key rejected: {e}"))
}

fn fail(message: &str) -> ! {
    eprintln!("error: {message}");
    process::exit(1);
}
