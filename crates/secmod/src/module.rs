//! Token-backed security module implementation.
//!
//! [`Pkcs11SecurityModule`] owns the token session for the process
//! lifetime. Construction walks a strict sequence -- validate
//! configuration, load the provider, open the keystore, resolve the
//! private-key handle, resolve and cache the public point -- and any
//! failure is terminal: there is no partially constructed adapter and no
//! retry.
//!
//! # Thread safety
//!
//! A single token session is not guaranteed to survive concurrent use
//! (PKCS#11 explicitly leaves simultaneous calls on one session
//! undefined), so every provider call is serialized through one `Mutex`
//! held for the duration of the call. The cached public point is
//! immutable after construction and is read without synchronization.
//! There is no timeout: a hung token blocks its caller indefinitely.

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use tracing::{debug, info, warn};

use secmod_crypto::{EcdsaSignature, PublicKeyPoint, decode_der_signature};
use token::{PrivateKeyHandle, SoftToken, TokenError, TokenProvider};

use crate::{ModuleConfig, SecurityModule, SecurityModuleError, SharedSecret};

/// Security module backed by an external cryptographic token.
pub struct Pkcs11SecurityModule<P> {
    session: Mutex<P>,
    key_handle: PrivateKeyHandle,
    public_key: PublicKeyPoint,
}

impl Pkcs11SecurityModule<SoftToken> {
    /// Constructs the adapter against the bundled soft-token provider.
    ///
    /// # Errors
    ///
    /// Any construction-phase kind from the taxonomy; see
    /// [`initialize`](Self::initialize).
    pub fn connect(config: &ModuleConfig) -> Result<Self, SecurityModuleError> {
        Self::initialize(config, SoftToken::load)
    }
}

impl<P: TokenProvider> Pkcs11SecurityModule<P> {
    /// Constructs the adapter with an injected provider loader.
    ///
    /// The loader runs only after the configuration has validated, so a
    /// rejected configuration provably causes zero token interaction.
    ///
    /// # Errors
    ///
    /// - [`SecurityModuleError::Configuration`] -- a config field is absent
    ///   (the loader is not invoked);
    /// - [`SecurityModuleError::ProviderInit`] -- the loader failed;
    /// - [`SecurityModuleError::Keystore`] -- unreadable secret file or
    ///   rejected secret;
    /// - [`SecurityModuleError::KeyNotFound`] -- alias missing or not a
    ///   private key;
    /// - [`SecurityModuleError::KeyType`] -- public entry not on the curve.
    pub fn initialize<L>(config: &ModuleConfig, loader: L) -> Result<Self, SecurityModuleError>
    where
        L: FnOnce(&Path) -> Result<P, TokenError>,
    {
        debug!("validating security module configuration");
        config.validate()?;

        debug!(path = %config.token_config_path.display(), "loading token provider");
        let mut provider = loader(&config.token_config_path).map_err(|e| {
            warn!(error = %e, "token provider failed to load");
            SecurityModuleError::from(e)
        })?;

        debug!(path = %config.token_secret_path.display(), "opening token keystore");
        let secret = fs::read_to_string(&config.token_secret_path).map_err(|e| {
            warn!(error = %e, "token secret file unreadable");
            SecurityModuleError::Keystore
        })?;
        provider.login(secret.trim_end_matches(['\r', '\n']))?;

        debug!(alias = %config.key_alias, "resolving private key");
        let key_handle = provider.private_key(&config.key_alias)?;

        debug!(alias = %config.key_alias, "resolving public key");
        let public_key = provider.public_point(&config.key_alias)?;

        info!(alias = %config.key_alias, "token session ready");
        Ok(Self {
            session: Mutex::new(provider),
            key_handle,
            public_key,
        })
    }
}

impl<P: TokenProvider> SecurityModule for Pkcs11SecurityModule<P> {
    fn sign(&self, digest: &[u8; 32]) -> Result<EcdsaSignature, SecurityModuleError> {
        let der = {
            let session = self.session.lock().expect("token session mutex poisoned");
            session.sign(self.key_handle, digest)?
        };

        decode_der_signature(&der).map_err(|e| {
            warn!(error = %e, "token signature rejected");
            SecurityModuleError::from(e)
        })
    }

    fn public_key(&self) -> PublicKeyPoint {
        self.public_key
    }

    fn calculate_ecdh_key_agreement(
        &self,
        party_key: &PublicKeyPoint,
    ) -> Result<SharedSecret, SecurityModuleError> {
        // Reject points off the curve before taking the session lock.
        party_key.to_public_key().map_err(|e| {
            warn!(error = %e, "counterparty point rejected");
            SecurityModuleError::from(e)
        })?;

        let session = self.session.lock().expect("token session mutex poisoned");
        let secret = session.agree_key(self.key_handle, party_key)?;
        Ok(SharedSecret::new(secret))
    }
}
