//! Token-backed security module for a blockchain node.
//!
//! The node's identity key lives inside an external cryptographic token
//! (a hardware or software HSM); this crate adapts the token to the three
//! operations the node needs, without private key material ever entering
//! process memory:
//!
//! - [`SecurityModule`] trait -- the host-facing operation surface
//! - [`Pkcs11SecurityModule`] -- the token-backed implementation
//! - [`ModuleConfig`] -- token locators and key alias
//! - [`SecurityModuleRegistry`] -- name-to-factory lookup for the host
//! - [`SecurityModuleError`] -- the error taxonomy
//!
//! # Construction
//!
//! [`Pkcs11SecurityModule::connect`] turns a [`ModuleConfig`] into a ready
//! adapter or fails fast; there is no partially usable state. After
//! construction, [`SecurityModule::sign`] and
//! [`SecurityModule::calculate_ecdh_key_agreement`] may be called
//! concurrently from many threads; token calls are serialized internally.

pub mod config;
pub mod error;
pub mod module;
pub mod registry;

pub use config::ModuleConfig;
pub use error::SecurityModuleError;
pub use module::Pkcs11SecurityModule;
pub use registry::{RegistryError, SecurityModuleRegistry};

use std::fmt;

use secmod_crypto::{EcdsaSignature, PublicKeyPoint};

// ---------------------------------------------------------------------------
// SharedSecret
// ---------------------------------------------------------------------------

/// A 32-byte ECDH shared secret.
///
/// Transient: produced per call, owned by the caller, not retained by the
/// adapter. `Debug` is redacted so secrets cannot leak through logging.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    /// Wraps raw shared-secret bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw shared-secret bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Consumes the wrapper, returning the raw bytes.
    pub fn into_bytes(self) -> [u8; 32] {
        self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Signing and key-agreement capability backed by the node's identity key.
///
/// The host resolves an implementation once at startup (see
/// [`SecurityModuleRegistry`]) and invokes these operations for the process
/// lifetime, potentially from many threads at once.
pub trait SecurityModule: Send + Sync {
    /// ECDSA-signs a 32-byte digest, returning the canonical `(R, S)` pair.
    ///
    /// The digest is a pre-hashed message; no hashing happens here.
    ///
    /// # Errors
    ///
    /// [`SecurityModuleError::SignatureFormat`] if the token's DER output is
    /// malformed; [`SecurityModuleError::Range`] if a component falls
    /// outside the canonical bounds. Either leaves the session usable for
    /// subsequent calls.
    fn sign(&self, digest: &[u8; 32]) -> Result<EcdsaSignature, SecurityModuleError>;

    /// Returns the node's public curve point. Reads a cached value; never
    /// touches the token and never fails.
    fn public_key(&self) -> PublicKeyPoint;

    /// Derives the 32-byte ECDH shared secret with a counterparty's public
    /// point. No KDF is applied; key derivation is the caller's concern.
    ///
    /// # Errors
    ///
    /// [`SecurityModuleError::KeyAgreement`] if the point is not on the
    /// curve or the token fails to derive the secret.
    fn calculate_ecdh_key_agreement(
        &self,
        party_key: &PublicKeyPoint,
    ) -> Result<SharedSecret, SecurityModuleError>;
}
