//! Cryptographic token abstraction for the PKCS11 security module.
//!
//! This crate provides:
//!
//! - [`TokenProvider`] trait -- the capability surface a token must offer
//!   (login, key resolution, raw signing, one-pass ECDH)
//! - [`PrivateKeyHandle`] -- opaque reference to key material inside a token
//! - [`SoftToken`] -- file-backed software provider (SoftHSM-style)
//!
//! # Design
//!
//! The security module depends on [`TokenProvider`], never on a concrete
//! token. A PKCS#11 hardware provider implements this trait out of tree;
//! [`SoftToken`] is the bundled provider for deployments without hardware
//! and for tests, so both exercise the identical adapter code path.
//!
//! Private key material never crosses the trait: callers hold a
//! [`PrivateKeyHandle`] and the token performs every private-key operation
//! on their behalf.

mod soft;

pub use soft::SoftToken;

use std::fmt;

use secmod_crypto::PublicKeyPoint;

// ---------------------------------------------------------------------------
// PrivateKeyHandle
// ---------------------------------------------------------------------------

/// Opaque reference to a private key stored inside a token.
///
/// The wrapped value is meaningful only to the provider that issued it
/// (PKCS#11 object handles are session-scoped integers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrivateKeyHandle(u64);

impl PrivateKeyHandle {
    /// Wraps a provider-issued raw handle.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The provider-issued raw handle value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors from token operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// The provider configuration file is missing, unreadable, or malformed.
    InvalidProviderConfig,
    /// The token itself is unreachable or its key store cannot be read.
    ProviderUnavailable,
    /// The token rejected the presented access secret.
    PinRejected,
    /// An operation requires an authenticated session.
    SessionNotOpen,
    /// No key entry exists under the requested alias or handle.
    KeyNotFound,
    /// The entry under the alias is not a private key.
    NotAPrivateKey,
    /// The public entry under the alias is not a point on the expected curve.
    NotAnEcPoint,
    /// The token failed to produce a signature.
    SigningFailed,
    /// The token failed to derive a shared secret.
    AgreementFailed,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidProviderConfig => write!(f, "invalid token provider configuration"),
            Self::ProviderUnavailable => write!(f, "token provider unavailable"),
            Self::PinRejected => write!(f, "token rejected the access secret"),
            Self::SessionNotOpen => write!(f, "token session is not authenticated"),
            Self::KeyNotFound => write!(f, "key not found in token"),
            Self::NotAPrivateKey => write!(f, "entry is not a private key"),
            Self::NotAnEcPoint => write!(f, "public entry is not an EC point"),
            Self::SigningFailed => write!(f, "token signing operation failed"),
            Self::AgreementFailed => write!(f, "token key agreement failed"),
        }
    }
}

impl std::error::Error for TokenError {}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Capability surface of an external cryptographic token.
///
/// Implementations must be `Send + Sync`; the security module serializes
/// calls through one exclusive-access session, so no concurrent use of a
/// single provider value occurs.
///
/// Calls have no timeout: each blocks until the token answers or errors.
pub trait TokenProvider: Send + Sync {
    /// Authenticates the session with the token's access secret (PIN).
    ///
    /// # Errors
    ///
    /// [`TokenError::PinRejected`] if the token refuses the secret.
    fn login(&mut self, secret: &str) -> Result<(), TokenError>;

    /// Resolves the private key stored under `alias` to an opaque handle.
    ///
    /// # Errors
    ///
    /// [`TokenError::KeyNotFound`] if no entry exists;
    /// [`TokenError::NotAPrivateKey`] if the entry holds no private key.
    fn private_key(&self, alias: &str) -> Result<PrivateKeyHandle, TokenError>;

    /// Resolves the public curve point of the certificate/public entry
    /// stored under `alias`.
    ///
    /// # Errors
    ///
    /// [`TokenError::KeyNotFound`] if no entry exists;
    /// [`TokenError::NotAnEcPoint`] if the entry is not a secp256k1 point.
    fn public_point(&self, alias: &str) -> Result<PublicKeyPoint, TokenError>;

    /// ECDSA-signs a 32-byte digest with the referenced private key.
    ///
    /// Returns the token's native encoding: ASN.1 DER
    /// `SEQUENCE { r INTEGER, s INTEGER }`, not necessarily canonical.
    fn sign(&self, key: PrivateKeyHandle, digest: &[u8; 32]) -> Result<Vec<u8>, TokenError>;

    /// One-pass static ECDH: combines the referenced private key with the
    /// counterparty's public point and returns the raw 32-byte shared
    /// secret (the X coordinate of the shared point). No KDF is applied.
    fn agree_key(
        &self,
        key: PrivateKeyHandle,
        party_point: &PublicKeyPoint,
    ) -> Result<[u8; 32], TokenError>;
}
