//! Security-module error taxonomy.
//!
//! One variant per failure kind, surfaced to the immediate caller with no
//! local recovery and no retry. Construction-phase kinds
//! ([`SecurityModuleError::Configuration`] through
//! [`SecurityModuleError::KeyType`]) abort adapter construction entirely;
//! per-call kinds leave the session ready for subsequent operations.
//!
//! Variants are zero-size discriminants; context (alias, paths, token
//! details) is carried by `tracing` events at the failure site.

use std::fmt;

use secmod_crypto::{PointError, SignatureError};
use token::TokenError;

/// Errors from security-module construction and operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityModuleError {
    /// A required configuration field is absent.
    Configuration,
    /// The token provider could not be loaded or reached.
    ProviderInit,
    /// The access secret could not be read or was rejected by the token.
    Keystore,
    /// No usable private key exists under the configured alias.
    KeyNotFound,
    /// The public entry under the alias is not a point on the expected curve.
    KeyType,
    /// The token's signature output is not a well-formed DER `(r, s)` pair.
    SignatureFormat,
    /// A signature component is outside the canonical range.
    Range,
    /// ECDH key agreement failed (bad counterparty point or token failure).
    KeyAgreement,
}

impl fmt::Display for SecurityModuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "incomplete security module configuration"),
            Self::ProviderInit => write!(f, "token provider initialization failed"),
            Self::Keystore => write!(f, "token keystore could not be opened"),
            Self::KeyNotFound => write!(f, "configured key alias not found in token"),
            Self::KeyType => write!(f, "configured key is not on the expected curve"),
            Self::SignatureFormat => write!(f, "token returned a malformed signature"),
            Self::Range => write!(f, "signature component out of range"),
            Self::KeyAgreement => write!(f, "ECDH key agreement failed"),
        }
    }
}

impl std::error::Error for SecurityModuleError {}

/// Maps token failures onto the taxonomy without losing the kind.
impl From<TokenError> for SecurityModuleError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidProviderConfig | TokenError::ProviderUnavailable => {
                Self::ProviderInit
            }
            TokenError::PinRejected | TokenError::SessionNotOpen => Self::Keystore,
            TokenError::KeyNotFound | TokenError::NotAPrivateKey => Self::KeyNotFound,
            TokenError::NotAnEcPoint => Self::KeyType,
            TokenError::SigningFailed => Self::SignatureFormat,
            TokenError::AgreementFailed => Self::KeyAgreement,
        }
    }
}

/// Signature decode failures: range violations keep their kind, everything
/// else is a format error.
impl From<SignatureError> for SecurityModuleError {
    fn from(err: SignatureError) -> Self {
        if err.is_range() {
            Self::Range
        } else {
            Self::SignatureFormat
        }
    }
}

/// Counterparty point conversion failures surface on the agreement path.
impl From<PointError> for SecurityModuleError {
    fn from(_: PointError) -> Self {
        Self::KeyAgreement
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_errors_map_onto_taxonomy() {
        assert_eq!(
            SecurityModuleError::from(TokenError::PinRejected),
            SecurityModuleError::Keystore
        );
        assert_eq!(
            SecurityModuleError::from(TokenError::NotAPrivateKey),
            SecurityModuleError::KeyNotFound
        );
        assert_eq!(
            SecurityModuleError::from(TokenError::NotAnEcPoint),
            SecurityModuleError::KeyType
        );
    }

    #[test]
    fn signature_errors_split_by_kind() {
        assert_eq!(
            SecurityModuleError::from(SignatureError::ROutOfRange),
            SecurityModuleError::Range
        );
        assert_eq!(
            SecurityModuleError::from(SignatureError::TrailingData),
            SecurityModuleError::SignatureFormat
        );
    }

    #[test]
    fn error_display() {
        assert_eq!(
            SecurityModuleError::Range.to_string(),
            "signature component out of range"
        );
    }
}
