//! `(X, Y)` curve-point codec.
//!
//! The host exchanges public keys as raw affine coordinates; the token and
//! the curve math want `bitcoin::secp256k1::PublicKey` values. This module
//! converts between the two, with on-curve validation at the boundary.

use std::fmt;

use bitcoin::secp256k1::PublicKey;

/// Length of an SEC1 uncompressed point encoding: `0x04 || X || Y`.
const UNCOMPRESSED_LEN: usize = 65;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors from point conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointError {
    /// The byte encoding is not a 65-byte uncompressed SEC1 point.
    InvalidEncoding,
    /// The coordinates do not satisfy the secp256k1 curve equation.
    NotOnCurve,
}

impl fmt::Display for PointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEncoding => write!(f, "invalid uncompressed point encoding"),
            Self::NotOnCurve => write!(f, "point is not on the secp256k1 curve"),
        }
    }
}

impl std::error::Error for PointError {}

// ---------------------------------------------------------------------------
// PublicKeyPoint
// ---------------------------------------------------------------------------

/// Affine coordinates of a public key on secp256k1.
///
/// A plain coordinate container: construction does not validate the curve
/// equation. Validation happens when converting to a [`PublicKey`], which is
/// the only way the point ever reaches curve arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKeyPoint {
    x: [u8; 32],
    y: [u8; 32],
}

impl PublicKeyPoint {
    /// Wraps raw big-endian affine coordinates.
    pub fn new(x: [u8; 32], y: [u8; 32]) -> Self {
        Self { x, y }
    }

    /// The X coordinate, big-endian.
    pub fn x(&self) -> [u8; 32] {
        self.x
    }

    /// The Y coordinate, big-endian.
    pub fn y(&self) -> [u8; 32] {
        self.y
    }

    /// Serializes as the 65-byte SEC1 uncompressed form `0x04 || X || Y`.
    pub fn to_uncompressed(&self) -> [u8; 65] {
        let mut out = [0u8; UNCOMPRESSED_LEN];
        out[0] = 0x04;
        out[1..33].copy_from_slice(&self.x);
        out[33..].copy_from_slice(&self.y);
        out
    }

    /// Parses a 65-byte SEC1 uncompressed encoding.
    ///
    /// # Errors
    ///
    /// [`PointError::InvalidEncoding`] on wrong length or missing `0x04` tag.
    pub fn from_uncompressed(bytes: &[u8]) -> Result<Self, PointError> {
        if bytes.len() != UNCOMPRESSED_LEN || bytes[0] != 0x04 {
            return Err(PointError::InvalidEncoding);
        }
        let mut x = [0u8; 32];
        let mut y = [0u8; 32];
        x.copy_from_slice(&bytes[1..33]);
        y.copy_from_slice(&bytes[33..]);
        Ok(Self { x, y })
    }

    /// Converts to a validated curve point.
    ///
    /// # Errors
    ///
    /// [`PointError::NotOnCurve`] if the coordinates do not lie on secp256k1.
    pub fn to_public_key(&self) -> Result<PublicKey, PointError> {
        PublicKey::from_slice(&self.to_uncompressed()).map_err(|_| PointError::NotOnCurve)
    }

    /// Extracts the affine coordinates of a validated curve point.
    pub fn from_public_key(key: &PublicKey) -> Self {
        let encoded = key.serialize_uncompressed();
        Self::from_uncompressed(&encoded).expect("serialize_uncompressed is always 65 bytes")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
