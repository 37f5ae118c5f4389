//! DER ECDSA signature decoding and low-S canonicalization.
//!
//! The token returns signatures as ASN.1 DER: `SEQUENCE { r INTEGER,
//! s INTEGER }`. The consuming protocol accepts only the canonical form
//! `0 < r < n`, `0 < s <= n/2` -- of the two mathematically valid `s`
//! values for a given `(digest, r)`, only the low one, preventing
//! signature malleability.
//!
//! [`decode_der_signature`] is the full pipeline: strict DER parse,
//! canonicalize, validate. Integer content bytes are read as an unsigned
//! magnitude, so an encoding with the sign bit set decodes to the same
//! value as its zero-padded form.
//!
//! Validation runs after canonicalization, not before: a pre-canonical `s`
//! may legitimately fall in the upper half of the order.

use std::cmp::Ordering;
use std::fmt;

use crate::curve::{HALF_ORDER, ORDER, scalar_cmp, scalar_is_zero, scalar_sub};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors from decoding or validating an ECDSA signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureError {
    /// The byte stream ended before the structure was complete.
    UnexpectedEnd,
    /// The outer element is not an ASN.1 SEQUENCE.
    NotASequence,
    /// A sequence element is not an ASN.1 INTEGER, or its encoding is empty.
    NotAnInteger,
    /// A length field is not a valid short-form DER length.
    InvalidLength,
    /// Bytes remain after the two-integer sequence.
    TrailingData,
    /// `r` is outside `(0, n)`.
    ROutOfRange,
    /// `s` is zero, or not below `n`, or otherwise not reducible to `(0, n/2]`.
    SOutOfRange,
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEnd => write!(f, "unexpected end of DER stream"),
            Self::NotASequence => write!(f, "not a DER sequence"),
            Self::NotAnInteger => write!(f, "sequence element is not a DER integer"),
            Self::InvalidLength => write!(f, "invalid DER length field"),
            Self::TrailingData => write!(f, "trailing bytes after signature"),
            Self::ROutOfRange => write!(f, "signature r component out of range"),
            Self::SOutOfRange => write!(f, "signature s component out of range"),
        }
    }
}

impl std::error::Error for SignatureError {}

impl SignatureError {
    /// Whether this error is a value-range failure rather than a malformed
    /// byte stream.
    pub fn is_range(&self) -> bool {
        matches!(self, Self::ROutOfRange | Self::SOutOfRange)
    }
}

// ---------------------------------------------------------------------------
// EcdsaSignature
// ---------------------------------------------------------------------------

/// A canonical ECDSA signature over secp256k1.
///
/// Construction enforces the invariant `0 < r < n`, `0 < s <= n/2`; a value
/// of this type is always in canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcdsaSignature {
    r: [u8; 32],
    s: [u8; 32],
}

impl EcdsaSignature {
    /// Builds a canonical signature from raw big-endian scalars.
    ///
    /// Applies the low-S rule (`s > n/2` becomes `n - s`), then validates
    /// both components. Canonicalization is idempotent: canonical input is
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// [`SignatureError::ROutOfRange`] unless `0 < r < n`;
    /// [`SignatureError::SOutOfRange`] unless `s` reduces to `(0, n/2]`.
    pub fn from_scalars(r: [u8; 32], s: [u8; 32]) -> Result<Self, SignatureError> {
        let s = if scalar_cmp(&s, &HALF_ORDER) == Ordering::Greater {
            // n - s must stay positive, which needs s < n.
            if scalar_cmp(&s, &ORDER) != Ordering::Less {
                return Err(SignatureError::SOutOfRange);
            }
            scalar_sub(&ORDER, &s)
        } else {
            s
        };

        if scalar_is_zero(&r) || scalar_cmp(&r, &ORDER) != Ordering::Less {
            return Err(SignatureError::ROutOfRange);
        }
        if scalar_is_zero(&s) {
            return Err(SignatureError::SOutOfRange);
        }

        Ok(Self { r, s })
    }

    /// The `R` component, big-endian.
    pub fn r(&self) -> [u8; 32] {
        self.r
    }

    /// The `S` component, big-endian. Always `<= n/2`.
    pub fn s(&self) -> [u8; 32] {
        self.s
    }

    /// Serializes as the 64-byte compact form `r || s`.
    pub fn to_compact(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.r);
        out[32..].copy_from_slice(&self.s);
        out
    }
}

/// Decodes a DER `SEQUENCE { r INTEGER, s INTEGER }` into a canonical
/// signature.
///
/// # Errors
///
/// Format errors ([`SignatureError::is_range`] is `false`) for a malformed,
/// truncated, or wrongly shaped byte stream; range errors for component
/// values outside the canonical bounds. An integer wider than 32 significant
/// bytes is necessarily `>= n` and classifies as a range error.
pub fn decode_der_signature(der: &[u8]) -> Result<EcdsaSignature, SignatureError> {
    let mut reader = Reader { bytes: der, pos: 0 };

    if reader.byte()? != 0x30 {
        return Err(SignatureError::NotASequence);
    }
    let body_len = reader.length()?;
    let body_end = reader.pos + body_len;
    if body_end > der.len() {
        return Err(SignatureError::UnexpectedEnd);
    }
    if body_end != der.len() {
        return Err(SignatureError::TrailingData);
    }

    let r = read_integer(&mut reader, SignatureError::ROutOfRange)?;
    let s = read_integer(&mut reader, SignatureError::SOutOfRange)?;
    if reader.pos != body_end {
        return Err(SignatureError::TrailingData);
    }

    EcdsaSignature::from_scalars(r, s)
}

// ---------------------------------------------------------------------------
// DER reader
// ---------------------------------------------------------------------------

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn byte(&mut self) -> Result<u8, SignatureError> {
        let b = *self
            .bytes
            .get(self.pos)
            .ok_or(SignatureError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(b)
    }

    /// Reads a short-form DER length. Signature sequences and their
    /// integers are all shorter than 128 bytes, where DER mandates the
    /// short form.
    fn length(&mut self) -> Result<usize, SignatureError> {
        let b = self.byte()?;
        if b & 0x80 != 0 {
            return Err(SignatureError::InvalidLength);
        }
        Ok(usize::from(b))
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], SignatureError> {
        let end = self
            .pos
            .checked_add(n)
            .ok_or(SignatureError::UnexpectedEnd)?;
        if end > self.bytes.len() {
            return Err(SignatureError::UnexpectedEnd);
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

/// Reads one INTEGER element as an unsigned 32-byte magnitude.
///
/// `overflow` is the range error to report when the magnitude has more than
/// 32 significant bytes (the value is then certainly `>= n`).
fn read_integer(
    reader: &mut Reader<'_>,
    overflow: SignatureError,
) -> Result<[u8; 32], SignatureError> {
    if reader.byte()? != 0x02 {
        return Err(SignatureError::NotAnInteger);
    }
    let len = reader.length()?;
    if len == 0 {
        return Err(SignatureError::NotAnInteger);
    }
    let content = reader.take(len)?;

    let significant = match content.iter().position(|&b| b != 0) {
        Some(first) => &content[first..],
        None => &[],
    };
    if significant.len() > 32 {
        return Err(overflow);
    }

    let mut scalar = [0u8; 32];
    scalar[32 - significant.len()..].copy_from_slice(significant);
    Ok(scalar)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
