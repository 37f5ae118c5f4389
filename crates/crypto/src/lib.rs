//! Cryptographic primitives for the PKCS11 security module.
//!
//! This crate provides the curve-level building blocks the security module
//! needs on top of the token:
//!
//! - [`curve`] -- secp256k1 domain parameters and big-endian scalar helpers
//! - [`signature`] -- DER ECDSA signature decoding and low-S canonicalization
//! - [`point`] -- `(X, Y)` curve-point codec with on-curve validation
//!
//! Everything here is pure computation over byte arrays plus
//! `bitcoin::secp256k1` point types. No token interaction, no I/O.

pub mod curve;
pub mod point;
pub mod signature;

pub use curve::CurveParameters;
pub use point::{PointError, PublicKeyPoint};
pub use signature::{EcdsaSignature, SignatureError, decode_der_signature};
