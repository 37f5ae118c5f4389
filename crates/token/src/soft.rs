//! File-backed software token.
//!
//! [`SoftToken`] models a SoftHSM-style token entirely in software: a JSON
//! provider configuration names the token and points at a JSON keystore
//! file holding PIN-protected key entries. Deployments without hardware and
//! the test suite both use it, exercising the same adapter code path as a
//! hardware provider.
//!
//! # File formats
//!
//! Provider configuration (the opaque "token config" the host passes
//! through):
//!
//! ```json
//! { "label": "dev-token", "keystore": "/var/lib/node/keystore.json" }
//! ```
//!
//! Keystore:
//!
//! ```json
//! {
//!   "pin": "usr0001",
//!   "keys": {
//!     "node-key": { "private_key": "<hex, 32 bytes>" },
//!     "peer-cert": { "public_key": "<hex, 65 bytes uncompressed>" }
//!   }
//! }
//! ```
//!
//! An entry may carry a private key, a public point, or both; the public
//! point of a private-only entry is derived on demand.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use bitcoin::secp256k1::{All, Message, PublicKey, Scalar, Secp256k1, SecretKey};
use serde::Deserialize;
use tracing::debug;

use secmod_crypto::PublicKeyPoint;

use crate::{PrivateKeyHandle, TokenError, TokenProvider};

// ---------------------------------------------------------------------------
// On-disk formats
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ProviderConfig {
    label: String,
    keystore: PathBuf,
}

#[derive(Deserialize)]
struct KeystoreFile {
    pin: String,
    #[serde(default)]
    keys: HashMap<String, KeyEntryFile>,
}

#[derive(Deserialize)]
struct KeyEntryFile {
    #[serde(default)]
    private_key: Option<String>,
    #[serde(default)]
    public_key: Option<String>,
}

// ---------------------------------------------------------------------------
// SoftToken
// ---------------------------------------------------------------------------

/// A key entry resolved from the keystore file.
///
/// The raw public bytes stay unvalidated until the entry is resolved:
/// a corrupt public entry surfaces at resolution time, not at load time.
struct KeyEntry {
    private: Option<PrivateKeyHandle>,
    public: Option<Vec<u8>>,
}

/// File-backed software token provider.
pub struct SoftToken {
    label: String,
    pin: String,
    authenticated: bool,
    entries: HashMap<String, KeyEntry>,
    keys: HashMap<PrivateKeyHandle, SecretKey>,
    secp: Secp256k1<All>,
}

impl SoftToken {
    /// Loads the provider from its configuration file.
    ///
    /// # Errors
    ///
    /// [`TokenError::InvalidProviderConfig`] if the configuration file or
    /// any key entry in the keystore is malformed;
    /// [`TokenError::ProviderUnavailable`] if the keystore file named by the
    /// configuration cannot be read or parsed.
    pub fn load(config_path: &Path) -> Result<Self, TokenError> {
        let raw = fs::read_to_string(config_path)
            .map_err(|_| TokenError::InvalidProviderConfig)?;
        let config: ProviderConfig =
            serde_json::from_str(&raw).map_err(|_| TokenError::InvalidProviderConfig)?;

        let keystore_raw = fs::read_to_string(&config.keystore)
            .map_err(|_| TokenError::ProviderUnavailable)?;
        let keystore: KeystoreFile =
            serde_json::from_str(&keystore_raw).map_err(|_| TokenError::ProviderUnavailable)?;

        let mut entries = HashMap::new();
        let mut keys = HashMap::new();
        let mut next_handle = 1u64;

        for (alias, entry) in keystore.keys {
            if entry.private_key.is_none() && entry.public_key.is_none() {
                return Err(TokenError::InvalidProviderConfig);
            }

            let private = match entry.private_key {
                Some(hex_key) => {
                    let bytes =
                        hex::decode(hex_key).map_err(|_| TokenError::InvalidProviderConfig)?;
                    let secret = SecretKey::from_slice(&bytes)
                        .map_err(|_| TokenError::InvalidProviderConfig)?;
                    let handle = PrivateKeyHandle::from_raw(next_handle);
                    next_handle += 1;
                    keys.insert(handle, secret);
                    Some(handle)
                }
                None => None,
            };

            let public = match entry.public_key {
                Some(hex_point) => {
                    Some(hex::decode(hex_point).map_err(|_| TokenError::InvalidProviderConfig)?)
                }
                None => None,
            };

            entries.insert(alias, KeyEntry { private, public });
        }

        debug!(label = %config.label, entries = entries.len(), "soft token loaded");

        Ok(Self {
            label: config.label,
            pin: keystore.pin,
            authenticated: false,
            entries,
            keys,
            secp: Secp256k1::new(),
        })
    }

    /// The token label from the provider configuration.
    pub fn label(&self) -> &str {
        &self.label
    }

    fn secret_for(&self, key: PrivateKeyHandle) -> Result<&SecretKey, TokenError> {
        if !self.authenticated {
            return Err(TokenError::SessionNotOpen);
        }
        self.keys.get(&key).ok_or(TokenError::KeyNotFound)
    }
}

impl TokenProvider for SoftToken {
    fn login(&mut self, secret: &str) -> Result<(), TokenError> {
        if secret != self.pin {
            return Err(TokenError::PinRejected);
        }
        self.authenticated = true;
        debug!(label = %self.label, "soft token session authenticated");
        Ok(())
    }

    fn private_key(&self, alias: &str) -> Result<PrivateKeyHandle, TokenError> {
        if !self.authenticated {
            return Err(TokenError::SessionNotOpen);
        }
        let entry = self.entries.get(alias).ok_or(TokenError::KeyNotFound)?;
        entry.private.ok_or(TokenError::NotAPrivateKey)
    }

    fn public_point(&self, alias: &str) -> Result<PublicKeyPoint, TokenError> {
        // Public entries are readable without login, as with PKCS#11
        // public objects.
        let entry = self.entries.get(alias).ok_or(TokenError::KeyNotFound)?;

        if let Some(raw) = &entry.public {
            let point = PublicKeyPoint::from_uncompressed(raw)
                .map_err(|_| TokenError::NotAnEcPoint)?;
            // Reject coordinates that fail the curve equation.
            point.to_public_key().map_err(|_| TokenError::NotAnEcPoint)?;
            return Ok(point);
        }

        let handle = entry.private.ok_or(TokenError::KeyNotFound)?;
        let secret = self.keys.get(&handle).ok_or(TokenError::KeyNotFound)?;
        let public = PublicKey::from_secret_key(&self.secp, secret);
        Ok(PublicKeyPoint::from_public_key(&public))
    }

    fn sign(&self, key: PrivateKeyHandle, digest: &[u8; 32]) -> Result<Vec<u8>, TokenError> {
        let secret = self.secret_for(key)?;
        let message = Message::from_digest(*digest);
        let signature = self.secp.sign_ecdsa(&message, secret);
        Ok(signature.serialize_der().to_vec())
    }

    fn agree_key(
        &self,
        key: PrivateKeyHandle,
        party_point: &PublicKeyPoint,
    ) -> Result<[u8; 32], TokenError> {
        let secret = *self.secret_for(key)?;
        let party = party_point
            .to_public_key()
            .map_err(|_| TokenError::AgreementFailed)?;
        let shared = party
            .mul_tweak(&self.secp, &Scalar::from(secret))
            .map_err(|_| TokenError::AgreementFailed)?;

        let mut out = [0u8; 32];
        out.copy_from_slice(&shared.serialize_uncompressed()[1..33]);
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::ecdsa::Signature;

    const PIN: &str = "usr0001";
    const ALIAS: &str = "node-key";

    /// Writes a provider config + keystore pair and returns the config path.
    fn write_token(dir: &tempfile::TempDir, keys_json: &str) -> PathBuf {
        let keystore_path = dir.path().join("keystore.json");
        fs::write(
            &keystore_path,
            format!(r#"{{ "pin": "{PIN}", "keys": {keys_json} }}"#),
        )
        .unwrap();

        let config_path = dir.path().join("token.json");
        fs::write(
            &config_path,
            format!(
                r#"{{ "label": "test-token", "keystore": "{}" }}"#,
                keystore_path.display()
            ),
        )
        .unwrap();
        config_path
    }

    fn private_entry(secret: &[u8; 32]) -> String {
        format!(r#"{{ "{ALIAS}": {{ "private_key": "{}" }} }}"#, hex::encode(secret))
    }

    fn logged_in_token(dir: &tempfile::TempDir, keys_json: &str) -> SoftToken {
        let config = write_token(dir, keys_json);
        let mut token = SoftToken::load(&config).expect("load soft token");
        token.login(PIN).expect("correct PIN");
        token
    }

    #[test]
    fn load_and_sign_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let token = logged_in_token(&dir, &private_entry(&[0xcd; 32]));

        let handle = token.private_key(ALIAS).unwrap();
        let digest = [0xab; 32];
        let der = token.sign(handle, &digest).unwrap();

        // Independently verify against the resolved public point.
        let secp = Secp256k1::new();
        let point = token.public_point(ALIAS).unwrap();
        let public = point.to_public_key().unwrap();
        let signature = Signature::from_der(&der).expect("token emits valid DER");
        secp.verify_ecdsa(&Message::from_digest(digest), &signature, &public)
            .expect("signature must verify");
    }

    #[test]
    fn wrong_pin_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_token(&dir, &private_entry(&[0xcd; 32]));
        let mut token = SoftToken::load(&config).unwrap();
        assert_eq!(token.login("wrong"), Err(TokenError::PinRejected));
    }

    #[test]
    fn operations_require_login() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_token(&dir, &private_entry(&[0xcd; 32]));
        let token = SoftToken::load(&config).unwrap();
        assert_eq!(token.private_key(ALIAS), Err(TokenError::SessionNotOpen));
        assert_eq!(
            token.sign(PrivateKeyHandle::from_raw(1), &[0u8; 32]),
            Err(TokenError::SessionNotOpen)
        );
    }

    #[test]
    fn missing_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(
            SoftToken::load(&missing),
            Err(TokenError::InvalidProviderConfig)
        ));
    }

    #[test]
    fn malformed_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("token.json");
        fs::write(&config, "not json").unwrap();
        assert!(matches!(
            SoftToken::load(&config),
            Err(TokenError::InvalidProviderConfig)
        ));
    }

    #[test]
    fn missing_keystore_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("token.json");
        fs::write(
            &config,
            r#"{ "label": "t", "keystore": "/nonexistent/keystore.json" }"#,
        )
        .unwrap();
        assert!(matches!(
            SoftToken::load(&config),
            Err(TokenError::ProviderUnavailable)
        ));
    }

    #[test]
    fn unknown_alias_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let token = logged_in_token(&dir, &private_entry(&[0xcd; 32]));
        assert_eq!(token.private_key("other"), Err(TokenError::KeyNotFound));
        assert_eq!(
            token.public_point("other").unwrap_err(),
            TokenError::KeyNotFound
        );
    }

    #[test]
    fn certificate_only_entry_is_not_a_private_key() {
        let dir = tempfile::tempdir().unwrap();
        let secp = Secp256k1::new();
        let public = PublicKey::from_secret_key(
            &secp,
            &SecretKey::from_slice(&[0xcd; 32]).unwrap(),
        );
        let keys = format!(
            r#"{{ "{ALIAS}": {{ "public_key": "{}" }} }}"#,
            hex::encode(public.serialize_uncompressed())
        );
        let token = logged_in_token(&dir, &keys);

        assert_eq!(token.private_key(ALIAS), Err(TokenError::NotAPrivateKey));
        assert_eq!(
            token.public_point(ALIAS).unwrap(),
            PublicKeyPoint::from_public_key(&public)
        );
    }

    #[test]
    fn off_curve_public_entry_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut bogus = [0x01u8; 65];
        bogus[0] = 0x04;
        let keys = format!(
            r#"{{ "{ALIAS}": {{ "public_key": "{}" }} }}"#,
            hex::encode(bogus)
        );
        let token = logged_in_token(&dir, &keys);
        assert_eq!(token.public_point(ALIAS), Err(TokenError::NotAnEcPoint));
    }

    #[test]
    fn entry_without_any_key_material_rejected_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_token(&dir, &format!(r#"{{ "{ALIAS}": {{}} }}"#));
        assert!(matches!(
            SoftToken::load(&config),
            Err(TokenError::InvalidProviderConfig)
        ));
    }

    #[test]
    fn derived_public_point_matches_private_key() {
        let dir = tempfile::tempdir().unwrap();
        let token = logged_in_token(&dir, &private_entry(&[0xcd; 32]));

        let secp = Secp256k1::new();
        let expected = PublicKey::from_secret_key(
            &secp,
            &SecretKey::from_slice(&[0xcd; 32]).unwrap(),
        );
        assert_eq!(
            token.public_point(ALIAS).unwrap(),
            PublicKeyPoint::from_public_key(&expected)
        );
    }

    #[test]
    fn ecdh_agrees_in_both_directions() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let token_a = logged_in_token(&dir_a, &private_entry(&[0x11; 32]));
        let token_b = logged_in_token(&dir_b, &private_entry(&[0x22; 32]));

        let point_a = token_a.public_point(ALIAS).unwrap();
        let point_b = token_b.public_point(ALIAS).unwrap();

        let secret_ab = token_a
            .agree_key(token_a.private_key(ALIAS).unwrap(), &point_b)
            .unwrap();
        let secret_ba = token_b
            .agree_key(token_b.private_key(ALIAS).unwrap(), &point_a)
            .unwrap();

        assert_eq!(secret_ab, secret_ba);
        assert_ne!(secret_ab, [0u8; 32]);
    }

    #[test]
    fn ecdh_rejects_off_curve_party_point() {
        let dir = tempfile::tempdir().unwrap();
        let token = logged_in_token(&dir, &private_entry(&[0xcd; 32]));
        let handle = token.private_key(ALIAS).unwrap();
        let bogus = PublicKeyPoint::new([0x01; 32], [0x02; 32]);
        assert_eq!(
            token.agree_key(handle, &bogus),
            Err(TokenError::AgreementFailed)
        );
    }
}
