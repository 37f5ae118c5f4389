//! Security-module configuration.
//!
//! The host's option-parsing layer builds a [`ModuleConfig`] before the
//! adapter is constructed; the adapter only reads it.

use std::path::PathBuf;

use crate::SecurityModuleError;

/// Externally supplied configuration for the token-backed security module.
///
/// Immutable once constructed. All three fields are required; validation
/// runs as the first step of adapter construction, before any token
/// interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleConfig {
    /// Locator of the token provider's own configuration. Format and
    /// semantics belong to the provider; passed through opaquely.
    pub token_config_path: PathBuf,

    /// Path to a file holding the token access secret (PIN), read once as
    /// text.
    pub token_secret_path: PathBuf,

    /// Alias of the key entry inside the token's keystore.
    pub key_alias: String,
}

impl ModuleConfig {
    /// Bundles the three configuration values.
    pub fn new(
        token_config_path: impl Into<PathBuf>,
        token_secret_path: impl Into<PathBuf>,
        key_alias: impl Into<String>,
    ) -> Self {
        Self {
            token_config_path: token_config_path.into(),
            token_secret_path: token_secret_path.into(),
            key_alias: key_alias.into(),
        }
    }

    /// Checks that every field is present.
    ///
    /// # Errors
    ///
    /// [`SecurityModuleError::Configuration`] if any field is empty.
    pub fn validate(&self) -> Result<(), SecurityModuleError> {
        if self.token_config_path.as_os_str().is_empty()
            || self.token_secret_path.as_os_str().is_empty()
            || self.key_alias.is_empty()
        {
            return Err(SecurityModuleError::Configuration);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_config_validates() {
        let config = ModuleConfig::new("/etc/token.json", "/etc/token.pin", "node-key");
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn each_missing_field_rejected() {
        let cases = [
            ModuleConfig::new("", "/etc/token.pin", "node-key"),
            ModuleConfig::new("/etc/token.json", "", "node-key"),
            ModuleConfig::new("/etc/token.json", "/etc/token.pin", ""),
        ];
        for config in cases {
            assert_eq!(config.validate(), Err(SecurityModuleError::Configuration));
        }
    }
}
