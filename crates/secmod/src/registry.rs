//! Name-to-factory registry for security modules.
//!
//! The host resolves its security module by a string identifier at
//! startup. Plugins register a factory under their module name during
//! their registration phase; the host calls [`SecurityModuleRegistry::resolve`]
//! once, which runs the factory and surfaces its construction result.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use tracing::info;

use crate::{SecurityModule, SecurityModuleError};

/// Factory producing a ready security module.
///
/// Construction is deferred until the host resolves the name, matching the
/// lazy registration flow: a registered module whose token is absent only
/// fails if it is actually selected.
pub type SecurityModuleFactory =
    Box<dyn Fn() -> Result<Arc<dyn SecurityModule>, SecurityModuleError> + Send + Sync>;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors from registry operations.
#[derive(Debug)]
pub enum RegistryError {
    /// A factory is already registered under this name.
    DuplicateName,
    /// No factory is registered under this name.
    UnknownModule,
    /// The factory ran and module construction failed.
    Construction(SecurityModuleError),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateName => write!(f, "security module name already registered"),
            Self::UnknownModule => write!(f, "no security module registered under this name"),
            Self::Construction(e) => write!(f, "security module construction failed: {e}"),
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Construction(e) => Some(e),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// SecurityModuleRegistry
// ---------------------------------------------------------------------------

/// In-memory registry mapping module names to factories.
pub struct SecurityModuleRegistry {
    factories: RwLock<HashMap<String, SecurityModuleFactory>>,
}

impl SecurityModuleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a factory under `name`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateName`] if the name is taken.
    pub fn register(
        &self,
        name: impl Into<String>,
        factory: SecurityModuleFactory,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let mut map = self.factories.write().expect("registry lock poisoned");
        if map.contains_key(&name) {
            return Err(RegistryError::DuplicateName);
        }
        info!(module = %name, "security module registered");
        map.insert(name, factory);
        Ok(())
    }

    /// Resolves `name`, running its factory.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownModule`] for an unregistered name;
    /// [`RegistryError::Construction`] if the factory fails.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn SecurityModule>, RegistryError> {
        let map = self.factories.read().expect("registry lock poisoned");
        let factory = map.get(name).ok_or(RegistryError::UnknownModule)?;
        factory().map_err(RegistryError::Construction)
    }

    /// Registered module names, for diagnostics.
    pub fn names(&self) -> Vec<String> {
        let map = self.factories.read().expect("registry lock poisoned");
        map.keys().cloned().collect()
    }
}

impl Default for SecurityModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use secmod_crypto::{EcdsaSignature, PublicKeyPoint};
    use crate::SharedSecret;

    /// Minimal stand-in module: fixed public point, everything else errors.
    struct StubModule;

    impl SecurityModule for StubModule {
        fn sign(&self, _digest: &[u8; 32]) -> Result<EcdsaSignature, SecurityModuleError> {
            Err(SecurityModuleError::SignatureFormat)
        }

        fn public_key(&self) -> PublicKeyPoint {
            PublicKeyPoint::new([0x01; 32], [0x02; 32])
        }

        fn calculate_ecdh_key_agreement(
            &self,
            _party_key: &PublicKeyPoint,
        ) -> Result<SharedSecret, SecurityModuleError> {
            Err(SecurityModuleError::KeyAgreement)
        }
    }

    fn stub_factory() -> SecurityModuleFactory {
        Box::new(|| Ok(Arc::new(StubModule)))
    }

    #[test]
    fn register_and_resolve() {
        let registry = SecurityModuleRegistry::new();
        registry.register("pkcs11-softhsm", stub_factory()).unwrap();

        let module = registry.resolve("pkcs11-softhsm").unwrap();
        assert_eq!(module.public_key(), PublicKeyPoint::new([0x01; 32], [0x02; 32]));
    }

    #[test]
    fn unknown_name_rejected() {
        let registry = SecurityModuleRegistry::new();
        assert!(matches!(
            registry.resolve("missing"),
            Err(RegistryError::UnknownModule)
        ));
    }

    #[test]
    fn duplicate_name_rejected() {
        let registry = SecurityModuleRegistry::new();
        registry.register("pkcs11-softhsm", stub_factory()).unwrap();
        assert!(matches!(
            registry.register("pkcs11-softhsm", stub_factory()),
            Err(RegistryError::DuplicateName)
        ));
    }

    #[test]
    fn factory_failure_surfaces_construction_error() {
        let registry = SecurityModuleRegistry::new();
        registry
            .register(
                "broken",
                Box::new(|| Err(SecurityModuleError::ProviderInit)),
            )
            .unwrap();
        assert!(matches!(
            registry.resolve("broken"),
            Err(RegistryError::Construction(SecurityModuleError::ProviderInit))
        ));
    }

    #[test]
    fn names_lists_registrations() {
        let registry = SecurityModuleRegistry::new();
        registry.register("a", stub_factory()).unwrap();
        registry.register("b", stub_factory()).unwrap();
        let mut names = registry.names();
        names.sort();
        assert_eq!(names, ["a", "b"]);
    }
}
