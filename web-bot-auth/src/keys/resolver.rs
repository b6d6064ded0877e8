//! Private key resolution.
//!
//! [`KeyResolver`] maps a key identifier to the private key that signs for it.
//! The signer only depends on the trait, so file-backed, registry-backed or
//! secret-store-backed resolvers can be swapped without touching it.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    path::PathBuf,
};

use ed25519_dalek::SigningKey;
use tracing::{debug, instrument};

use crate::{
    error::{Result, SignerError},
    keys::loader::{load_keypair, public_identifier},
};

/// Resolves a key identifier to an Ed25519 private key.
///
/// Implementations must be reentrant: the signer may call them from several
/// threads at once.
pub trait KeyResolver: Send + Sync + fmt::Debug {
    /// Returns the private key for `key_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::KeyResolution`] if no key is available for
    /// `key_id`, or a key loading error if the backing material is unreadable.
    fn resolve_private_key(&self, key_id: &str) -> Result<SigningKey>;
}

/// Resolver backed by a single key file.
///
/// The file is read on every call. Only the identifier of that key resolves.
#[derive(Debug, Clone)]
pub struct StaticKeyResolver {
    path: PathBuf,
}

impl StaticKeyResolver {
    /// Creates a resolver for the key file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Key file path.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl KeyResolver for StaticKeyResolver {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn resolve_private_key(&self, key_id: &str) -> Result<SigningKey> {
        let key = load_keypair(&self.path)?;
        let actual = public_identifier(&key.verifying_key());
        if actual != key_id {
            return Err(SignerError::KeyResolution {
                key_id: key_id.to_owned(),
                reason: format!("{} holds key {actual}", self.path.display()),
            });
        }
        Ok(key)
    }
}

/// Resolver holding keys in memory, indexed by key identifier.
#[derive(Default, Clone)]
pub struct InMemoryKeyResolver {
    keys: HashMap<String, SigningKey>,
}

impl fmt::Debug for InMemoryKeyResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryKeyResolver")
            .field("key_ids", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl InMemoryKeyResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `key` under its own thumbprint and returns that identifier.
    pub fn add(&mut self, key: SigningKey) -> String {
        let key_id = public_identifier(&key.verifying_key());
        self.keys.insert(key_id.clone(), key);
        key_id
    }

    /// Adds `key` under its thumbprint, builder style.
    #[must_use]
    pub fn with_key(mut self, key: SigningKey) -> Self {
        self.add(key);
        self
    }

    /// Number of held keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if no keys are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl KeyResolver for InMemoryKeyResolver {
    fn resolve_private_key(&self, key_id: &str) -> Result<SigningKey> {
        self.keys.get(key_id).cloned().ok_or_else(|| SignerError::KeyResolution {
            key_id: key_id.to_owned(),
            reason: "unknown key identifier".to_owned(),
        })
    }
}

/// Resolver backed by the agent registry (agent name to key file).
///
/// `key_id` may be either a registered agent name or the thumbprint of one of
/// the registered key files.
#[derive(Debug, Clone, Default)]
pub struct AgentKeyResolver {
    agents: BTreeMap<String, PathBuf>,
}

impl AgentKeyResolver {
    /// Creates a resolver over the given agent registry.
    #[must_use]
    pub fn new(agents: BTreeMap<String, PathBuf>) -> Self {
        Self { agents }
    }

    /// Registers an agent key file.
    #[must_use]
    pub fn with_agent(mut self, agent_name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.agents.insert(agent_name.into(), path.into());
        self
    }

    /// Registered agents and their key files, ordered by name.
    pub fn agents(&self) -> impl Iterator<Item = (&str, &std::path::Path)> {
        self.agents.iter().map(|(name, path)| (name.as_str(), path.as_path()))
    }
}

impl KeyResolver for AgentKeyResolver {
    #[instrument(skip(self), fields(agents = self.agents.len()))]
    fn resolve_private_key(&self, key_id: &str) -> Result<SigningKey> {
        if let Some(path) = self.agents.get(key_id) {
            debug!(agent = key_id, "resolved key by agent name");
            return load_keypair(path);
        }

        for (agent, path) in &self.agents {
            // Unreadable entries are skipped; they may belong to other deployments.
            let Ok(key) = load_keypair(path) else {
                debug!(agent = %agent, "skipping unreadable key file");
                continue;
            };
            if public_identifier(&key.verifying_key()) == key_id {
                debug!(agent = %agent, "resolved key by thumbprint");
                return Ok(key);
            }
        }

        Err(SignerError::KeyResolution {
            key_id: key_id.to_owned(),
            reason: "no registered agent holds this key".to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::keys::loader::write_private_jwk;

    #[test]
    fn test_in_memory_resolver() {
        let key = SigningKey::from_bytes(&[1u8; 32]);
        let mut resolver = InMemoryKeyResolver::new();
        let key_id = resolver.add(key.clone());

        assert_eq!(resolver.resolve_private_key(&key_id).unwrap().to_bytes(), key.to_bytes());
        assert!(matches!(
            resolver.resolve_private_key("unknown"),
            Err(SignerError::KeyResolution { .. })
        ));
    }

    #[test]
    fn test_in_memory_debug_hides_keys() {
        let resolver = InMemoryKeyResolver::new().with_key(SigningKey::from_bytes(&[1u8; 32]));
        let debug = format!("{resolver:?}");
        assert!(debug.contains("key_ids"));
        assert!(!debug.contains("SigningKey"));
    }

    #[test]
    fn test_static_resolver_checks_key_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.jwk");
        let key = SigningKey::from_bytes(&[2u8; 32]);
        write_private_jwk(&path, &key).unwrap();
        let key_id = public_identifier(&key.verifying_key());

        let resolver = StaticKeyResolver::new(&path);
        assert_eq!(resolver.resolve_private_key(&key_id).unwrap().to_bytes(), key.to_bytes());
        assert!(matches!(
            resolver.resolve_private_key("other"),
            Err(SignerError::KeyResolution { .. })
        ));
    }

    #[test]
    fn test_static_resolver_missing_file() {
        let resolver = StaticKeyResolver::new("/nonexistent/key.jwk");
        assert!(matches!(resolver.resolve_private_key("x"), Err(SignerError::FileNotFound(_))));
    }

    #[test]
    fn test_agent_resolver_by_name_and_thumbprint() {
        let dir = tempfile::tempdir().unwrap();
        let weather = SigningKey::from_bytes(&[3u8; 32]);
        let trip = SigningKey::from_bytes(&[4u8; 32]);
        write_private_jwk(&dir.path().join("weather.jwk"), &weather).unwrap();
        write_private_jwk(&dir.path().join("trip.jwk"), &trip).unwrap();

        let resolver = AgentKeyResolver::default()
            .with_agent("weather_agent", dir.path().join("weather.jwk"))
            .with_agent("trip_agent", dir.path().join("trip.jwk"))
            .with_agent("broken_agent", dir.path().join("missing.jwk"));

        let by_name = resolver.resolve_private_key("trip_agent").unwrap();
        assert_eq!(by_name.to_bytes(), trip.to_bytes());

        let weather_id = public_identifier(&weather.verifying_key());
        let by_id = resolver.resolve_private_key(&weather_id).unwrap();
        assert_eq!(by_id.to_bytes(), weather.to_bytes());

        assert!(matches!(
            resolver.resolve_private_key("nobody"),
            Err(SignerError::KeyResolution { .. })
        ));
    }

    #[test]
    fn test_resolver_is_object_safe_and_shareable() {
        let resolver: Arc<dyn KeyResolver> =
            Arc::new(InMemoryKeyResolver::new().with_key(SigningKey::from_bytes(&[5u8; 32])));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                std::thread::spawn(move || resolver.resolve_private_key("missing").is_err())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
