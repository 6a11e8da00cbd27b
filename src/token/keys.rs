//! Ed25519 signing keys and the registry of keys trusted for verification.
//!
//! Exactly one key signs new tokens. Keys replaced by rotation stay in the
//! registry so tokens they signed keep validating until they are purged.

use super::error::KeyError;
use super::jwks::{self, Jwks};
use ed25519_dalek::{SECRET_KEY_LENGTH, Signature, Signer, SigningKey, VerifyingKey};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use time::Duration;
use tracing::{info, instrument};
use zeroize::Zeroizing;

/// Bytes of the public key digest that make up a KID.
const KID_DIGEST_BYTES: usize = 8;

/// Derive the key id: lowercase hex of the first 8 bytes of SHA-256(public key).
#[must_use]
pub fn generate_kid(verifying_key: &VerifyingKey) -> String {
    let digest = Sha256::digest(verifying_key.as_bytes());
    hex::encode(&digest[..KID_DIGEST_BYTES])
}

/// Generate a fresh key pair from the operating system random source.
///
/// # Errors
///
/// Returns `KeyError::Crypto` if the random source fails.
pub fn generate_key_pair() -> Result<KeyPair, KeyError> {
    let mut seed = Zeroizing::new([0u8; SECRET_KEY_LENGTH]);
    OsRng
        .try_fill_bytes(&mut seed[..])
        .map_err(|e| KeyError::Crypto(format!("secure random source unavailable: {e}")))?;
    Ok(KeyPair::from_seed(&seed))
}

pub struct KeyPair {
    kid: String,
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Build a key pair from a 32 byte Ed25519 seed.
    #[must_use]
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(seed))
    }

    #[must_use]
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        Self {
            kid: generate_kid(&verifying_key),
            signing_key,
            verifying_key,
        }
    }

    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    #[must_use]
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    pub(crate) fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }
}

// Never print the secret half.
impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("kid", &self.kid)
            .field("verifying_key", &hex::encode(self.verifying_key.as_bytes()))
            .finish_non_exhaustive()
    }
}

/// An immutable view of the trusted keys.
///
/// The current key is always present in `keys` and never in `retired`.
#[derive(Debug, Clone)]
pub struct KeyRegistry {
    current: Arc<KeyPair>,
    keys: BTreeMap<String, Arc<KeyPair>>,
    retired: BTreeMap<String, i64>,
}

impl KeyRegistry {
    fn new(current: KeyPair) -> Self {
        let current = Arc::new(current);
        let mut keys = BTreeMap::new();
        keys.insert(current.kid().to_string(), Arc::clone(&current));
        Self {
            current,
            keys,
            retired: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn current(&self) -> &Arc<KeyPair> {
        &self.current
    }

    #[must_use]
    pub fn current_kid(&self) -> &str {
        self.current.kid()
    }

    #[must_use]
    pub fn get(&self, kid: &str) -> Option<&Arc<KeyPair>> {
        self.keys.get(kid)
    }

    /// All trusted keys, current and retired, ordered by KID.
    pub fn keys(&self) -> impl Iterator<Item = &Arc<KeyPair>> {
        self.keys.values()
    }

    /// Unix time at which `kid` was retired, if it has been.
    #[must_use]
    pub fn retired_at(&self, kid: &str) -> Option<i64> {
        self.retired.get(kid).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Shared owner of the key registry.
///
/// Cloning is cheap and every clone sees the same registry. Readers take a
/// snapshot and never block writers for longer than a pointer copy; writers
/// build the next registry and swap it in whole.
#[derive(Debug, Clone)]
pub struct KeyManager {
    registry: Arc<RwLock<Arc<KeyRegistry>>>,
}

impl KeyManager {
    /// Create a manager with one freshly generated current key.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::Crypto` if key generation fails.
    pub fn initialize() -> Result<Self, KeyError> {
        let key_pair = generate_key_pair()?;
        info!(kid = key_pair.kid(), "Initialized signing key");
        Ok(Self::from_key_pair(key_pair))
    }

    #[must_use]
    pub fn from_key_pair(key_pair: KeyPair) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Arc::new(KeyRegistry::new(key_pair)))),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<KeyRegistry> {
        // The guarded value is a single pointer, a panicking writer cannot leave it torn.
        let guard = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    #[must_use]
    pub fn current(&self) -> Arc<KeyPair> {
        Arc::clone(self.snapshot().current())
    }

    #[must_use]
    pub fn current_kid(&self) -> String {
        self.snapshot().current_kid().to_string()
    }

    /// Resolve a KID to a trusted key. `None` means the KID is unknown.
    #[must_use]
    pub fn lookup(&self, kid: &str) -> Option<Arc<KeyPair>> {
        self.snapshot().get(kid).cloned()
    }

    /// Public keys for every trusted KID.
    #[must_use]
    pub fn jwks(&self) -> Jwks {
        jwks::export(&self.snapshot())
    }

    /// Make a newly generated key current and retire the previous one at `now`.
    ///
    /// The previous key stays trusted for verification. Returns the new KID.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::Crypto` if key generation fails.
    #[instrument(skip(self))]
    pub fn rotate(&self, now: i64) -> Result<String, KeyError> {
        let next = Arc::new(generate_key_pair()?);
        let kid = next.kid().to_string();

        let previous = self.update(|registry| -> Result<_, KeyError> {
            let previous = registry.current.kid().to_string();
            registry.retired.insert(previous.clone(), now);
            registry.keys.insert(kid.clone(), Arc::clone(&next));
            registry.current = next;
            Ok(previous)
        })?;

        info!(kid = %kid, previous = %previous, "Rotated signing key");
        Ok(kid)
    }

    /// Mark a non-current key retired at `now`. Retiring twice keeps the first time.
    ///
    /// # Errors
    ///
    /// `KeyError::CurrentKey` for the current KID, `KeyError::UnknownKey` if
    /// `kid` is not trusted.
    #[instrument(skip(self))]
    pub fn retire(&self, kid: &str, now: i64) -> Result<(), KeyError> {
        self.update(|registry| {
            if registry.current.kid() == kid {
                return Err(KeyError::CurrentKey(kid.to_string()));
            }
            if !registry.keys.contains_key(kid) {
                return Err(KeyError::UnknownKey(kid.to_string()));
            }
            registry.retired.entry(kid.to_string()).or_insert(now);
            Ok(())
        })?;
        info!(kid, "Retired signing key");
        Ok(())
    }

    /// Drop keys retired at least `max_token_ttl` before `now`.
    ///
    /// Once every token a key could have signed has expired, the key is no
    /// longer needed for verification. A negative TTL is treated as zero.
    /// Returns the purged KIDs.
    #[instrument(skip(self))]
    pub fn purge_retired(&self, now: i64, max_token_ttl: Duration) -> Vec<String> {
        let ttl = max_token_ttl.whole_seconds().max(0);

        let purged = self
            .update(|registry| -> Result<_, Infallible> {
                let expired: Vec<String> = registry
                    .retired
                    .iter()
                    .filter(|(_, retired_at)| now.saturating_sub(**retired_at) >= ttl)
                    .map(|(kid, _)| kid.clone())
                    .collect();
                for kid in &expired {
                    registry.retired.remove(kid);
                    registry.keys.remove(kid);
                }
                Ok(expired)
            })
            .unwrap_or_else(|never| match never {});

        if !purged.is_empty() {
            info!(count = purged.len(), kids = ?purged, "Purged retired signing keys");
        }
        purged
    }

    // The registry is swapped only when `apply` succeeds.
    fn update<T, E>(
        &self,
        apply: impl FnOnce(&mut KeyRegistry) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut guard = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = KeyRegistry::clone(&guard);
        let out = apply(&mut next)?;
        *guard = Arc::new(next);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn kid_is_sha256_prefix_of_public_key() {
        let key_pair = KeyPair::from_seed(&[9u8; SECRET_KEY_LENGTH]);
        let digest = Sha256::digest(key_pair.verifying_key().as_bytes());

        assert_eq!(key_pair.kid().len(), 16);
        assert_eq!(key_pair.kid(), hex::encode(&digest[..8]));
        assert!(key_pair.kid().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn kid_is_deterministic_and_distinct() -> Result<(), KeyError> {
        let a = KeyPair::from_seed(&[1u8; SECRET_KEY_LENGTH]);
        let b = KeyPair::from_seed(&[1u8; SECRET_KEY_LENGTH]);
        assert_eq!(a.kid(), b.kid());

        let first = generate_key_pair()?;
        let second = generate_key_pair()?;
        assert_ne!(first.kid(), second.kid());
        Ok(())
    }

    #[test]
    fn debug_omits_secret() {
        let seed = [0x5au8; SECRET_KEY_LENGTH];
        let key_pair = KeyPair::from_seed(&seed);
        let rendered = format!("{key_pair:?}");
        assert!(rendered.contains(key_pair.kid()));
        assert!(!rendered.contains(&hex::encode(seed)));
    }

    #[test]
    fn initialize_has_one_current_key() -> Result<(), KeyError> {
        let manager = KeyManager::initialize()?;
        let snapshot = manager.snapshot();

        assert_eq!(snapshot.len(), 1);
        assert!(manager.lookup(&manager.current_kid()).is_some());
        assert!(snapshot.retired_at(snapshot.current_kid()).is_none());
        assert!(manager.lookup("0000000000000000").is_none());
        Ok(())
    }

    #[test]
    fn rotate_keeps_previous_key_trusted() -> Result<(), KeyError> {
        let manager = KeyManager::initialize()?;
        let first = manager.current_kid();

        let second = manager.rotate(NOW)?;
        assert_ne!(first, second);
        assert_eq!(manager.current_kid(), second);
        assert!(manager.lookup(&first).is_some());

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.retired_at(&first), Some(NOW));
        assert_eq!(snapshot.retired_at(&second), None);
        Ok(())
    }

    #[test]
    fn snapshots_are_not_affected_by_later_rotation() -> Result<(), KeyError> {
        let manager = KeyManager::initialize()?;
        let before = manager.snapshot();
        manager.rotate(NOW)?;

        assert_eq!(before.len(), 1);
        assert_eq!(manager.snapshot().len(), 2);
        Ok(())
    }

    #[test]
    fn clones_share_the_registry() -> Result<(), KeyError> {
        let manager = KeyManager::initialize()?;
        let other = manager.clone();
        let kid = other.rotate(NOW)?;
        assert_eq!(manager.current_kid(), kid);
        Ok(())
    }

    #[test]
    fn retire_rejects_current_and_unknown() -> Result<(), KeyError> {
        let manager = KeyManager::initialize()?;
        let current = manager.current_kid();

        assert!(matches!(
            manager.retire(&current, NOW),
            Err(KeyError::CurrentKey(kid)) if kid == current
        ));
        assert!(matches!(
            manager.retire("ffffffffffffffff", NOW),
            Err(KeyError::UnknownKey(_))
        ));
        Ok(())
    }

    #[test]
    fn retire_keeps_first_timestamp() -> Result<(), KeyError> {
        let manager = KeyManager::initialize()?;
        let first = manager.current_kid();
        manager.rotate(NOW)?;

        manager.retire(&first, NOW + 50)?;
        assert_eq!(manager.snapshot().retired_at(&first), Some(NOW));
        Ok(())
    }

    #[test]
    fn purge_waits_for_token_lifetime() -> Result<(), KeyError> {
        let manager = KeyManager::initialize()?;
        let first = manager.current_kid();
        manager.rotate(NOW)?;
        let ttl = Duration::minutes(15);

        assert!(manager.purge_retired(NOW + 899, ttl).is_empty());
        assert!(manager.lookup(&first).is_some());

        assert_eq!(manager.purge_retired(NOW + 900, ttl), vec![first.clone()]);
        assert!(manager.lookup(&first).is_none());
        assert_eq!(manager.snapshot().len(), 1);
        assert!(manager.snapshot().retired_at(&first).is_none());
        Ok(())
    }

    #[test]
    fn purge_never_drops_current_key() -> Result<(), KeyError> {
        let manager = KeyManager::initialize()?;
        let current = manager.current_kid();

        assert!(manager.purge_retired(i64::MAX, Duration::seconds(-5)).is_empty());
        assert!(manager.lookup(&current).is_some());
        Ok(())
    }

    #[test]
    fn failed_update_keeps_the_published_registry() -> Result<(), KeyError> {
        let manager = KeyManager::initialize()?;
        let before = manager.snapshot();

        assert!(manager.retire(&manager.current_kid(), NOW).is_err());
        assert!(Arc::ptr_eq(&before, &manager.snapshot()));

        manager.rotate(NOW)?;
        assert!(!Arc::ptr_eq(&before, &manager.snapshot()));
        Ok(())
    }
}
