//! Argon2id password digests.
//!
//! A digest records the algorithm, version, cost parameters, salt and derived
//! key, so verification only needs the password and the stored string. Cost
//! parameters can be raised for new digests while old ones keep verifying with
//! the parameters they were created with.

mod digest;
pub mod pool;

pub use digest::{ALGORITHM_TAG, ParsedDigest, VERSION};

/// Largest accepted memory cost, 4 GiB.
pub const MAX_MEMORY_KIB: u32 = 4 * 1024 * 1024;
/// Largest accepted iteration count.
pub const MAX_ITERATIONS: u32 = 256;
/// Largest accepted number of lanes.
pub const MAX_PARALLELISM: u32 = 64;
pub use pool::{HashPool, PoolError};

use argon2::{Algorithm, Argon2, Params, Version};
use rand::{RngCore, rngs::OsRng};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, instrument};
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("invalid digest format: {0}")]
    Format(String),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("invalid hash parameters: {0}")]
    InvalidParameters(String),
    #[error("crypto failure: {0}")]
    Crypto(String),
}

/// Argon2id cost and size parameters. Lengths are in bytes, memory in KiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParameters {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
    pub key_length: u32,
    pub salt_length: u32,
}

impl Default for HashParameters {
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 4,
            key_length: 32,
            salt_length: 16,
        }
    }
}

impl HashParameters {
    /// Check the parameters against the Argon2 bounds.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameters` if any cost is zero or above its ceiling
    /// ([`MAX_MEMORY_KIB`], [`MAX_ITERATIONS`], [`MAX_PARALLELISM`]), or the
    /// salt is shorter than Argon2 accepts.
    pub fn validate(&self) -> Result<(), PasswordError> {
        if let Some(reason) = self.exceeded_ceiling() {
            return Err(PasswordError::InvalidParameters(reason));
        }
        let salt_length = to_usize(self.salt_length)?;
        if salt_length < argon2::MIN_SALT_LEN {
            return Err(PasswordError::InvalidParameters(format!(
                "salt length {salt_length} is below {}",
                argon2::MIN_SALT_LEN
            )));
        }
        self.argon2()
            .map(|_| ())
            .map_err(|e| PasswordError::InvalidParameters(e.to_string()))
    }

    // Costs are read from stored digests too; an unbounded `m` makes argon2
    // allocate up front and abort the process.
    pub(crate) fn exceeded_ceiling(&self) -> Option<String> {
        [
            ("m", self.memory_kib, MAX_MEMORY_KIB),
            ("t", self.iterations, MAX_ITERATIONS),
            ("p", self.parallelism, MAX_PARALLELISM),
        ]
        .into_iter()
        .find(|(_, value, max)| value > max)
        .map(|(name, value, max)| format!("{name}={value} exceeds the maximum of {max}"))
    }

    fn argon2(&self) -> Result<Argon2<'static>, argon2::Error> {
        let key_length =
            usize::try_from(self.key_length).map_err(|_| argon2::Error::OutputTooLong)?;
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(key_length),
        )?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Hash `password` with a fresh random salt and return the encoded digest.
///
/// # Errors
///
/// Returns `InvalidParameters` if `params` are outside the Argon2 bounds and
/// `Crypto` if the operating system random source is unavailable.
#[instrument(skip_all, fields(m = params.memory_kib, t = params.iterations, p = params.parallelism))]
pub fn hash(password: &str, params: &HashParameters) -> Result<String, PasswordError> {
    params.validate()?;

    let mut salt = vec![0u8; to_usize(params.salt_length)?];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| PasswordError::Crypto(format!("secure random source unavailable: {e}")))?;

    let key = derive_key(password.as_bytes(), &salt, params)
        .map_err(|e| PasswordError::InvalidParameters(e.to_string()))?;

    Ok(digest::encode(params, &salt, &key))
}

/// Check `password` against a digest produced by [`hash`].
///
/// The key is recomputed with the parameters recorded in the digest and
/// compared in constant time. A wrong password is `Ok(false)`, never an error.
///
/// # Errors
///
/// Returns `Format` or `UnsupportedAlgorithm` if `digest` cannot be parsed or
/// records parameters Argon2 rejects.
#[instrument(skip_all)]
pub fn verify(password: &str, digest: &str) -> Result<bool, PasswordError> {
    let parsed = ParsedDigest::parse(digest)?;

    let key = derive_key(password.as_bytes(), &parsed.salt, &parsed.params)
        .map_err(|e| PasswordError::Format(format!("digest parameters rejected: {e}")))?;

    let matched: bool = key.as_slice().ct_eq(parsed.key.as_slice()).into();
    debug!(matched, "password verification completed");

    Ok(matched)
}

/// Split a stored digest into its recorded parameters, salt and key.
///
/// # Errors
///
/// See [`ParsedDigest::parse`].
pub fn parse(digest: &str) -> Result<ParsedDigest, PasswordError> {
    ParsedDigest::parse(digest)
}

/// Report whether a stored digest was produced with parameters other than `params`.
///
/// # Errors
///
/// Returns the same errors as [`ParsedDigest::parse`].
pub fn needs_rehash(digest: &str, params: &HashParameters) -> Result<bool, PasswordError> {
    Ok(ParsedDigest::parse(digest)?.params != *params)
}

fn derive_key(
    password: &[u8],
    salt: &[u8],
    params: &HashParameters,
) -> Result<Zeroizing<Vec<u8>>, argon2::Error> {
    let argon2 = params.argon2()?;
    let key_length =
        usize::try_from(params.key_length).map_err(|_| argon2::Error::OutputTooLong)?;
    let mut key = Zeroizing::new(vec![0u8; key_length]);
    argon2.hash_password_into(password, salt, key.as_mut_slice())?;
    Ok(key)
}

fn to_usize(value: u32) -> Result<usize, PasswordError> {
    usize::try_from(value)
        .map_err(|_| PasswordError::InvalidParameters(format!("{value} does not fit in usize")))
}

#[cfg(test)]
pub(crate) const TEST_PARAMS: HashParameters = HashParameters {
    memory_kib: 1024,
    iterations: 1,
    parallelism: 1,
    key_length: 32,
    salt_length: 16,
};
