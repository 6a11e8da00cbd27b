//! Bounded execution of password hashing off the async runtime.
//!
//! Jobs run on the blocking thread pool and the number in flight is capped by
//! a semaphore. Callers either wait for a slot (`hash`, `verify`) or are
//! turned away at once (`try_hash`).

use super::{HashParameters, PasswordError};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("hash pool saturated")]
    Saturated,
    #[error("hash pool closed")]
    Closed,
    #[error("hash job failed: {0}")]
    Join(String),
    #[error(transparent)]
    Password(#[from] PasswordError),
}

#[derive(Debug, Clone)]
pub struct HashPool {
    params: HashParameters,
    permits: Arc<Semaphore>,
    workers: usize,
}

impl HashPool {
    /// Create a pool allowing `workers` concurrent jobs (at least one).
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameters` if `params` would be rejected by Argon2.
    pub fn new(params: HashParameters, workers: usize) -> Result<Self, PasswordError> {
        params.validate()?;
        let workers = workers.max(1);

        info!(
            workers,
            memory_kib = params.memory_kib,
            iterations = params.iterations,
            parallelism = params.parallelism,
            "Starting password hash pool"
        );

        Ok(Self {
            params,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        })
    }

    #[must_use]
    pub fn params(&self) -> &HashParameters {
        &self.params
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Free slots right now.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Hash `password`, waiting for a free slot.
    ///
    /// # Errors
    ///
    /// `Closed` after [`HashPool::close`], `Join` if the job panicked, and any
    /// [`PasswordError`] from hashing.
    #[instrument(skip_all)]
    pub async fn hash(&self, password: SecretString) -> Result<String, PoolError> {
        let permit = self.acquire().await?;
        let params = self.params;
        run(permit, move || super::hash(password.expose_secret(), &params)).await
    }

    /// Hash `password` only if a slot is free now.
    ///
    /// # Errors
    ///
    /// `Saturated` when every slot is busy, otherwise as [`HashPool::hash`].
    #[instrument(skip_all)]
    pub async fn try_hash(&self, password: SecretString) -> Result<String, PoolError> {
        let permit = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => {
                warn!(workers = self.workers, "Hash pool saturated, rejecting job");
                return Err(PoolError::Saturated);
            }
            Err(TryAcquireError::Closed) => return Err(PoolError::Closed),
        };
        let params = self.params;
        run(permit, move || super::hash(password.expose_secret(), &params)).await
    }

    /// Verify `password` against `digest`, waiting for a free slot.
    ///
    /// # Errors
    ///
    /// As [`HashPool::hash`]; a wrong password is `Ok(false)`.
    #[instrument(skip_all)]
    pub async fn verify(&self, password: SecretString, digest: String) -> Result<bool, PoolError> {
        let permit = self.acquire().await?;
        run(permit, move || super::verify(password.expose_secret(), &digest)).await
    }

    /// Stop accepting jobs. Jobs already running finish normally.
    pub fn close(&self) {
        debug!("Closing password hash pool");
        self.permits.close();
    }

    async fn acquire(&self) -> Result<OwnedSemaphorePermit, PoolError> {
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)
    }
}

// The permit moves into the blocking closure so the slot stays taken until the
// job itself is done, even if the awaiting task is dropped.
async fn run<T, F>(permit: OwnedSemaphorePermit, job: F) -> Result<T, PoolError>
where
    F: FnOnce() -> Result<T, PasswordError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let _permit = permit;
        job()
    })
    .await
    .map_err(|e| PoolError::Join(e.to_string()))?
    .map_err(PoolError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::TEST_PARAMS;

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    #[tokio::test]
    async fn hash_and_verify_through_pool() -> Result<(), PoolError> {
        let pool = HashPool::new(TEST_PARAMS, 2)?;

        let digest = pool.hash(secret("pool-password")).await?;
        assert!(pool.verify(secret("pool-password"), digest.clone()).await?);
        assert!(!pool.verify(secret("other"), digest).await?);
        assert_eq!(pool.available(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn try_hash_rejects_when_saturated() -> Result<(), PoolError> {
        let pool = HashPool::new(TEST_PARAMS, 1)?;

        let held = Arc::clone(&pool.permits)
            .try_acquire_owned()
            .map_err(|_| PoolError::Saturated)?;
        assert_eq!(pool.available(), 0);
        assert!(matches!(
            pool.try_hash(secret("busy")).await,
            Err(PoolError::Saturated)
        ));

        drop(held);
        let digest = pool.try_hash(secret("busy")).await?;
        assert!(digest.starts_with("$argon2id$"));
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_jobs_all_complete() -> Result<(), PoolError> {
        let pool = HashPool::new(TEST_PARAMS, 2)?;

        let mut handles = Vec::new();
        for i in 0..6 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                pool.hash(secret(&format!("password-{i}"))).await
            }));
        }

        for handle in handles {
            let digest = handle.await.map_err(|e| PoolError::Join(e.to_string()))??;
            assert!(digest.starts_with("$argon2id$v=19$m=1024,t=1,p=1$"));
        }
        assert_eq!(pool.available(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn closed_pool_refuses_jobs() -> Result<(), PoolError> {
        let pool = HashPool::new(TEST_PARAMS, 1)?;
        pool.close();

        assert!(matches!(pool.hash(secret("x")).await, Err(PoolError::Closed)));
        assert!(matches!(pool.try_hash(secret("x")).await, Err(PoolError::Closed)));
        Ok(())
    }

    #[tokio::test]
    async fn password_errors_pass_through() -> Result<(), PoolError> {
        let pool = HashPool::new(TEST_PARAMS, 1)?;
        let result = pool.verify(secret("x"), "not-a-digest".to_string()).await;
        assert!(matches!(
            result,
            Err(PoolError::Password(PasswordError::Format(_)))
        ));
        Ok(())
    }

    #[test]
    fn invalid_parameters_fail_at_construction() {
        let params = HashParameters {
            iterations: 0,
            ..TEST_PARAMS
        };
        assert!(matches!(
            HashPool::new(params, 1),
            Err(PasswordError::InvalidParameters(_))
        ));
    }

    #[test]
    fn zero_workers_means_one() -> Result<(), PasswordError> {
        let pool = HashPool::new(TEST_PARAMS, 0)?;
        assert_eq!(pool.workers(), 1);
        Ok(())
    }
}
