use crate::cli::commands::hasher;
use crate::password::{self, HashPool};
use anyhow::{Context, Result};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub hasher: hasher::Options,
    pub digest: String,
}

/// Check the password against the digest.
/// # Errors
/// Returns an error if the digest is invalid or the password does not match,
/// so the process exits non-zero on mismatch.
pub async fn execute(args: Args) -> Result<()> {
    let password = super::read_password().await?;
    let pool = HashPool::new(args.hasher.params, args.hasher.workers)?;

    let matched = pool
        .verify(password, args.digest.clone())
        .await
        .context("failed to verify password")?;
    if !matched {
        anyhow::bail!("password does not match digest");
    }

    if password::needs_rehash(&args.digest, pool.params())? {
        info!("Digest parameters differ from the configured ones, rehash on next login");
        println!("ok (rehash recommended)");
    } else {
        println!("ok");
    }
    Ok(())
}
