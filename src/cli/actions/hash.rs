use crate::cli::commands::hasher;
use crate::password::HashPool;
use anyhow::{Context, Result};

#[derive(Debug)]
pub struct Args {
    pub hasher: hasher::Options,
}

/// Hash the password and print the digest on stdout.
/// # Errors
/// Returns an error if the password cannot be read or hashing fails.
pub async fn execute(args: Args) -> Result<()> {
    let password = super::read_password().await?;
    let pool = HashPool::new(args.hasher.params, args.hasher.workers)?;

    let digest = pool
        .hash(password)
        .await
        .context("failed to hash password")?;

    println!("{digest}");
    Ok(())
}
