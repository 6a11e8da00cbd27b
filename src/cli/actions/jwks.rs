use crate::token::KeyManager;
use anyhow::{Context, Result};

#[derive(Debug)]
pub struct Args {
    pub rotations: u8,
}

/// Generate keys, rotate `rotations` times and print the JWKS.
/// # Errors
/// Returns an error if key generation or serialization fails.
pub fn execute(args: Args) -> Result<()> {
    let keys = KeyManager::initialize().context("failed to generate signing key")?;
    for _ in 0..args.rotations {
        keys.rotate(crate::token::now_unix())
            .context("failed to rotate signing key")?;
    }

    println!("{}", keys.jwks().to_json_pretty()?);
    Ok(())
}
