use crate::token::{Claims, Jwks, verify_with_jwks};
use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct Args {
    pub issuer: String,
    pub token: String,
    pub jwks: PathBuf,
}

/// Validate the token against the JWKS file and print its claims.
/// # Errors
/// Returns an error if the JWKS cannot be loaded or the token is rejected.
pub fn execute(args: &Args) -> Result<()> {
    let claims = validate_at(args, crate::token::now_unix())?;
    println!("{}", serde_json::to_string_pretty(&claims)?);
    Ok(())
}

fn validate_at(args: &Args, now: i64) -> Result<Claims> {
    let jwks = load_jwks(&args.jwks)?;
    verify_with_jwks(&args.token, &jwks, &args.issuer, now)
        .map_err(|e| anyhow!("token rejected ({:?}): {e}", e.kind()))
}

fn load_jwks(path: &Path) -> Result<Jwks> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read JWKS from {}", path.display()))?;
    Jwks::from_json(&json).with_context(|| format!("invalid JWKS in {}", path.display()))
}
