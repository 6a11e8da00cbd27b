use crate::token::{KeyManager, TokenConfig, TokenService};
use anyhow::{Context, Result};

#[derive(Debug)]
pub struct Args {
    pub token: TokenConfig,
    pub subject: String,
    pub audience: String,
}

/// Issue a token with a fresh key and print it with the JWKS that verifies it.
///
/// Keys live only for this process, so the JWKS is the only way to check the
/// token afterwards (`sso validate --jwks`).
/// # Errors
/// Returns an error if key generation or signing fails.
pub fn execute(args: Args) -> Result<()> {
    let keys = KeyManager::initialize().context("failed to generate signing key")?;
    let expires_in = args.token.access_token_ttl.whole_seconds();
    let service = TokenService::new(args.token, keys);

    let access_token = service
        .generate_token(&args.subject, &args.audience)
        .context("failed to issue token")?;

    let output = serde_json::json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": expires_in,
        "jwks": service.jwks(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
