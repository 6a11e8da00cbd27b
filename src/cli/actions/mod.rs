pub mod hash;
pub mod issue;
pub mod jwks;
pub mod validate;
pub mod verify;

// Internal "interpreter" for `Action`.
// We keep the match in a separate module so `mod.rs` stays small as more actions are added.
mod run;

use anyhow::{Context, Result};
use secrecy::SecretString;
use std::io::BufRead;

pub const PASSWORD_ENV: &str = "SSO_PASSWORD";

#[derive(Debug)]
pub enum Action {
    Hash(hash::Args),
    Verify(verify::Args),
    Issue(issue::Args),
    Validate(validate::Args),
    Jwks(jwks::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> Result<()> {
        run::execute(self).await
    }
}

/// Read the password from `SSO_PASSWORD`, or the first line of stdin.
///
/// Stdin is read on the blocking thread pool.
pub(crate) async fn read_password() -> Result<SecretString> {
    tokio::task::spawn_blocking(read_password_blocking)
        .await
        .context("password reader task failed")?
}

fn read_password_blocking() -> Result<SecretString> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(SecretString::from(password));
    }

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("no password given: set {PASSWORD_ENV} or pipe it on stdin");
    }
    Ok(SecretString::from(password))
}
