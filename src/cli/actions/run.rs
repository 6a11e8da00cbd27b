use crate::cli::actions::{Action, hash, issue, jwks, validate, verify};
use anyhow::Result;

/// Execute the provided action.
// This is the single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Hash(args) => hash::execute(args).await,
        Action::Verify(args) => verify::execute(args).await,
        Action::Issue(args) => issue::execute(args),
        Action::Validate(args) => validate::execute(&args),
        Action::Jwks(args) => jwks::execute(args),
    }
}
