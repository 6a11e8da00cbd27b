//! Map parsed arguments to the action the binary runs.

use crate::cli::actions::{Action, hash, issue, jwks, validate, verify};
use crate::cli::commands::{
    ARG_AUDIENCE, ARG_DIGEST, ARG_JWKS, ARG_ROTATIONS, ARG_SUBJECT, ARG_TOKEN, CMD_HASH,
    CMD_ISSUE, CMD_JWKS, CMD_VALIDATE, CMD_VERIFY, auth, hasher,
};
use anyhow::{Context, Result};
use clap::ArgMatches;
use std::path::PathBuf;

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let (name, sub) = matches
        .subcommand()
        .context("missing subcommand, see --help")?;

    let required = |id: &str| {
        sub.get_one::<String>(id)
            .cloned()
            .with_context(|| format!("missing required argument: --{id}"))
    };

    let action = match name {
        CMD_HASH => Action::Hash(hash::Args {
            hasher: hasher::Options::parse(sub)?,
        }),
        CMD_VERIFY => Action::Verify(verify::Args {
            hasher: hasher::Options::parse(sub)?,
            digest: required(ARG_DIGEST)?,
        }),
        CMD_ISSUE => Action::Issue(issue::Args {
            token: auth::Options::parse(sub).token_config()?,
            subject: required(ARG_SUBJECT)?,
            audience: required(ARG_AUDIENCE)?,
        }),
        CMD_VALIDATE => {
            let config = auth::Options::parse(sub).token_config()?;
            Action::Validate(validate::Args {
                issuer: config.issuer,
                token: required(ARG_TOKEN)?,
                jwks: PathBuf::from(required(ARG_JWKS)?),
            })
        }
        CMD_JWKS => Action::Jwks(jwks::Args {
            rotations: sub.get_one::<u8>(ARG_ROTATIONS).copied().unwrap_or(0),
        }),
        other => anyhow::bail!("unknown subcommand: {other}"),
    };

    Ok(action)
}
