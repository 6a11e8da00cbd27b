pub mod auth;
pub mod hasher;
pub mod logging;

use clap::{
    Arg, ArgMatches, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

pub const CMD_HASH: &str = "hash";
pub const CMD_VERIFY: &str = "verify";
pub const CMD_ISSUE: &str = "issue";
pub const CMD_VALIDATE: &str = "validate";
pub const CMD_JWKS: &str = "jwks";

pub const ARG_DIGEST: &str = "digest";
pub const ARG_SUBJECT: &str = "subject";
pub const ARG_AUDIENCE: &str = "audience";
pub const ARG_TOKEN: &str = "token";
pub const ARG_JWKS: &str = "jwks";
pub const ARG_ROTATIONS: &str = "rotations";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("sso")
        .about("Password digests, signing keys and access tokens")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new(CMD_HASH)
                .about("Hash a password read from SSO_PASSWORD or stdin"),
        )
        .subcommand(
            Command::new(CMD_VERIFY)
                .about("Check a password from SSO_PASSWORD or stdin against a digest")
                .arg(
                    Arg::new(ARG_DIGEST)
                        .long(ARG_DIGEST)
                        .help("Stored digest, $argon2id$v=19$...")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new(CMD_ISSUE)
                .about("Issue an access token and print the JWKS that verifies it")
                .arg(
                    Arg::new(ARG_SUBJECT)
                        .long(ARG_SUBJECT)
                        .help("Token subject (sub)")
                        .required(true),
                )
                .arg(
                    Arg::new(ARG_AUDIENCE)
                        .long(ARG_AUDIENCE)
                        .help("Token audience (aud)")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new(CMD_VALIDATE)
                .about("Validate an access token against a published JWKS")
                .arg(
                    Arg::new(ARG_TOKEN)
                        .long(ARG_TOKEN)
                        .help("Compact JWT")
                        .required(true),
                )
                .arg(
                    Arg::new(ARG_JWKS)
                        .long(ARG_JWKS)
                        .help("Path to a JWKS document")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new(CMD_JWKS)
                .about("Generate signing keys and print their JWKS")
                .arg(
                    Arg::new(ARG_ROTATIONS)
                        .long(ARG_ROTATIONS)
                        .help("Rotate this many times so retired keys are published too")
                        .default_value("0")
                        .value_parser(clap::value_parser!(u8)),
                ),
        );

    let command = hasher::with_args(command);
    let command = auth::with_args(command);
    logging::with_args(command)
}

/// Matches of the selected subcommand, where global arguments are always visible.
#[must_use]
pub fn leaf(matches: &ArgMatches) -> &ArgMatches {
    matches.subcommand().map_or(matches, |(_, sub)| sub)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "sso");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("Password digests, signing keys and access tokens".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
        let subcommands: Vec<&str> = command.get_subcommands().map(Command::get_name).collect();
        assert_eq!(
            subcommands,
            [CMD_HASH, CMD_VERIFY, CMD_ISSUE, CMD_VALIDATE, CMD_JWKS]
        );
    }

    #[test]
    fn test_subcommand_required() {
        let result = new().try_get_matches_from(vec!["sso"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_issue_args() -> Result<(), Box<dyn std::error::Error>> {
        let matches = new().try_get_matches_from(vec![
            "sso",
            "issue",
            "--subject",
            "user1",
            "--audience",
            "client1",
            "--auth-issuer",
            "https://sso.example.test",
        ])?;
        let (name, sub) = matches.subcommand().ok_or("missing subcommand")?;
        assert_eq!(name, CMD_ISSUE);
        assert_eq!(
            sub.get_one::<String>(ARG_SUBJECT).cloned(),
            Some("user1".to_string())
        );
        assert_eq!(
            sub.get_one::<String>(auth::ARG_AUTH_ISSUER).cloned(),
            Some("https://sso.example.test".to_string())
        );
        Ok(())
    }

    #[test]
    fn test_missing_required_subcommand_arg() {
        let result = new().try_get_matches_from(vec!["sso", "validate", "--token", "a.b.c"]);
        assert_eq!(
            result.map_err(|e| e.kind()).err(),
            Some(clap::error::ErrorKind::MissingRequiredArgument)
        );
    }

    #[test]
    fn test_check_log_level_verbosity() {
        // loop cover all possible value_parse
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, _) in levels.iter().enumerate() {
            temp_env::with_vars([("SSO_LOG_LEVEL", None::<String>)], || {
                let mut args = vec!["sso".to_string(), "jwks".to_string()];

                // Add the appropriate number of "-v" flags based on the index
                if index > 0 {
                    let v = format!("-{}", "v".repeat(index));
                    args.push(v);
                }

                let matches = new().get_matches_from(args);

                assert_eq!(
                    leaf(&matches).get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("SSO_AUTH_ISSUER", Some("https://sso.example.test")),
                ("SSO_HASH_WORKERS", Some("2")),
                ("SSO_LOG_LEVEL", Some("info")),
            ],
            || {
                let matches = new().get_matches_from(vec!["sso", "hash"]);
                let sub = leaf(&matches);
                assert_eq!(
                    sub.get_one::<String>(auth::ARG_AUTH_ISSUER).cloned(),
                    Some("https://sso.example.test".to_string())
                );
                assert_eq!(
                    sub.get_one::<usize>(hasher::ARG_HASH_WORKERS).copied(),
                    Some(2)
                );
                assert_eq!(
                    sub.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );
            },
        );
    }
}
