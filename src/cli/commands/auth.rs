use crate::token::TokenConfig;
use clap::{Arg, ArgMatches, Command};

pub const ARG_AUTH_ISSUER: &str = "auth-issuer";
pub const ARG_AUTH_ACCESS_TOKEN_TTL: &str = "auth-access-token-ttl";

#[derive(Debug, Clone)]
pub struct Options {
    pub issuer: Option<String>,
    pub access_token_ttl_seconds: i64,
}

impl Options {
    /// Parse token arguments from matches.
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        let issuer = matches
            .get_one::<String>(ARG_AUTH_ISSUER)
            .cloned()
            .filter(|v| !v.trim().is_empty());
        let access_token_ttl_seconds = matches
            .get_one::<i64>(ARG_AUTH_ACCESS_TOKEN_TTL)
            .copied()
            .unwrap_or(900);

        Self {
            issuer,
            access_token_ttl_seconds,
        }
    }

    /// Token settings; issuing and validating both need an issuer.
    ///
    /// # Errors
    /// Returns an error if no issuer was configured.
    pub fn token_config(&self) -> anyhow::Result<TokenConfig> {
        let Some(issuer) = self.issuer.clone() else {
            anyhow::bail!("missing required argument: --{ARG_AUTH_ISSUER}");
        };
        Ok(TokenConfig::new(issuer)
            .with_ttl(time::Duration::seconds(self.access_token_ttl_seconds)))
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_AUTH_ISSUER)
                .long(ARG_AUTH_ISSUER)
                .help("Issuer (iss) written into and required of access tokens")
                .env("SSO_AUTH_ISSUER")
                .global(true),
        )
        .arg(
            Arg::new(ARG_AUTH_ACCESS_TOKEN_TTL)
                .long(ARG_AUTH_ACCESS_TOKEN_TTL)
                .help("Access token lifetime in seconds")
                .long_help(
                    "Access token lifetime in seconds. Zero or negative values issue tokens that are already expired.",
                )
                .env("SSO_AUTH_ACCESS_TOKEN_TTL")
                .global(true)
                .allow_negative_numbers(true)
                .default_value("900")
                .value_parser(clap::value_parser!(i64)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> Command {
        with_args(Command::new("sso").no_binary_name(true))
    }

    #[test]
    fn issuer_and_ttl_from_env() -> anyhow::Result<()> {
        temp_env::with_vars(
            [
                ("SSO_AUTH_ISSUER", Some("https://sso.example.test")),
                ("SSO_AUTH_ACCESS_TOKEN_TTL", Some("60")),
            ],
            || {
                let matches = command().try_get_matches_from(Vec::<&str>::new())?;
                let config = Options::parse(&matches).token_config()?;
                assert_eq!(config.issuer, "https://sso.example.test");
                assert_eq!(config.access_token_ttl, time::Duration::seconds(60));
                Ok(())
            },
        )
    }

    #[test]
    fn negative_ttl_is_accepted() -> anyhow::Result<()> {
        temp_env::with_vars([("SSO_AUTH_ACCESS_TOKEN_TTL", None::<&str>)], || {
            let matches = command().try_get_matches_from([
                "--auth-issuer",
                "https://sso.example.test",
                "--auth-access-token-ttl",
                "-1",
            ])?;
            let config = Options::parse(&matches).token_config()?;
            assert_eq!(config.access_token_ttl, time::Duration::seconds(-1));
            Ok(())
        })
    }

    #[test]
    fn missing_issuer_is_an_error() -> anyhow::Result<()> {
        temp_env::with_vars(
            [
                ("SSO_AUTH_ISSUER", Some("  ")),
                ("SSO_AUTH_ACCESS_TOKEN_TTL", None::<&str>),
            ],
            || {
                let matches = command().try_get_matches_from(Vec::<&str>::new())?;
                let options = Options::parse(&matches);
                assert_eq!(options.access_token_ttl_seconds, 900);

                let result = options.token_config();
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(
                        err.to_string()
                            .contains("missing required argument: --auth-issuer")
                    );
                }
                Ok(())
            },
        )
    }
}
