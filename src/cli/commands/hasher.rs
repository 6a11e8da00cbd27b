use crate::password::HashParameters;
use clap::{Arg, ArgMatches, Command};

pub const ARG_HASH_MEMORY_KIB: &str = "hash-memory-kib";
pub const ARG_HASH_ITERATIONS: &str = "hash-iterations";
pub const ARG_HASH_PARALLELISM: &str = "hash-parallelism";
pub const ARG_HASH_KEY_LENGTH: &str = "hash-key-length";
pub const ARG_HASH_SALT_LENGTH: &str = "hash-salt-length";
pub const ARG_HASH_WORKERS: &str = "hash-workers";

pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub params: HashParameters,
    pub workers: usize,
}

impl Options {
    /// Parse hashing arguments from matches. Unset arguments take the values of
    /// [`HashParameters::default`] and [`DEFAULT_WORKERS`].
    ///
    /// # Errors
    /// Returns an error if the parameters are outside the Argon2 bounds.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let defaults = HashParameters::default();
        let get = |id: &str, default: u32| matches.get_one::<u32>(id).copied().unwrap_or(default);

        let params = HashParameters {
            memory_kib: get(ARG_HASH_MEMORY_KIB, defaults.memory_kib),
            iterations: get(ARG_HASH_ITERATIONS, defaults.iterations),
            parallelism: get(ARG_HASH_PARALLELISM, defaults.parallelism),
            key_length: get(ARG_HASH_KEY_LENGTH, defaults.key_length),
            salt_length: get(ARG_HASH_SALT_LENGTH, defaults.salt_length),
        };
        params.validate()?;

        let workers = matches
            .get_one::<usize>(ARG_HASH_WORKERS)
            .copied()
            .unwrap_or(DEFAULT_WORKERS);

        Ok(Self { params, workers })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_HASH_MEMORY_KIB)
                .long(ARG_HASH_MEMORY_KIB)
                .help("Argon2id memory cost in KiB")
                .env("SSO_HASH_MEMORY_KIB")
                .global(true)
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_HASH_ITERATIONS)
                .long(ARG_HASH_ITERATIONS)
                .help("Argon2id iterations (time cost)")
                .env("SSO_HASH_ITERATIONS")
                .global(true)
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_HASH_PARALLELISM)
                .long(ARG_HASH_PARALLELISM)
                .help("Argon2id lanes")
                .env("SSO_HASH_PARALLELISM")
                .global(true)
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_HASH_KEY_LENGTH)
                .long(ARG_HASH_KEY_LENGTH)
                .help("Derived key length in bytes")
                .env("SSO_HASH_KEY_LENGTH")
                .global(true)
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_HASH_SALT_LENGTH)
                .long(ARG_HASH_SALT_LENGTH)
                .help("Salt length in bytes")
                .env("SSO_HASH_SALT_LENGTH")
                .global(true)
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_HASH_WORKERS)
                .long(ARG_HASH_WORKERS)
                .help("Maximum concurrent hashing jobs")
                .env("SSO_HASH_WORKERS")
                .global(true)
                .value_parser(clap::value_parser!(usize)),
        )
}
