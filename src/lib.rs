//! # sso (credential and token cryptography)
//!
//! The cryptographic core of an identity provider: password digests, the
//! signing keys behind access tokens, and the public key set relying parties
//! use to verify those tokens offline.
//!
//! ## Passwords
//!
//! Passwords are hashed with **Argon2id** into a self-describing digest,
//! `$argon2id$v=19$m=<KiB>,t=<iterations>,p=<lanes>$<salt>$<key>`. Verification
//! reads the cost parameters back from the digest, so parameters can be raised
//! for new digests without invalidating stored ones. [`password::HashPool`]
//! runs hashing on the blocking thread pool with a bounded number of jobs.
//!
//! ## Tokens
//!
//! Access tokens are compact JWTs signed with **Ed25519** (`EdDSA`). Every key
//! has a `kid` derived from its public key, and the registry keeps retired keys
//! until every token they signed has expired. Validation pins the algorithm and
//! reports one of a closed set of outcomes ([`token::TokenErrorKind`]).
//!
//! ## Key publication
//!
//! [`token::KeyManager::jwks`] renders every trusted key as an `OKP`/`Ed25519`
//! JWK; [`token::verify_with_jwks`] applies the same validation rules from a
//! published set.

pub mod cli;
pub mod password;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
