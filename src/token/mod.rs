//! Signing keys, access tokens and the published key set.

mod error;
pub mod jwks;
pub mod jwt;
pub mod keys;

pub use error::{KeyError, TokenError, TokenErrorKind};
pub use jwks::{Jwk, Jwks};
pub use jwt::{Claims, TokenConfig, TokenHeader, TokenService, verify_with_jwks};
pub use keys::{KeyManager, KeyPair, KeyRegistry, generate_key_pair, generate_kid};

use time::OffsetDateTime;

pub(crate) fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}
