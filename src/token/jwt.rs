use super::error::TokenError;
use super::jwks::Jwks;
use super::keys::{KeyManager, KeyPair};
use base64ct::{Base64UrlUnpadded, Encoding};
use ed25519_dalek::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use time::Duration;
use tracing::{debug, instrument};

/// The only signing algorithm accepted in token headers.
pub const ALGORITHM: &str = "EdDSA";
pub const TOKEN_TYPE: &str = "JWT";

/// Default lifetime of an access token.
pub const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::minutes(15);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl TokenHeader {
    fn eddsa(kid: impl Into<String>) -> Self {
        Self {
            alg: ALGORITHM.to_string(),
            typ: Some(TOKEN_TYPE.to_string()),
            kid: Some(kid.into()),
        }
    }
}

/// `aud` may be a single string or a list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Default for Audience {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl Audience {
    fn first(self) -> String {
        match self {
            Self::One(aud) => aud,
            Self::Many(auds) => auds.into_iter().next().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegisteredClaims {
    #[serde(default)]
    iss: String,
    #[serde(default)]
    sub: String,
    #[serde(default)]
    aud: Audience,
    #[serde(default)]
    iat: i64,
    exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nbf: Option<i64>,
}

/// Claims of a validated token. Times are unix seconds.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Claims {
    pub subject: String,
    pub issuer: String,
    pub audience: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl From<RegisteredClaims> for Claims {
    fn from(claims: RegisteredClaims) -> Self {
        Self {
            subject: claims.sub,
            issuer: claims.iss,
            audience: claims.aud.first(),
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub issuer: String,
    /// Zero or negative values produce tokens that are already expired.
    pub access_token_ttl: Duration,
}

impl TokenConfig {
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            access_token_ttl: DEFAULT_ACCESS_TOKEN_TTL,
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }
}

/// Issues and validates EdDSA access tokens against a shared [`KeyManager`].
#[derive(Debug, Clone)]
pub struct TokenService {
    config: TokenConfig,
    keys: KeyManager,
}

impl TokenService {
    #[must_use]
    pub fn new(config: TokenConfig, keys: KeyManager) -> Self {
        Self { config, keys }
    }

    #[must_use]
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    #[must_use]
    pub fn keys(&self) -> &KeyManager {
        &self.keys
    }

    /// Public keys that verify every token this service can still validate.
    #[must_use]
    pub fn jwks(&self) -> Jwks {
        self.keys.jwks()
    }

    /// Issue a token for `subject` and `audience`, signed with the current key.
    ///
    /// # Errors
    ///
    /// Returns an error if the header or claims cannot be serialized.
    pub fn generate_token(&self, subject: &str, audience: &str) -> Result<String, TokenError> {
        self.generate_token_at(subject, audience, super::now_unix())
    }

    /// Issue a token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the header or claims cannot be serialized.
    #[instrument(skip(self))]
    pub fn generate_token_at(
        &self,
        subject: &str,
        audience: &str,
        now: i64,
    ) -> Result<String, TokenError> {
        let key = self.keys.current();
        let claims = RegisteredClaims {
            iss: self.config.issuer.clone(),
            sub: subject.to_string(),
            aud: Audience::Many(vec![audience.to_string()]),
            iat: now,
            exp: now.saturating_add(self.config.access_token_ttl.whole_seconds()),
            nbf: None,
        };

        let token = sign(&key, &claims)?;
        debug!(kid = key.kid(), exp = claims.exp, "Issued access token");
        Ok(token)
    }

    /// Validate `token` and return its claims.
    ///
    /// # Errors
    ///
    /// See [`TokenService::validate_token_at`].
    pub fn validate_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_token_at(token, super::now_unix())
    }

    /// Validate `token` as if the current time were `now`.
    ///
    /// Checks run in a fixed order and the first failure wins: algorithm, key
    /// id presence, key id lookup, signature, expiry, not-before, issuer.
    ///
    /// # Errors
    ///
    /// - `UnsupportedAlgorithm` if the header `alg` is not `EdDSA`,
    /// - `MissingKeyId` if the header carries no `kid`,
    /// - `UnknownKey` if the `kid` is not in the registry,
    /// - `InvalidSignature` if the signature does not verify,
    /// - `Expired` if `exp <= now`,
    /// - `NotYetValid` if an `nbf` claim is present and later than `now`,
    /// - `InvalidIssuer` if `iss` is not the configured issuer,
    /// - `Malformed` or `Json` for any other structural problem.
    #[instrument(skip_all)]
    pub fn validate_token_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let registry = self.keys.snapshot();
        let claims = decode_verified(
            token,
            |kid| {
                registry
                    .get(kid)
                    .map(|key| *key.verifying_key())
                    .ok_or_else(|| TokenError::UnknownKey(kid.to_string()))
            },
            &self.config.issuer,
            now,
        )
        .inspect_err(|e| debug!(kind = ?e.kind(), "Rejected access token: {e}"))?;
        Ok(claims)
    }
}

/// Validate `token` with keys from a published JWKS, using the same rules as
/// [`TokenService::validate_token_at`].
///
/// # Errors
///
/// As [`TokenService::validate_token_at`]; a JWKS entry that is not a usable
/// Ed25519 key is `InvalidKey`.
pub fn verify_with_jwks(
    token: &str,
    jwks: &Jwks,
    expected_issuer: &str,
    now_unix_seconds: i64,
) -> Result<Claims, TokenError> {
    decode_verified(
        token,
        |kid| {
            jwks.find_by_kid(kid)
                .ok_or_else(|| TokenError::UnknownKey(kid.to_string()))?
                .to_verifying_key()
        },
        expected_issuer,
        now_unix_seconds,
    )
}

fn decode_verified<F>(
    token: &str,
    resolve: F,
    expected_issuer: &str,
    now: i64,
) -> Result<Claims, TokenError>
where
    F: FnOnce(&str) -> Result<VerifyingKey, TokenError>,
{
    let mut parts = token.split('.');
    let (Some(header_b64), Some(claims_b64), Some(sig_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed("expected three segments"));
    };

    let header: TokenHeader = b64d_json(header_b64, "header is not base64url")?;
    if header.alg != ALGORITHM {
        return Err(TokenError::UnsupportedAlgorithm(header.alg));
    }
    let kid = header
        .kid
        .filter(|kid| !kid.is_empty())
        .ok_or(TokenError::MissingKeyId)?;

    let verifying_key = resolve(&kid)?;

    let signature_bytes = Base64UrlUnpadded::decode_vec(sig_b64)
        .map_err(|_| TokenError::Malformed("signature is not base64url"))?;
    let signature = Signature::from_slice(&signature_bytes)
        .map_err(|_| TokenError::Malformed("signature has the wrong length"))?;
    let signing_input = format!("{header_b64}.{claims_b64}");
    verifying_key
        .verify_strict(signing_input.as_bytes(), &signature)
        .map_err(|_| TokenError::InvalidSignature)?;

    let claims: RegisteredClaims = b64d_json(claims_b64, "claims are not base64url")?;
    if claims.exp <= now {
        return Err(TokenError::Expired);
    }
    if claims.nbf.is_some_and(|nbf| nbf > now) {
        return Err(TokenError::NotYetValid);
    }
    if claims.iss != expected_issuer {
        return Err(TokenError::InvalidIssuer);
    }

    Ok(claims.into())
}

fn sign(key: &KeyPair, claims: &RegisteredClaims) -> Result<String, TokenError> {
    let header_b64 = b64e_json(&TokenHeader::eddsa(key.kid()))?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let signature = key.sign(signing_input.as_bytes());
    let signature_b64 = Base64UrlUnpadded::encode_string(&signature.to_bytes());

    Ok(format!("{signing_input}.{signature_b64}"))
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(
    s: &str,
    base64_error: &'static str,
) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Malformed(base64_error))?;
    Ok(serde_json::from_slice(&bytes)?)
}
