use super::error::TokenError;
use super::keys::{KeyPair, KeyRegistry};
use base64ct::{Base64UrlUnpadded, Encoding};
use ed25519_dalek::{PUBLIC_KEY_LENGTH, VerifyingKey};
use serde::{Deserialize, Serialize};

pub const KEY_TYPE: &str = "OKP";
pub const CURVE: &str = "Ed25519";
pub const KEY_USE: &str = "sig";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Parse a JWKS from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if `s` is not valid JSON or doesn't match the expected JWKS shape.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Serialize this JWKS to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Find a key by `kid` (Key ID).
    #[must_use]
    pub fn find_by_kid(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    pub kty: String,
    pub crv: String,
    pub kid: String,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    pub x: String,
}

impl Jwk {
    #[must_use]
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        Self {
            kty: KEY_TYPE.to_string(),
            crv: CURVE.to_string(),
            kid: key_pair.kid().to_string(),
            key_use: Some(KEY_USE.to_string()),
            x: Base64UrlUnpadded::encode_string(key_pair.verifying_key().as_bytes()),
        }
    }

    /// Decode the Ed25519 public key.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::InvalidKey` if the key type, curve or use is not an
    /// Ed25519 signature key, or `x` is not a valid 32 byte point.
    pub fn to_verifying_key(&self) -> Result<VerifyingKey, TokenError> {
        if self.kty != KEY_TYPE || self.crv != CURVE {
            return Err(TokenError::InvalidKey(format!(
                "{}: expected {KEY_TYPE}/{CURVE}, found {}/{}",
                self.kid, self.kty, self.crv
            )));
        }
        if self.key_use.as_deref().is_some_and(|u| u != KEY_USE) {
            return Err(TokenError::InvalidKey(format!(
                "{}: not a signature key",
                self.kid
            )));
        }

        let bytes = Base64UrlUnpadded::decode_vec(&self.x)
            .map_err(|_| TokenError::InvalidKey(format!("{}: x is not base64url", self.kid)))?;
        let bytes: [u8; PUBLIC_KEY_LENGTH] = bytes.as_slice().try_into().map_err(|_| {
            TokenError::InvalidKey(format!("{}: x must be {PUBLIC_KEY_LENGTH} bytes", self.kid))
        })?;
        VerifyingKey::from_bytes(&bytes)
            .map_err(|_| TokenError::InvalidKey(format!("{}: x is not a curve point", self.kid)))
    }
}

/// Render every trusted key, current and retired, as a JWKS.
#[must_use]
pub fn export(registry: &KeyRegistry) -> Jwks {
    Jwks {
        keys: registry.keys().map(|k| Jwk::from_key_pair(k)).collect(),
    }
}
