use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key generation failed: {0}")]
    Crypto(String),
    #[error("unknown key id: {0}")]
    UnknownKey(String),
    #[error("key {0} is the current signing key")]
    CurrentKey(String),
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("missing key id")]
    MissingKeyId,
    #[error("unknown key id: {0}")]
    UnknownKey(String),
    #[error("invalid verification key: {0}")]
    InvalidKey(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("malformed token: {0}")]
    Malformed(&'static str),
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
}

/// The closed set of validation outcomes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenErrorKind {
    Expired,
    InvalidSignature,
    UnknownKey,
    Malformed,
    UnsupportedAlgorithm,
}

impl TokenError {
    #[must_use]
    pub fn kind(&self) -> TokenErrorKind {
        match self {
            Self::UnsupportedAlgorithm(_) => TokenErrorKind::UnsupportedAlgorithm,
            Self::UnknownKey(_) | Self::InvalidKey(_) => TokenErrorKind::UnknownKey,
            Self::InvalidSignature => TokenErrorKind::InvalidSignature,
            Self::Expired => TokenErrorKind::Expired,
            Self::MissingKeyId
            | Self::NotYetValid
            | Self::InvalidIssuer
            | Self::Malformed(_)
            | Self::Json(_) => TokenErrorKind::Malformed,
        }
    }

    /// Expired tokens are the one rejection a client can recover from by refreshing.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired)
    }
}
