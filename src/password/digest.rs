use super::{HashParameters, PasswordError};
use base64ct::{Base64Unpadded, Encoding};

pub const ALGORITHM_TAG: &str = "argon2id";
/// Argon2 version 1.3.
pub const VERSION: u32 = 0x13;

const FIELD_COUNT: usize = 6;

/// A digest string split back into its recorded parameters, salt and derived key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDigest {
    pub params: HashParameters,
    pub salt: Vec<u8>,
    pub key: Vec<u8>,
}

impl ParsedDigest {
    /// Parse `$argon2id$v=19$m=<m>,t=<t>,p=<p>$<salt>$<key>`.
    ///
    /// `key_length` and `salt_length` are taken from the decoded fields, so the
    /// returned parameters reproduce the digest exactly.
    ///
    /// # Errors
    ///
    /// Returns `Format` if the layout, numbers or base64 fields are invalid, and
    /// `UnsupportedAlgorithm` if the tag or version is not argon2id v19.
    pub fn parse(digest: &str) -> Result<Self, PasswordError> {
        let fields: Vec<&str> = digest.split('$').collect();
        let [prefix, tag, version, costs, salt, key] = fields.as_slice() else {
            return Err(PasswordError::Format(format!(
                "expected {FIELD_COUNT} '$'-delimited fields, found {}",
                fields.len()
            )));
        };

        if !prefix.is_empty() {
            return Err(PasswordError::Format(
                "digest must start with '$'".to_string(),
            ));
        }
        if *tag != ALGORITHM_TAG {
            return Err(PasswordError::UnsupportedAlgorithm((*tag).to_string()));
        }

        let version = parse_number(version, "v")?;
        if version != VERSION {
            return Err(PasswordError::UnsupportedAlgorithm(format!(
                "{ALGORITHM_TAG} version {version}"
            )));
        }

        let (memory_kib, iterations, parallelism) = parse_costs(costs)?;
        let salt = decode_field(salt, "salt")?;
        let key = decode_field(key, "key")?;

        let params = HashParameters {
            memory_kib,
            iterations,
            parallelism,
            key_length: length_u32(key.len(), "key")?,
            salt_length: length_u32(salt.len(), "salt")?,
        };
        if let Some(reason) = params.exceeded_ceiling() {
            return Err(PasswordError::Format(reason));
        }

        Ok(Self { params, salt, key })
    }
}

pub(super) fn encode(params: &HashParameters, salt: &[u8], key: &[u8]) -> String {
    format!(
        "${ALGORITHM_TAG}$v={VERSION}$m={},t={},p={}${}${}",
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Base64Unpadded::encode_string(salt),
        Base64Unpadded::encode_string(key),
    )
}

fn parse_costs(field: &str) -> Result<(u32, u32, u32), PasswordError> {
    let mut parts = field.split(',');
    let memory_kib = parse_number(parts.next().unwrap_or_default(), "m")?;
    let iterations = parse_number(parts.next().unwrap_or_default(), "t")?;
    let parallelism = parse_number(parts.next().unwrap_or_default(), "p")?;
    if parts.next().is_some() {
        return Err(PasswordError::Format(format!(
            "unexpected cost parameters in {field:?}"
        )));
    }
    Ok((memory_kib, iterations, parallelism))
}

// `<name>=<u32>`
fn parse_number(part: &str, name: &str) -> Result<u32, PasswordError> {
    let value = part
        .strip_prefix(name)
        .and_then(|rest| rest.strip_prefix('='))
        .ok_or_else(|| PasswordError::Format(format!("expected {name}=<n>, found {part:?}")))?;
    value
        .parse::<u32>()
        .map_err(|_| PasswordError::Format(format!("invalid {name} value {value:?}")))
}

fn decode_field(field: &str, name: &str) -> Result<Vec<u8>, PasswordError> {
    Base64Unpadded::decode_vec(field)
        .map_err(|_| PasswordError::Format(format!("{name} is not valid unpadded base64")))
}

fn length_u32(len: usize, name: &str) -> Result<u32, PasswordError> {
    u32::try_from(len)
        .map_err(|_| PasswordError::Format(format!("{name} length {len} exceeds u32")))
}
