//! Unsigned license keys for self-issued tiers
//!
//! Evaluation, Free and Essentials licenses are created locally and carry no
//! signature. Their key is `unsigned:` followed by the JSON of the
//! registration data.

use crate::error::{Error, Result};
use crate::licensing::LicenseRegistrationData;
use crate::traits::LicenseKeyParser;

/// Prefix of unsigned license keys
pub const UNSIGNED_KEY_PREFIX: &str = "unsigned:";

/// Encode self-issued registration data as an unsigned key
pub fn to_unsigned_key(data: &LicenseRegistrationData) -> Result<String> {
    Ok(format!(
        "{}{}",
        UNSIGNED_KEY_PREFIX,
        serde_json::to_string(data)?
    ))
}

/// Parser accepting only unsigned keys
///
/// Used when no signed-key parser is available. Signed keys are rejected
/// with [`Error::License`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsignedKeyParser;

impl LicenseKeyParser for UnsignedKeyParser {
    fn parse(&self, key: &str) -> Result<LicenseRegistrationData> {
        let payload = key
            .trim()
            .strip_prefix(UNSIGNED_KEY_PREFIX)
            .ok_or_else(|| Error::license("not an unsigned license key"))?;

        serde_json::from_str(payload)
            .map_err(|e| Error::license(format!("malformed unsigned license key: {}", e)))
    }
}
