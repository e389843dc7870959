// # License Key Parser Trait
//
// Turns a raw license key into structured registration data.
//
// Signature verification of purchased keys lives outside this crate; the
// core only needs "parse or fail". Self-issued tiers (evaluation, free,
// essentials) use the unsigned format handled by
// `licensing::UnsignedKeyParser`.

use crate::licensing::LicenseRegistrationData;

/// Parses license keys into registration data
pub trait LicenseKeyParser: Send + Sync {
    /// Parse `key`, failing with [`crate::Error::License`] if it is not a valid key
    fn parse(&self, key: &str) -> crate::Result<LicenseRegistrationData>;
}
