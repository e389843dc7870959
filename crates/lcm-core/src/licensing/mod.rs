//! License registration
//!
//! - [`LicenseRegistrationEngine`]: Eligibility rules of the license tiers
//! - [`WelcomeService`]: One-time first-start setup
//! - [`UnsignedKeyParser`]: Key format of self-issued licenses

pub mod data;
pub mod engine;
pub mod key;
pub mod welcome;

pub use data::{
    LicenseRegistrationData, LicenseStatus, LicenseType, LicensingConfiguration, Registration,
    Rejection,
};
pub use engine::LicenseRegistrationEngine;
pub use key::{UNSIGNED_KEY_PREFIX, UnsignedKeyParser, to_unsigned_key};
pub use welcome::{WelcomeConfiguration, WelcomeService};
