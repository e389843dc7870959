//! License data model
//!
//! ## File Format
//!
//! `licensing.json`:
//!
//! ```json
//! {
//!   "licenses": [
//!     "unsigned:{\"unique_id\":\"...\",\"license_type\":\"evaluation\",...}"
//!   ],
//!   "current": {
//!     "unique_id": "6f1c0f7e-8d5b-4b0e-9a4f-3f8f2b1c9d10",
//!     "license_type": "evaluation",
//!     "product": "LCM",
//!     "valid_from": "2025-01-09T12:00:00Z",
//!     "valid_to": "2025-02-23T12:00:00Z",
//!     "subscription_end_date": "2025-02-23T12:00:00Z"
//!   },
//!   "last_evaluation_start_date": "2025-01-09T12:00:00Z"
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::traits::ConfigurationFile;

/// License tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseType {
    /// Time-boxed trial with a cooldown before it can be obtained again
    Evaluation,
    /// Free tier, no end date
    Free,
    /// Essentials tier, no end date
    Essentials,
    /// Purchased license registered from a signed key
    Registered,
    /// Tier written by a newer build
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for LicenseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LicenseType::Evaluation => write!(f, "Evaluation"),
            LicenseType::Free => write!(f, "Free"),
            LicenseType::Essentials => write!(f, "Essentials"),
            LicenseType::Registered => write!(f, "Registered"),
            LicenseType::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Structured content of one license
///
/// Values are never mutated after creation; a new registration replaces the
/// previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRegistrationData {
    /// Opaque identifier of this registration
    pub unique_id: Uuid,
    /// Tier of the license
    pub license_type: LicenseType,
    /// Product the license applies to
    pub product: String,
    /// Start of validity
    pub valid_from: DateTime<Utc>,
    /// End of validity, `None` for perpetual licenses
    #[serde(default)]
    pub valid_to: Option<DateTime<Utc>>,
    /// End of the maintenance subscription
    #[serde(default)]
    pub subscription_end_date: Option<DateTime<Utc>>,
}

impl LicenseRegistrationData {
    /// Create a self-issued registration with a fresh identifier
    ///
    /// `valid_to` also becomes the subscription end date.
    pub fn self_issued(
        license_type: LicenseType,
        product: impl Into<String>,
        valid_from: DateTime<Utc>,
        valid_to: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            unique_id: Uuid::new_v4(),
            license_type,
            product: product.into(),
            valid_from,
            valid_to,
            subscription_end_date: valid_to,
        }
    }

    /// Whether the license has passed its end of validity at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.valid_to.is_some_and(|valid_to| valid_to < now)
    }
}

/// Persisted licensing state of the current user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LicensingConfiguration {
    /// Raw license keys, in registration order
    #[serde(default)]
    pub licenses: Vec<String>,

    /// License currently in effect
    #[serde(default)]
    pub current: Option<LicenseRegistrationData>,

    /// Start of the most recent evaluation
    ///
    /// Set only when an evaluation starts; unregistration never clears it.
    #[serde(default)]
    pub last_evaluation_start_date: Option<DateTime<Utc>>,

    #[serde(skip)]
    file_path: Option<PathBuf>,
}

impl ConfigurationFile for LicensingConfiguration {
    const FILE_NAME: &'static str = "licensing.json";

    fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    fn set_file_path(&mut self, path: PathBuf) {
        self.file_path = Some(path);
    }
}

/// Outcome of a registration attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// A new license was stored
    Registered(LicenseRegistrationData),
    /// An equivalent license was already stored; nothing was written
    AlreadyRegistered(LicenseRegistrationData),
    /// The registration was refused
    Rejected(Rejection),
}

impl Registration {
    /// Whether a license of the requested kind is now in place
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Registration::Registered(_) | Registration::AlreadyRegistered(_)
        )
    }

    /// The license in place after a successful registration
    pub fn license(&self) -> Option<&LicenseRegistrationData> {
        match self {
            Registration::Registered(data) | Registration::AlreadyRegistered(data) => Some(data),
            Registration::Rejected(_) => None,
        }
    }
}

/// Why a registration was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Another license that has not expired is in effect
    ConflictingLicense {
        /// Tier of the license in effect
        license_type: LicenseType,
    },
    /// The previous evaluation ended too recently
    CoolingDown {
        /// First instant at which a new evaluation is allowed
        eligible_after: DateTime<Utc>,
    },
    /// The tier cannot be registered through this operation
    UnsupportedTier(LicenseType),
    /// The license key could not be parsed
    InvalidLicenseKey(String),
    /// The registration could not be completed (I/O or serialization)
    Failed(String),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::ConflictingLicense { license_type } => write!(
                f,
                "a {} license is already registered and has not expired",
                license_type
            ),
            Rejection::CoolingDown { eligible_after } => write!(
                f,
                "a new evaluation cannot start before {}",
                eligible_after.format("%Y-%m-%d")
            ),
            Rejection::UnsupportedTier(license_type) => {
                write!(f, "{} licenses cannot be registered this way", license_type)
            }
            Rejection::InvalidLicenseKey(reason) => write!(f, "invalid license key: {}", reason),
            Rejection::Failed(reason) => write!(f, "registration failed: {}", reason),
        }
    }
}

/// Read-only view of the licensing state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseStatus {
    /// License currently in effect
    pub current: Option<LicenseRegistrationData>,
    /// Whether the current license has expired
    pub is_expired: bool,
    /// End of the evaluation cooldown, if one applies
    pub evaluation_eligible_after: Option<DateTime<Utc>>,
}
